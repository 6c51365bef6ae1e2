//! Text generation backends
//!
//! A [`TextGenerator`] turns one task prompt into a stream of text chunks.
//! The stream ends normally on end-of-stream or yields a single error
//! item when the upstream call fails.

pub mod fake;
pub mod gemini;
pub mod sse;

pub use fake::FakeGenerator;
pub use gemini::GeminiGenerator;

use crate::error::Result;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

/// Stream of generated text chunks
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// One generation call for a single task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    /// Task identifier (e.g. `schema`)
    pub task_id: String,
    /// Human-readable task label
    pub task_label: String,
    /// System instruction for the model
    pub system_prompt: String,
    /// User content for this task
    pub prompt: String,
}

/// Producer of streamed text
///
/// # Examples
///
/// ```
/// use dbcoach::generation::{FakeGenerator, GenerationRequest, TextGenerator};
/// use futures::StreamExt;
///
/// # tokio_test::block_on(async {
/// let generator = FakeGenerator::new().with_chunks("schema", ["CREATE ", "TABLE"]);
/// let request = GenerationRequest {
///     task_id: "schema".to_string(),
///     task_label: "Schema Design".to_string(),
///     system_prompt: String::new(),
///     prompt: "a shop".to_string(),
/// };
/// let mut stream = generator.stream(request).await.unwrap();
/// let mut text = String::new();
/// while let Some(chunk) = stream.next().await {
///     text.push_str(&chunk.unwrap());
/// }
/// assert_eq!(text, "CREATE TABLE");
/// # });
/// ```
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Short generator name for logs
    fn name(&self) -> &str;

    /// Start generating text for `request`
    ///
    /// # Errors
    ///
    /// Returns `DbCoachError::Http` if the request cannot be sent and
    /// `DbCoachError::Generation` if it is refused; failures after
    /// streaming began arrive as an error item.
    async fn stream(&self, request: GenerationRequest) -> Result<ChunkStream>;
}

//! Scripted generator for offline runs and tests

use crate::error::{DbCoachError, Result};
use crate::generation::{ChunkStream, GenerationRequest, TextGenerator};

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Per-task script
#[derive(Debug, Clone, Default)]
struct Script {
    chunks: Vec<String>,
    failure: Option<String>,
}

/// Generator that replays scripted chunks per task id
///
/// Tasks without a script stream a single placeholder chunk naming the
/// task, so an offline session always produces content.
#[derive(Debug, Default)]
pub struct FakeGenerator {
    scripts: HashMap<String, Script>,
    delay: Option<Duration>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl FakeGenerator {
    /// Create a generator with no scripts
    pub fn new() -> Self {
        Self::default()
    }

    /// Stream `chunks` for `task_id`
    pub fn with_chunks<I, S>(mut self, task_id: &str, chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scripts.entry(task_id.to_string()).or_default().chunks =
            chunks.into_iter().map(Into::into).collect();
        self
    }

    /// End the stream for `task_id` with an error after its chunks
    pub fn failing_on(mut self, task_id: &str, message: impl Into<String>) -> Self {
        self.scripts.entry(task_id.to_string()).or_default().failure = Some(message.into());
        self
    }

    /// Sleep between chunks
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn script_for(&self, request: &GenerationRequest) -> Script {
        self.scripts
            .get(&request.task_id)
            .cloned()
            .unwrap_or_else(|| Script {
                chunks: vec![format!(
                    "## {}\n\nOffline output for {}.\n",
                    request.task_label, request.task_id
                )],
                failure: None,
            })
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    fn name(&self) -> &str {
        "fake"
    }

    async fn stream(&self, request: GenerationRequest) -> Result<ChunkStream> {
        let script = self.script_for(&request);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }

        let delay = self.delay;
        let mut items: Vec<Result<String>> = script.chunks.into_iter().map(Ok).collect();
        if let Some(message) = script.failure {
            items.push(Err(DbCoachError::Generation(message).into()));
        }

        let stream = futures::stream::unfold(items.into_iter(), move |mut items| async move {
            let item = items.next()?;
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            Some((item, items))
        });

        Ok(Box::pin(stream))
    }
}

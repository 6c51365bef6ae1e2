//! DB.Coach - streaming database design assistant library
//!
//! This library turns a free-text description of a database into a
//! multi-step design (requirements, schema, implementation, validation)
//! streamed from a language model, and keeps the resulting conversations
//! in a local or hosted store.
//!
//! # Architecture
//!
//! - `conversation`: Conversation record model and title generation
//! - `storage`: Storage trait with local (sled) and hosted (PostgREST) backends, plus migration
//! - `generation`: Streaming text generators (Gemini, offline fake)
//! - `prompts`: Per-task prompt templates
//! - `session`: Session state machine and the async runner
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use dbcoach::Config;
//! use dbcoach::storage::create_storage;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config/config.yaml", &Default::default())?;
//!     config.validate()?;
//!
//!     let storage = create_storage(&config.storage)?;
//!     for record in storage.load_conversations(None).await? {
//!         println!("{} {}", record.id, record.title);
//!     }
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod conversation;
pub mod error;
pub mod generation;
pub mod prompts;
pub mod session;
pub mod storage;

// Re-export commonly used types
pub use config::Config;
pub use conversation::{generate_title, ConversationPatch, SavedConversation};
pub use error::{DbCoachError, Result};
pub use session::{GenerationSession, SessionEvent, SessionRunner};
pub use storage::{create_storage, ConversationStorage};

#[cfg(test)]
pub mod test_utils;

//! Streaming generation sessions
//!
//! [`GenerationSession`] holds the task state machine; [`SessionRunner`]
//! drives it against a generator and publishes [`SessionEvent`]s.

pub mod runner;
pub mod state;

pub use runner::{SessionEvent, SessionHandle, SessionRunner, DEFAULT_CHANNEL_CAPACITY};
pub use state::{default_pipeline, GenerationSession, SessionState, TaskDefinition};

//! Conversation record model
//!
//! A [`SavedConversation`] is one finished generation session: the user's
//! request, the generated content per task, the insight log and the task
//! list. Records are created by the session layer and owned by whichever
//! storage backend holds them; every read hands out an independent copy.

pub mod title;

pub use title::generate_title;

use crate::error::{DbCoachError, Result};
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lifecycle status of a single task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Not started yet
    #[default]
    Pending,
    /// Currently receiving generated text
    Active,
    /// Finished; its buffer is frozen
    Completed,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Active => write!(f, "active"),
            TaskStatus::Completed => write!(f, "completed"),
        }
    }
}

/// Overall lifecycle status of a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    /// Session still running (never persisted in practice)
    Generating,
    /// Session finished successfully
    #[default]
    Completed,
    /// Session ended with an error
    Error,
}

impl std::fmt::Display for ConversationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConversationStatus::Generating => write!(f, "generating"),
            ConversationStatus::Completed => write!(f, "completed"),
            ConversationStatus::Error => write!(f, "error"),
        }
    }
}

/// One entry of the narrative progress log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insight {
    /// Agent that produced the message
    pub agent: String,
    /// Progress message
    pub message: String,
    /// When the entry was recorded
    pub timestamp: DateTime<Utc>,
}

impl Insight {
    /// Create an insight stamped with the current time
    pub fn now(agent: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            message: message.into(),
            timestamp: now_micros(),
        }
    }
}

/// A task as recorded on a saved conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskEntry {
    /// Task identifier, key into `generated_content`
    pub id: String,
    /// Display title
    pub title: String,
    /// Agent responsible for the task
    pub agent: String,
    /// Task status
    pub status: TaskStatus,
    /// Progress percentage (0-100)
    pub progress: u8,
}

/// Summary of the session that produced a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMetadata {
    /// Wall-clock duration of the session in milliseconds
    pub duration_ms: u64,
    /// Number of chunks received from the generator
    pub chunk_count: usize,
    /// Number of insights recorded
    pub insight_count: usize,
    /// Generation mode label
    pub mode: String,
}

/// A saved generation session
///
/// The in-memory and local JSON shape is camelCase (`dbType`,
/// `generatedContent`, ...); the hosted table uses snake_case columns,
/// see [`crate::storage::row`].
///
/// # Examples
///
/// ```
/// use dbcoach::conversation::SavedConversation;
///
/// let record = SavedConversation::new("Build a shop", "PostgreSQL");
/// assert_eq!(record.title, "E-commerce Platform (PostgreSQL)");
/// assert!(record.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedConversation {
    /// Unique identifier, immutable
    pub id: String,
    /// Display title, editable
    pub title: String,
    /// Original user request, immutable
    pub prompt: String,
    /// Database type tag, immutable
    pub db_type: String,
    /// Overall status
    pub status: ConversationStatus,
    /// Generated text per task id
    #[serde(default)]
    pub generated_content: BTreeMap<String, String>,
    /// Append-only insight log
    #[serde(default)]
    pub insights: Vec<Insight>,
    /// Ordered task list
    #[serde(default)]
    pub tasks: Vec<TaskEntry>,
    /// Owner tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Session summary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ConversationMetadata>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl SavedConversation {
    /// Create an empty completed conversation with a fresh id and a
    /// generated title
    pub fn new(prompt: impl Into<String>, db_type: impl Into<String>) -> Self {
        let prompt = prompt.into();
        let db_type = db_type.into();
        let now = now_micros();
        Self {
            id: new_conversation_id(),
            title: generate_title(&prompt, &db_type),
            prompt,
            db_type,
            status: ConversationStatus::Completed,
            generated_content: BTreeMap::new(),
            insights: Vec::new(),
            tasks: Vec::new(),
            user_id: None,
            metadata: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check the record invariants
    ///
    /// # Errors
    ///
    /// Returns `DbCoachError::InvalidRecord` when the id is empty, when a
    /// `generated_content` key has no matching task, or when
    /// `created_at` is later than `updated_at`.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(DbCoachError::InvalidRecord("id cannot be empty".to_string()).into());
        }

        if let Some(orphan) = self
            .generated_content
            .keys()
            .find(|key| !self.tasks.iter().any(|t| &t.id == *key))
        {
            return Err(DbCoachError::InvalidRecord(format!(
                "generated content for unknown task '{}'",
                orphan
            ))
            .into());
        }

        if self.created_at > self.updated_at {
            return Err(DbCoachError::InvalidRecord(format!(
                "created_at ({}) is later than updated_at ({})",
                self.created_at, self.updated_at
            ))
            .into());
        }

        Ok(())
    }

    /// Re-stamp `updated_at`, never moving it before `created_at`
    pub fn touch(&mut self) {
        self.updated_at = now_micros().max(self.created_at);
    }

    /// Case-insensitive substring match over title, prompt and db type
    pub fn matches_query(&self, query: &str) -> bool {
        let needle = query.to_lowercase();
        self.title.to_lowercase().contains(&needle)
            || self.prompt.to_lowercase().contains(&needle)
            || self.db_type.to_lowercase().contains(&needle)
    }

    /// Whether the record belongs to `owner_id` (no filter matches all)
    pub fn is_owned_by(&self, owner_id: Option<&str>) -> bool {
        match owner_id {
            Some(owner) => self.user_id.as_deref() == Some(owner),
            None => true,
        }
    }

    /// Merge a patch into the record and re-stamp `updated_at`
    pub fn apply_patch(&mut self, patch: ConversationPatch) {
        let ConversationPatch {
            title,
            generated_content,
            insights,
            tasks,
            status,
            user_id,
            metadata,
        } = patch;

        if let Some(title) = title {
            self.title = title;
        }
        if let Some(content) = generated_content {
            self.generated_content = content;
        }
        if let Some(insights) = insights {
            self.insights = insights;
        }
        if let Some(tasks) = tasks {
            self.tasks = tasks;
        }
        if let Some(status) = status {
            self.status = status;
        }
        if let Some(user_id) = user_id {
            self.user_id = user_id;
        }
        if let Some(metadata) = metadata {
            self.metadata = Some(metadata);
        }
        self.touch();
    }
}

/// Partial update of a conversation
///
/// Only mutable fields are representable; `id`, `prompt`, `db_type` and
/// `created_at` cannot be changed through a patch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationPatch {
    /// New title
    pub title: Option<String>,
    /// Replacement generated content
    pub generated_content: Option<BTreeMap<String, String>>,
    /// Replacement insight log
    pub insights: Option<Vec<Insight>>,
    /// Replacement task list
    pub tasks: Option<Vec<TaskEntry>>,
    /// New status
    pub status: Option<ConversationStatus>,
    /// New owner (`Some(None)` clears it)
    pub user_id: Option<Option<String>>,
    /// Replacement metadata
    pub metadata: Option<ConversationMetadata>,
}

impl ConversationPatch {
    /// Patch that only changes the title
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    /// Returns true when the patch changes nothing
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Current time truncated to microseconds
///
/// The hosted table stores `timestamptz`, which keeps six fractional
/// digits; stamping at that precision keeps records equal after a
/// round trip.
pub fn now_micros() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Generate a new unique conversation identifier
pub fn new_conversation_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Sort records newest `created_at` first
pub fn sort_newest_first(records: &mut [SavedConversation]) {
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

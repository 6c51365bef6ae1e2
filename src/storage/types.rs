use crate::conversation::{ConversationStatus, SavedConversation};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Listing view of a stored conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    /// Unique identifier for the conversation
    pub id: String,
    /// Display title
    pub title: String,
    /// Database type tag
    pub db_type: String,
    /// Overall status
    pub status: ConversationStatus,
    /// When the conversation was created
    pub created_at: DateTime<Utc>,
    /// When the conversation was last updated
    pub updated_at: DateTime<Utc>,
    /// Number of tasks with generated content
    pub task_count: usize,
}

impl From<&SavedConversation> for ConversationSummary {
    fn from(record: &SavedConversation) -> Self {
        Self {
            id: record.id.clone(),
            title: record.title.clone(),
            db_type: record.db_type.clone(),
            status: record.status,
            created_at: record.created_at,
            updated_at: record.updated_at,
            task_count: record.generated_content.len(),
        }
    }
}

//! Normalization layer between the record model and stored shapes
//!
//! The local backend stores the camelCase JSON shape of
//! [`SavedConversation`] directly. The hosted table uses snake_case
//! columns; this module is the only place where the two are translated.

use crate::conversation::{
    ConversationMetadata, ConversationStatus, Insight, SavedConversation, TaskEntry,
};
use crate::error::{DbCoachError, Result};
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One row of the hosted `conversations` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationRow {
    pub id: String,
    pub title: String,
    pub prompt: String,
    pub db_type: String,
    pub status: ConversationStatus,
    #[serde(default)]
    pub generated_content: BTreeMap<String, String>,
    #[serde(default)]
    pub insights: Vec<Insight>,
    #[serde(default)]
    pub tasks: Vec<TaskEntry>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub metadata: Option<ConversationMetadata>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Mutable columns sent with a PATCH request
#[derive(Debug, Clone, Serialize)]
pub struct ConversationRowUpdate {
    pub title: String,
    pub status: ConversationStatus,
    pub generated_content: BTreeMap<String, String>,
    pub insights: Vec<Insight>,
    pub tasks: Vec<TaskEntry>,
    pub user_id: Option<String>,
    pub metadata: Option<ConversationMetadata>,
    pub updated_at: DateTime<Utc>,
}

impl From<&SavedConversation> for ConversationRow {
    fn from(record: &SavedConversation) -> Self {
        Self {
            id: record.id.clone(),
            title: record.title.clone(),
            prompt: record.prompt.clone(),
            db_type: record.db_type.clone(),
            status: record.status,
            generated_content: record.generated_content.clone(),
            insights: record.insights.clone(),
            tasks: record.tasks.clone(),
            user_id: record.user_id.clone(),
            metadata: record.metadata.clone(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

impl From<ConversationRow> for SavedConversation {
    fn from(row: ConversationRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            prompt: row.prompt,
            db_type: row.db_type,
            status: row.status,
            generated_content: row.generated_content,
            insights: row.insights,
            tasks: row.tasks,
            user_id: row.user_id,
            metadata: row.metadata,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl From<&SavedConversation> for ConversationRowUpdate {
    fn from(record: &SavedConversation) -> Self {
        Self {
            title: record.title.clone(),
            status: record.status,
            generated_content: record.generated_content.clone(),
            insights: record.insights.clone(),
            tasks: record.tasks.clone(),
            user_id: record.user_id.clone(),
            metadata: record.metadata.clone(),
            updated_at: record.updated_at,
        }
    }
}

/// Validate a record and re-stamp `updated_at` before it is written
///
/// Both backends call this on every save so the invariants are checked
/// in one place.
pub fn prepare_for_write(record: &SavedConversation) -> Result<SavedConversation> {
    let mut prepared = record.clone();
    prepared.touch();
    prepared.validate()?;
    Ok(prepared)
}

/// Decode the local JSON blob into records
pub fn decode_blob(bytes: &[u8]) -> Result<Vec<SavedConversation>> {
    let records = serde_json::from_slice(bytes)
        .map_err(DbCoachError::Serialization)
        .context("Failed to decode stored conversations")?;
    Ok(records)
}

/// Encode records into the local JSON blob
pub fn encode_blob(records: &[SavedConversation]) -> Result<Vec<u8>> {
    let bytes = serde_json::to_vec(records)
        .map_err(DbCoachError::Serialization)
        .context("Failed to encode conversations")?;
    Ok(bytes)
}

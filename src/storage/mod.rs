//! Conversation storage
//!
//! [`ConversationStorage`] is the single interface both backends
//! implement: [`LocalStorage`] keeps the whole record set as one JSON
//! blob in an embedded `sled` database, [`HostedStorage`] maps records
//! onto rows of a PostgREST table. Pick one with [`create_storage`].

use crate::config::{StorageBackend, StorageConfig};
use crate::conversation::{ConversationPatch, SavedConversation};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

pub mod hosted;
pub mod local;
pub mod migration;
pub mod row;
pub mod types;

pub use hosted::HostedStorage;
pub use local::LocalStorage;
pub use migration::{migrate_conversations, MigrationError, MigrationResult};
pub use types::ConversationSummary;

/// Common contract for conversation backends
///
/// Every read returns an independent copy of the stored record.
///
/// # Examples
///
/// ```no_run
/// use dbcoach::conversation::SavedConversation;
/// use dbcoach::storage::{ConversationStorage, LocalStorage};
///
/// # async fn example() -> dbcoach::error::Result<()> {
/// let storage = LocalStorage::open("/tmp/dbcoach", 50)?;
/// let record = SavedConversation::new("Build me a shop", "PostgreSQL");
/// storage.save_conversation(&record).await?;
/// let loaded = storage.get_conversation(&record.id).await?;
/// assert!(loaded.is_some());
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait ConversationStorage: Send + Sync {
    /// Short backend name for logs and CLI output
    fn backend_name(&self) -> &'static str;

    /// Insert or replace a record by id
    ///
    /// The record is validated and its `updated_at` re-stamped before it
    /// is written. Saving the same record twice leaves exactly one copy.
    ///
    /// # Errors
    ///
    /// Returns `DbCoachError::InvalidRecord` for records that break the
    /// invariants and `DbCoachError::Storage` on I/O failures.
    async fn save_conversation(&self, record: &SavedConversation) -> Result<()>;

    /// All records, optionally filtered by owner, newest `created_at` first
    async fn load_conversations(&self, owner_id: Option<&str>) -> Result<Vec<SavedConversation>>;

    /// A single record, or `None` if the id is unknown
    async fn get_conversation(&self, id: &str) -> Result<Option<SavedConversation>>;

    /// Remove a record; unknown ids are a no-op
    async fn delete_conversation(&self, id: &str) -> Result<()>;

    /// Merge `patch` into an existing record and re-stamp `updated_at`
    ///
    /// # Errors
    ///
    /// Returns `DbCoachError::NotFound` if `id` is absent, distinct from
    /// the `DbCoachError::Storage` raised when the write itself fails.
    async fn update_conversation(
        &self,
        id: &str,
        patch: ConversationPatch,
    ) -> Result<SavedConversation>;

    /// Case-insensitive substring search over title, prompt and db type
    async fn search_conversations(
        &self,
        query: &str,
        owner_id: Option<&str>,
    ) -> Result<Vec<SavedConversation>>;

    /// Records whose id starts with `prefix`, newest first
    ///
    /// History tables print shortened ids; this resolves them back.
    async fn find_by_id_prefix(&self, prefix: &str) -> Result<Vec<SavedConversation>> {
        if prefix.is_empty() {
            return Ok(Vec::new());
        }
        let prefix = prefix.to_ascii_lowercase();
        let mut records = self.load_conversations(None).await?;
        records.retain(|r| r.id.starts_with(&prefix));
        Ok(records)
    }
}

/// Build the backend selected by `config`
///
/// # Errors
///
/// Returns error if the local database cannot be opened or the hosted
/// backend is missing its URL or API key.
pub fn create_storage(config: &StorageConfig) -> Result<Arc<dyn ConversationStorage>> {
    match config.backend {
        StorageBackend::Local => {
            let path = config.local.resolve_path()?;
            tracing::debug!("Opening local conversation store at {}", path.display());
            Ok(Arc::new(LocalStorage::open(
                path,
                config.local.max_conversations,
            )?))
        }
        StorageBackend::Hosted => {
            tracing::debug!("Using hosted conversation store");
            Ok(Arc::new(HostedStorage::new(config.hosted.clone())?))
        }
    }
}

//! Local conversation backend
//!
//! Stores the full record set as one JSON array under a fixed key of an
//! embedded `sled` database. The set is capped: each save re-inserts the
//! record at the front and truncates the tail beyond `max_conversations`.

use crate::conversation::{sort_newest_first, ConversationPatch, SavedConversation};
use crate::error::{DbCoachError, Result};
use crate::storage::row::{decode_blob, encode_blob, prepare_for_write};
use crate::storage::ConversationStorage;
use async_trait::async_trait;
use sled::{Db, IVec};
use std::path::Path;

/// Key holding the serialized record set
pub const STORAGE_KEY: &str = "dbcoach_conversations";

/// Embedded key-value conversation store
#[derive(Clone)]
pub struct LocalStorage {
    db: Db,
    max_conversations: usize,
}

impl LocalStorage {
    /// Open or create a local store
    ///
    /// # Arguments
    ///
    /// * `path` - Database directory (created if missing)
    /// * `max_conversations` - Cap on the number of stored records
    ///
    /// # Errors
    ///
    /// Returns `DbCoachError::Storage` if the database cannot be opened
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use dbcoach::storage::LocalStorage;
    ///
    /// # fn main() -> dbcoach::error::Result<()> {
    /// let storage = LocalStorage::open("/tmp/dbcoach-conversations", 50)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn open(path: impl AsRef<Path>, max_conversations: usize) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(DbCoachError::Io)?;
        }

        let db = sled::open(path)
            .map_err(|e| DbCoachError::Storage(format!("Failed to open database: {}", e)))?;

        Ok(Self {
            db,
            max_conversations: max_conversations.max(1),
        })
    }

    /// Cap on the number of stored records
    pub fn max_conversations(&self) -> usize {
        self.max_conversations
    }

    /// Remove every stored record
    pub fn clear(&self) -> Result<()> {
        self.db
            .remove(STORAGE_KEY)
            .map_err(|e| DbCoachError::Storage(format!("Remove failed: {}", e)))?;
        self.flush()?;
        tracing::info!("Cleared local conversation store");
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.db
            .flush()
            .map_err(|e| DbCoachError::Storage(format!("Flush failed: {}", e)))?;
        Ok(())
    }

    fn read_current(&self) -> Result<Option<IVec>> {
        self.db
            .get(STORAGE_KEY)
            .map_err(|e| DbCoachError::Storage(format!("Get failed: {}", e)).into())
    }

    fn read_all(&self) -> Result<Vec<SavedConversation>> {
        match self.read_current()? {
            Some(bytes) => decode_blob(&bytes),
            None => Ok(Vec::new()),
        }
    }

    /// Read-modify-write of the record set
    ///
    /// The write is a compare-and-swap against the blob that was read; on
    /// conflict the whole cycle is retried with fresh data, so concurrent
    /// writers never drop each other's records. An error from `apply`
    /// aborts without writing.
    fn modify<T, F>(&self, mut apply: F) -> Result<T>
    where
        F: FnMut(&mut Vec<SavedConversation>) -> Result<T>,
    {
        loop {
            let current = self.read_current()?;
            let mut records = match &current {
                Some(bytes) => decode_blob(bytes)?,
                None => Vec::new(),
            };

            let outcome = apply(&mut records)?;
            let encoded = encode_blob(&records)?;

            match self
                .db
                .compare_and_swap(STORAGE_KEY, current, Some(encoded))
                .map_err(|e| DbCoachError::Storage(format!("Write failed: {}", e)))?
            {
                Ok(()) => {
                    self.flush()?;
                    return Ok(outcome);
                }
                Err(_) => {
                    tracing::debug!("Concurrent write to local store detected, retrying");
                }
            }
        }
    }
}

#[async_trait]
impl ConversationStorage for LocalStorage {
    fn backend_name(&self) -> &'static str {
        "local"
    }

    async fn save_conversation(&self, record: &SavedConversation) -> Result<()> {
        let prepared = prepare_for_write(record)?;
        let max = self.max_conversations;

        let evicted = self.modify(|records| {
            records.retain(|r| r.id != prepared.id);
            records.insert(0, prepared.clone());
            let evicted = records.len().saturating_sub(max);
            records.truncate(max);
            Ok(evicted)
        })?;

        if evicted > 0 {
            tracing::debug!(
                "Local store over capacity, dropped {} oldest conversation(s)",
                evicted
            );
        }
        tracing::debug!("Saved conversation {} to local store", prepared.id);
        Ok(())
    }

    async fn load_conversations(&self, owner_id: Option<&str>) -> Result<Vec<SavedConversation>> {
        let mut records: Vec<SavedConversation> = self
            .read_all()?
            .into_iter()
            .filter(|r| r.is_owned_by(owner_id))
            .collect();
        sort_newest_first(&mut records);
        Ok(records)
    }

    async fn get_conversation(&self, id: &str) -> Result<Option<SavedConversation>> {
        Ok(self.read_all()?.into_iter().find(|r| r.id == id))
    }

    async fn delete_conversation(&self, id: &str) -> Result<()> {
        let removed = self.modify(|records| {
            let before = records.len();
            records.retain(|r| r.id != id);
            Ok(before - records.len())
        })?;

        if removed == 0 {
            tracing::debug!("Delete of unknown conversation {} ignored", id);
        }
        Ok(())
    }

    async fn update_conversation(
        &self,
        id: &str,
        patch: ConversationPatch,
    ) -> Result<SavedConversation> {
        self.modify(|records| {
            let record = records
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or_else(|| DbCoachError::NotFound(id.to_string()))?;
            record.apply_patch(patch.clone());
            record.validate()?;
            Ok(record.clone())
        })
    }

    async fn search_conversations(
        &self,
        query: &str,
        owner_id: Option<&str>,
    ) -> Result<Vec<SavedConversation>> {
        let mut records = self.load_conversations(owner_id).await?;
        records.retain(|r| r.matches_query(query));
        Ok(records)
    }
}

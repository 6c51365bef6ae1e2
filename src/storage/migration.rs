//! One-shot copy of conversations between backends
//!
//! Used to move a user's local history into the hosted store. Records
//! are written one at a time; failures are collected per record instead
//! of aborting, and nothing is rolled back.

use crate::error::Result;
use crate::storage::ConversationStorage;
use serde::Serialize;

/// A record that could not be written to the destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationError {
    /// Id of the failing conversation
    pub id: String,
    /// Error message from the destination backend
    pub message: String,
}

/// Outcome of a migration run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationResult {
    /// Number of records written successfully
    pub migrated_count: usize,
    /// One entry per record that failed
    pub errors: Vec<MigrationError>,
}

impl MigrationResult {
    /// True when every source record was written
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }

    /// Total number of records attempted
    pub fn attempted(&self) -> usize {
        self.migrated_count + self.errors.len()
    }
}

/// Copy every conversation from `source` into `destination`
///
/// # Errors
///
/// Only a failure to read `source` is returned as an error; per-record
/// write failures are reported in [`MigrationResult::errors`].
///
/// # Examples
///
/// ```no_run
/// use dbcoach::storage::{migrate_conversations, HostedStorage, LocalStorage};
/// use dbcoach::config::HostedStorageConfig;
///
/// # async fn example() -> dbcoach::error::Result<()> {
/// let local = LocalStorage::open("/tmp/dbcoach", 50)?;
/// let hosted = HostedStorage::new(HostedStorageConfig {
///     url: Some("https://example.supabase.co".to_string()),
///     api_key: Some("anon".to_string()),
///     ..Default::default()
/// })?;
/// let result = migrate_conversations(&local, &hosted).await?;
/// println!("migrated {}", result.migrated_count);
/// # Ok(())
/// # }
/// ```
pub async fn migrate_conversations(
    source: &dyn ConversationStorage,
    destination: &dyn ConversationStorage,
) -> Result<MigrationResult> {
    let records = source.load_conversations(None).await?;
    tracing::info!(
        "Migrating {} conversation(s) from {} to {}",
        records.len(),
        source.backend_name(),
        destination.backend_name()
    );

    let mut result = MigrationResult::default();
    for record in &records {
        match destination.save_conversation(record).await {
            Ok(()) => result.migrated_count += 1,
            Err(e) => {
                tracing::warn!("Failed to migrate conversation {}: {}", record.id, e);
                result.errors.push(MigrationError {
                    id: record.id.clone(),
                    message: e.to_string(),
                });
            }
        }
    }

    tracing::info!(
        "Migration finished: {} migrated, {} failed",
        result.migrated_count,
        result.errors.len()
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::{ConversationPatch, SavedConversation};
    use crate::error::DbCoachError;
    use crate::storage::LocalStorage;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use tempfile::tempdir;

    /// Destination that rejects a fixed set of ids and delegates the rest.
    struct FlakyDestination {
        inner: LocalStorage,
        reject: HashSet<String>,
    }

    #[async_trait]
    impl ConversationStorage for FlakyDestination {
        fn backend_name(&self) -> &'static str {
            "flaky"
        }

        async fn save_conversation(&self, record: &SavedConversation) -> Result<()> {
            if self.reject.contains(&record.id) {
                return Err(DbCoachError::Storage("remote write rejected".to_string()).into());
            }
            self.inner.save_conversation(record).await
        }

        async fn load_conversations(
            &self,
            owner_id: Option<&str>,
        ) -> Result<Vec<SavedConversation>> {
            self.inner.load_conversations(owner_id).await
        }

        async fn get_conversation(&self, id: &str) -> Result<Option<SavedConversation>> {
            self.inner.get_conversation(id).await
        }

        async fn delete_conversation(&self, id: &str) -> Result<()> {
            self.inner.delete_conversation(id).await
        }

        async fn update_conversation(
            &self,
            id: &str,
            patch: ConversationPatch,
        ) -> Result<SavedConversation> {
            self.inner.update_conversation(id, patch).await
        }

        async fn search_conversations(
            &self,
            query: &str,
            owner_id: Option<&str>,
        ) -> Result<Vec<SavedConversation>> {
            self.inner.search_conversations(query, owner_id).await
        }
    }

    #[tokio::test]
    async fn test_migration_collects_per_record_errors() {
        let dir = tempdir().unwrap();
        let source = LocalStorage::open(dir.path().join("source"), 50).unwrap();
        let mut ids = Vec::new();
        for i in 0..5 {
            let record = SavedConversation::new(format!("prompt {}", i), "MySQL");
            ids.push(record.id.clone());
            source.save_conversation(&record).await.unwrap();
        }

        let destination = FlakyDestination {
            inner: LocalStorage::open(dir.path().join("dest"), 50).unwrap(),
            reject: ids[..2].iter().cloned().collect(),
        };

        let result = migrate_conversations(&source, &destination).await.unwrap();
        assert_eq!(result.migrated_count, 3);
        assert_eq!(result.errors.len(), 2);
        assert_eq!(result.attempted(), 5);
        assert!(!result.is_complete());
        for error in &result.errors {
            assert!(ids[..2].contains(&error.id));
            assert!(error.message.contains("remote write rejected"));
        }
        assert_eq!(
            destination.load_conversations(None).await.unwrap().len(),
            3
        );
    }

    #[tokio::test]
    async fn test_migration_of_empty_source() {
        let dir = tempdir().unwrap();
        let source = LocalStorage::open(dir.path().join("source"), 50).unwrap();
        let destination = LocalStorage::open(dir.path().join("dest"), 50).unwrap();
        let result = migrate_conversations(&source, &destination).await.unwrap();
        assert_eq!(result, MigrationResult::default());
        assert!(result.is_complete());
    }

    #[tokio::test]
    async fn test_migration_is_repeatable() {
        let dir = tempdir().unwrap();
        let source = LocalStorage::open(dir.path().join("source"), 50).unwrap();
        let destination = LocalStorage::open(dir.path().join("dest"), 50).unwrap();
        source
            .save_conversation(&SavedConversation::new("blog", "MySQL"))
            .await
            .unwrap();

        migrate_conversations(&source, &destination).await.unwrap();
        let second = migrate_conversations(&source, &destination).await.unwrap();
        assert_eq!(second.migrated_count, 1);
        assert_eq!(
            destination.load_conversations(None).await.unwrap().len(),
            1
        );
    }
}

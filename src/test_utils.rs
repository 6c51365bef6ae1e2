//! Test utilities for DB.Coach
//!
//! Helpers for building conversations and temporary stores in unit tests.

use crate::conversation::{SavedConversation, TaskEntry, TaskStatus};
use crate::error::DbCoachError;
use crate::storage::LocalStorage;
use tempfile::TempDir;

/// Create a local store inside a fresh temporary directory
///
/// The directory is removed when the returned `TempDir` is dropped, so
/// keep it alive for the duration of the test.
pub fn temp_local_storage(max_conversations: usize) -> (TempDir, LocalStorage) {
    let dir = TempDir::new().expect("Failed to create temporary directory");
    let storage = LocalStorage::open(dir.path().join("conversations"), max_conversations)
        .expect("Failed to open local storage");
    (dir, storage)
}

/// Build a completed conversation with one finished task per
/// `(task_id, content)` pair
pub fn sample_conversation(prompt: &str, db_type: &str, content: &[(&str, &str)]) -> SavedConversation {
    let mut record = SavedConversation::new(prompt, db_type);
    for (task_id, text) in content {
        record.tasks.push(TaskEntry {
            id: task_id.to_string(),
            title: task_id.to_string(),
            agent: "Tester".to_string(),
            status: TaskStatus::Completed,
            progress: 100,
        });
        record
            .generated_content
            .insert(task_id.to_string(), text.to_string());
    }
    record
}

/// Assert that an error is a `DbCoachError` matching `predicate`
///
/// # Panics
///
/// Panics if the error is not a `DbCoachError` or the predicate fails
pub fn assert_dbcoach_error(err: &anyhow::Error, predicate: impl Fn(&DbCoachError) -> bool) {
    match err.downcast_ref::<DbCoachError>() {
        Some(e) => assert!(predicate(e), "unexpected error variant: {:?}", e),
        None => panic!("not a DbCoachError: {}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ConversationStorage;

    #[tokio::test]
    async fn test_temp_local_storage_is_empty() {
        let (_dir, storage) = temp_local_storage(5);
        assert!(storage.load_conversations(None).await.unwrap().is_empty());
        assert_eq!(storage.max_conversations(), 5);
    }

    #[test]
    fn test_sample_conversation_is_valid() {
        let record = sample_conversation("a shop", "MySQL", &[("schema", "CREATE TABLE t();")]);
        assert!(record.validate().is_ok());
        assert_eq!(record.tasks.len(), 1);
    }

    #[test]
    fn test_assert_dbcoach_error() {
        let err: anyhow::Error = DbCoachError::NotFound("x".to_string()).into();
        assert_dbcoach_error(&err, |e| matches!(e, DbCoachError::NotFound(_)));
    }
}

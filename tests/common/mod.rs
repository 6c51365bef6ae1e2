use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

use dbcoach::config::HostedStorageConfig;
use dbcoach::conversation::{SavedConversation, TaskEntry, TaskStatus};
use dbcoach::storage::row::ConversationRow;
use dbcoach::storage::LocalStorage;

#[allow(dead_code)]
pub fn create_temp_storage(max_conversations: usize) -> (LocalStorage, TempDir) {
    let tmp = TempDir::new().expect("failed to create tempdir");
    let storage = LocalStorage::open(tmp.path().join("conversations"), max_conversations)
        .expect("failed to open local storage");
    (storage, tmp)
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

/// Completed conversation with one finished task holding `content`
#[allow(dead_code)]
pub fn sample_conversation(prompt: &str, db_type: &str, content: &str) -> SavedConversation {
    let mut record = SavedConversation::new(prompt, db_type);
    record.tasks.push(TaskEntry {
        id: "schema".to_string(),
        title: "Schema Design".to_string(),
        agent: "Schema Architect".to_string(),
        status: TaskStatus::Completed,
        progress: 100,
    });
    record
        .generated_content
        .insert("schema".to_string(), content.to_string());
    record
}

/// Hosted store configuration pointing at a mock server
#[allow(dead_code)]
pub fn hosted_config(server_uri: &str) -> HostedStorageConfig {
    HostedStorageConfig {
        url: Some(server_uri.to_string()),
        api_key: Some("test-anon-key".to_string()),
        max_retries: 2,
        retry_backoff_ms: 1,
        timeout_seconds: 5,
        ..Default::default()
    }
}

/// JSON rows as the hosted table would return them
#[allow(dead_code)]
pub fn rows_json(records: &[&SavedConversation]) -> serde_json::Value {
    let rows: Vec<ConversationRow> = records.iter().map(|r| ConversationRow::from(*r)).collect();
    serde_json::to_value(rows).expect("rows serialize")
}

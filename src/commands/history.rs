//! History command handler

use crate::cli::HistoryCommand;
use crate::commands::truncate;
use crate::conversation::{ConversationPatch, SavedConversation};
use crate::error::{DbCoachError, Result};
use crate::storage::{ConversationStorage, ConversationSummary};
use colored::Colorize;
use prettytable::{format, Table};

/// Id characters shown in history tables
const SHORT_ID_LEN: usize = 8;

/// Handle history commands against `storage`
///
/// `owner_id` limits list and search to one user's conversations.
pub async fn handle_history(
    command: HistoryCommand,
    storage: &dyn ConversationStorage,
    owner_id: Option<&str>,
) -> Result<()> {
    match command {
        HistoryCommand::List => {
            let records = storage.load_conversations(owner_id).await?;
            if records.is_empty() {
                println!("{}", "No conversation history found.".yellow());
                return Ok(());
            }
            println!("\nConversation History ({}):", storage.backend_name());
            summary_table(&records).printstd();
            println!();
            println!(
                "Use {} to view a conversation.",
                "dbcoach history show <ID>".cyan()
            );
            println!();
        }
        HistoryCommand::Show { id } => match find_conversation(storage, &id).await? {
            Some(record) => print_conversation(&record),
            None => return Err(DbCoachError::NotFound(id).into()),
        },
        HistoryCommand::Search { query } => {
            let records = storage.search_conversations(&query, owner_id).await?;
            if records.is_empty() {
                println!("{}", format!("No conversations match '{}'.", query).yellow());
                return Ok(());
            }
            println!("\n{} match(es) for '{}':", records.len(), query);
            summary_table(&records).printstd();
            println!();
        }
        HistoryCommand::Delete { id } => {
            match find_conversation(storage, &id).await? {
                Some(record) => {
                    storage.delete_conversation(&record.id).await?;
                    println!("{}", format!("Deleted conversation {}", record.id).green());
                }
                None => {
                    println!("{}", format!("No conversation with id {}", id).yellow());
                }
            }
        }
        HistoryCommand::Rename { id, title } => {
            let title = title.trim().to_string();
            if title.is_empty() {
                return Err(
                    DbCoachError::InvalidRecord("title cannot be empty".to_string()).into(),
                );
            }
            let record = find_conversation(storage, &id)
                .await?
                .ok_or_else(|| DbCoachError::NotFound(id.clone()))?;
            let updated = storage
                .update_conversation(&record.id, ConversationPatch::title(title))
                .await?;
            println!(
                "{}",
                format!("Renamed {} to \"{}\"", updated.id, updated.title).green()
            );
        }
    }

    Ok(())
}

/// Look up a conversation by full id or by a unique id prefix
///
/// Tables show the first [`SHORT_ID_LEN`] characters of each id, so any
/// id copied from `list` or `search` resolves here.
///
/// # Errors
///
/// Returns `DbCoachError::AmbiguousId` when the prefix matches more
/// than one conversation.
async fn find_conversation(
    storage: &dyn ConversationStorage,
    id: &str,
) -> Result<Option<SavedConversation>> {
    if let Some(record) = storage.get_conversation(id).await? {
        return Ok(Some(record));
    }

    let mut matches = storage.find_by_id_prefix(id).await?;
    if matches.len() > 1 {
        return Err(DbCoachError::AmbiguousId(format!(
            "'{}' matches {} conversations",
            id,
            matches.len()
        ))
        .into());
    }
    Ok(matches.pop())
}

/// Build the list table for `records`
fn summary_table(records: &[SavedConversation]) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);

    table.add_row(prettytable::row![
        "ID".bold(),
        "Title".bold(),
        "Database".bold(),
        "Status".bold(),
        "Tasks".bold(),
        "Created".bold()
    ]);

    for summary in records.iter().map(ConversationSummary::from) {
        let id_short: String = summary.id.chars().take(SHORT_ID_LEN).collect();
        table.add_row(prettytable::row![
            id_short.cyan(),
            truncate(&summary.title, 40),
            summary.db_type,
            summary.status,
            summary.task_count,
            summary.created_at.format("%Y-%m-%d %H:%M")
        ]);
    }

    table
}

fn print_conversation(record: &SavedConversation) {
    println!();
    println!("{}", record.title.bold());
    println!("{} {}", "ID:".dimmed(), record.id);
    println!("{} {}", "Database:".dimmed(), record.db_type);
    println!("{} {}", "Status:".dimmed(), record.status);
    println!(
        "{} {}",
        "Created:".dimmed(),
        record.created_at.format("%Y-%m-%d %H:%M:%S")
    );
    if let Some(metadata) = &record.metadata {
        println!(
            "{} {} ms, {} chunks, {} insights",
            "Run:".dimmed(),
            metadata.duration_ms,
            metadata.chunk_count,
            metadata.insight_count
        );
    }
    println!();
    println!("{}", "Request".bold().underline());
    println!("{}", record.prompt);

    for task in &record.tasks {
        if let Some(content) = record.generated_content.get(&task.id) {
            println!();
            println!(
                "{} {}",
                task.title.bold().underline(),
                format!("({})", task.agent).dimmed()
            );
            println!("{}", content);
        }
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalStorage;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_rename_updates_title() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::open(dir.path(), 50).unwrap();
        let record = SavedConversation::new("a blog", "MySQL");
        storage.save_conversation(&record).await.unwrap();

        handle_history(
            HistoryCommand::Rename {
                id: record.id.clone(),
                title: "  My Blog  ".to_string(),
            },
            &storage,
            None,
        )
        .await
        .unwrap();

        let loaded = storage.get_conversation(&record.id).await.unwrap().unwrap();
        assert_eq!(loaded.title, "My Blog");
    }

    #[tokio::test]
    async fn test_rename_missing_is_not_found() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::open(dir.path(), 50).unwrap();
        let err = handle_history(
            HistoryCommand::Rename {
                id: "missing".to_string(),
                title: "x".to_string(),
            },
            &storage,
            None,
        )
        .await
        .unwrap_err();
        assert!(DbCoachError::is_not_found(&err));
    }

    #[tokio::test]
    async fn test_show_missing_is_not_found() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::open(dir.path(), 50).unwrap();
        let err = handle_history(
            HistoryCommand::Show {
                id: "missing".to_string(),
            },
            &storage,
            None,
        )
        .await
        .unwrap_err();
        assert!(DbCoachError::is_not_found(&err));
    }

    #[tokio::test]
    async fn test_delete_removes_record() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::open(dir.path(), 50).unwrap();
        let record = SavedConversation::new("a shop", "MySQL");
        storage.save_conversation(&record).await.unwrap();

        handle_history(HistoryCommand::Delete { id: record.id.clone() }, &storage, None)
            .await
            .unwrap();
        handle_history(HistoryCommand::Delete { id: record.id.clone() }, &storage, None)
            .await
            .unwrap();
        assert!(storage.get_conversation(&record.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_show_and_search_existing() {
        let (_dir, storage) = crate::test_utils::temp_local_storage(50);
        let record = crate::test_utils::sample_conversation(
            "a hospital",
            "PostgreSQL",
            &[("schema", "CREATE TABLE patients ();")],
        );
        storage.save_conversation(&record).await.unwrap();

        handle_history(HistoryCommand::Show { id: record.id.clone() }, &storage, None)
            .await
            .unwrap();
        handle_history(
            HistoryCommand::Search {
                query: "HOSPITAL".to_string(),
            },
            &storage,
            None,
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_short_ids_from_list_resolve() {
        let (_dir, storage) = crate::test_utils::temp_local_storage(50);
        let record = SavedConversation::new("a ferry timetable", "PostgreSQL");
        storage.save_conversation(&record).await.unwrap();
        let short: String = record.id.chars().take(SHORT_ID_LEN).collect();

        handle_history(HistoryCommand::Show { id: short.clone() }, &storage, None)
            .await
            .unwrap();
        handle_history(
            HistoryCommand::Rename {
                id: short.clone(),
                title: "Ferries".to_string(),
            },
            &storage,
            None,
        )
        .await
        .unwrap();
        let renamed = storage.get_conversation(&record.id).await.unwrap().unwrap();
        assert_eq!(renamed.title, "Ferries");

        handle_history(HistoryCommand::Delete { id: short }, &storage, None)
            .await
            .unwrap();
        assert!(storage.get_conversation(&record.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ambiguous_prefix_is_rejected() {
        let (_dir, storage) = crate::test_utils::temp_local_storage(50);
        let mut first = SavedConversation::new("a shop", "MySQL");
        first.id = "abc00000-0000-4000-8000-000000000001".to_string();
        let mut second = SavedConversation::new("a blog", "MySQL");
        second.id = "abc00000-0000-4000-8000-000000000002".to_string();
        storage.save_conversation(&first).await.unwrap();
        storage.save_conversation(&second).await.unwrap();

        let err = handle_history(
            HistoryCommand::Show {
                id: "abc00000".to_string(),
            },
            &storage,
            None,
        )
        .await
        .unwrap_err();
        crate::test_utils::assert_dbcoach_error(&err, |e| {
            matches!(e, DbCoachError::AmbiguousId(_))
        });
    }

    #[test]
    fn test_summary_table_has_header_and_rows() {
        let records = vec![
            SavedConversation::new("a shop", "MySQL"),
            SavedConversation::new("a blog", "MySQL"),
        ];
        assert_eq!(summary_table(&records).len(), 3);
    }
}

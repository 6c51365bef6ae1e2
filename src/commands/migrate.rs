//! Migrate command handler

use crate::config::Config;
use crate::error::Result;
use crate::storage::{
    migrate_conversations, ConversationStorage, HostedStorage, LocalStorage, MigrationResult,
};
use colored::Colorize;
use prettytable::{format, Table};

/// Copy local conversations to the hosted backend
pub async fn run_migrate(config: &Config, clear_local: bool) -> Result<()> {
    let local = LocalStorage::open(
        config.storage.local.resolve_path()?,
        config.storage.local.max_conversations,
    )?;
    let hosted = HostedStorage::new(config.storage.hosted.clone())?;

    let result = migrate_local(&local, &hosted, clear_local).await?;
    print_result(&result);
    Ok(())
}

/// Migrate `local` into `destination`, clearing `local` afterwards when
/// requested and every record succeeded
pub async fn migrate_local(
    local: &LocalStorage,
    destination: &dyn ConversationStorage,
    clear_local: bool,
) -> Result<MigrationResult> {
    let result = migrate_conversations(local, destination).await?;

    if clear_local {
        if result.is_complete() {
            local.clear()?;
            tracing::info!("Cleared local conversation store after migration");
        } else {
            tracing::warn!(
                "Keeping local conversations: {} record(s) failed to migrate",
                result.errors.len()
            );
        }
    }

    Ok(result)
}

fn print_result(result: &MigrationResult) {
    if result.attempted() == 0 {
        println!("{}", "No local conversations to migrate.".yellow());
        return;
    }

    let summary = format!(
        "Migrated {} of {} conversation(s)",
        result.migrated_count,
        result.attempted()
    );
    if result.is_complete() {
        println!("{}", summary.green());
        return;
    }
    println!("{}", summary.yellow());

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
    table.add_row(prettytable::row!["ID".bold(), "Error".bold()]);
    for error in &result.errors {
        table.add_row(prettytable::row![error.id.red(), error.message]);
    }
    table.printstd();
}

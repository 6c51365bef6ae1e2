//! Command-line interface definition for DB.Coach
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for generation, history management and migration.

use crate::config::StorageBackend;
use clap::{Parser, Subcommand};

/// DB.Coach - describe a database, get a schema
///
/// Runs streaming generation sessions and manages saved conversations
/// in the local or hosted store.
#[derive(Parser, Debug, Clone)]
#[command(name = "dbcoach")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Override the storage backend from config
    #[arg(short, long, value_enum)]
    pub backend: Option<StorageBackend>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for DB.Coach
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run a generation session for a database description
    Generate {
        /// Free-text description of the database
        #[arg(short, long)]
        prompt: String,

        /// Target database type
        #[arg(short, long, default_value = "PostgreSQL")]
        db_type: String,

        /// Use the built-in offline generator instead of the API
        #[arg(long)]
        offline: bool,

        /// Do not save the finished conversation
        #[arg(long)]
        no_save: bool,
    },

    /// Manage saved conversations
    History {
        /// History subcommand
        #[command(subcommand)]
        command: HistoryCommand,
    },

    /// Copy local conversations to the hosted backend
    Migrate {
        /// Clear the local store when every record migrated
        #[arg(long)]
        clear_local: bool,
    },
}

/// History management subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum HistoryCommand {
    /// List saved conversations, newest first
    List,

    /// Show one conversation with its generated content
    Show {
        /// Conversation id, or a unique prefix as shown by `list`
        id: String,
    },

    /// Search titles, prompts and database types
    Search {
        /// Case-insensitive search text
        query: String,
    },

    /// Delete a conversation
    Delete {
        /// Conversation id, or a unique prefix as shown by `list`
        id: String,
    },

    /// Change a conversation's title
    Rename {
        /// Conversation id, or a unique prefix as shown by `list`
        id: String,

        /// New title
        title: String,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/config.yaml".to_string()),
            verbose: false,
            backend: None,
            command: Commands::History {
                command: HistoryCommand::List,
            },
        }
    }
}

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command line interface for the media sweep engine.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Override the data directory.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
    /// Actor id recorded in the audit log for CLI-driven deletions.
    #[arg(long)]
    pub actor: Option<i64>,
    /// Enable or disable logging (true/false).
    #[arg(long)]
    pub logging: Option<bool>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the daily maintenance scheduler until interrupted.
    Run,
    /// Sweep the media of one owner as if it were permanently deleted.
    Sweep { owner_id: i64 },
    /// Bulk-delete owners together with their unreferenced media.
    Bulk { owner_ids: Vec<i64> },
    /// Show how many media items an owner would take down with it.
    Count { owner_id: i64 },
    /// List recent audit log entries.
    Logs {
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Purge audit entries past the retention window now.
    Retention,
    /// Remove all engine state from the store.
    Uninstall {
        /// Keep the audit log table.
        #[arg(long)]
        keep_logs: bool,
    },
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: None,
            data_dir: None,
            actor: None,
            logging: None,
            command: Command::Run,
        }
    }
}

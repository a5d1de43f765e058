pub mod accounts;
pub mod analyze;
pub mod exclusions;
pub mod import;
pub mod init;

use chrono::Duration;
use clap::{Parser, Subcommand};
use rusqlite::Connection;

use crate::classify::MatchConfig;
use crate::db;
use crate::error::Result;
use crate::exclusions::ExclusionRegistry;
use crate::executor;
use crate::models::{Account, CandidateTransaction};
use crate::session::ReviewSession;

#[derive(Parser)]
#[command(name = "reckon", about = "Personal-finance ledger with import reconciliation.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Set up Reckon: choose a data directory and initialize the database.
    Init {
        /// Path for Reckon data (default: ~/Documents/reckon)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Manage accounts.
    Accounts {
        #[command(subcommand)]
        command: AccountsCommands,
    },
    /// Review a statement CSV against the ledger without writing anything.
    Analyze {
        /// Path to a statement CSV (date, description, amount columns)
        file: String,
        /// Account name to reconcile against
        #[arg(long)]
        account: String,
    },
    /// Import a statement CSV: analyze, auto-resolve, and execute.
    Import {
        /// Path to a statement CSV
        file: String,
        /// Account name to import into
        #[arg(long)]
        account: String,
        /// Treat items left pending after auto-resolve as Skip.
        #[arg(long)]
        force: bool,
    },
    /// Inspect stored not-a-duplicate exclusions.
    Exclusions {
        #[command(subcommand)]
        command: ExclusionsCommands,
    },
}

#[derive(Subcommand)]
pub enum AccountsCommands {
    /// Add a new account.
    Add {
        name: String,
        #[arg(long = "type", default_value = "checking")]
        account_type: String,
        #[arg(long)]
        institution: Option<String>,
        #[arg(long = "last-four")]
        last_four: Option<String>,
    },
    List,
}

#[derive(Subcommand)]
pub enum ExclusionsCommands {
    /// List exclusions recorded for an account.
    List {
        #[arg(long)]
        account: String,
    },
}

/// Open a review session for a candidate batch: snapshot the existing pool
/// around the batch's date span, load the account's exclusions, classify.
pub(crate) fn open_session(
    conn: &Connection,
    account: &Account,
    candidates: Vec<CandidateTransaction>,
    config: &MatchConfig,
) -> Result<ReviewSession> {
    let dates: Vec<chrono::NaiveDate> = candidates.iter().filter_map(|c| c.date).collect();
    let pool = match (dates.iter().min(), dates.iter().max()) {
        (Some(&min), Some(&max)) => db::load_pool(
            conn,
            account.id,
            min - Duration::days(config.date_window_days),
            max + Duration::days(config.date_window_days),
        )?,
        _ => Vec::new(),
    };
    let registry = ExclusionRegistry::load(conn, account.id)?;
    let session_id = executor::batch_id(account.id, &candidates);
    Ok(ReviewSession::analyze(
        &session_id,
        account.id,
        candidates,
        &pool,
        &registry,
        config,
    ))
}

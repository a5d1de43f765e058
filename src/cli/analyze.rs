use std::path::Path;

use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::db::{find_account, get_connection};
use crate::error::Result;
use crate::fmt::money;
use crate::ingest::read_candidates;
use crate::session::ReviewSession;
use crate::settings::{get_data_dir, load_settings};

pub fn run(file: &str, account: &str) -> Result<()> {
    let settings = load_settings();
    let conn = get_connection(&get_data_dir().join("reckon.db"))?;
    let account = find_account(&conn, account)?;
    let candidates = read_candidates(Path::new(file))?;
    let session = super::open_session(&conn, &account, candidates, &settings.matching)?;

    print_conflicts(&session);
    Ok(())
}

pub(crate) fn print_conflicts(session: &ReviewSession) {
    let mut table = Table::new();
    table.set_header(vec!["#", "Bucket", "Date", "Description", "Amount", "Confidence", "Counterpart"]);
    for item in &session.conflicts.items {
        let date = item
            .candidate
            .date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "?".to_string());
        let amount = item
            .candidate
            .amount_cents
            .map(money)
            .unwrap_or_else(|| "?".to_string());
        let confidence = if item.result.matches.is_empty() {
            String::new()
        } else {
            format!("{:.0}%", item.result.confidence * 100.0)
        };
        let counterpart = item
            .result
            .matches
            .first()
            .map(|m| format!("#{} {}", m.transaction.id, m.transaction.date))
            .unwrap_or_default();
        table.add_row(vec![
            Cell::new(item.index),
            Cell::new(item.bucket.label()),
            Cell::new(date),
            Cell::new(&item.candidate.description),
            Cell::new(amount),
            Cell::new(confidence),
            Cell::new(counterpart),
        ]);
    }
    println!("{table}");

    if !session.conflicts.unmatched_system.is_empty() {
        println!("\n{}", "In your ledger but not on the statement:".bold());
        let mut table = Table::new();
        table.set_header(vec!["ID", "Date", "Description", "Amount"]);
        for txn in &session.conflicts.unmatched_system {
            table.add_row(vec![
                Cell::new(txn.id),
                Cell::new(txn.date),
                Cell::new(&txn.description),
                Cell::new(money(txn.amount_cents)),
            ]);
        }
        println!("{table}");
    }

    let stats = &session.conflicts.stats;
    println!(
        "\n{} candidates: {} {}, {} {}, {} {}, {} {}",
        stats.total,
        stats.exact_duplicates.to_string().red(),
        "exact duplicates",
        stats.fuzzy_matches.to_string().yellow(),
        "fuzzy matches",
        stats.ready_to_import.to_string().green(),
        "ready to import",
        stats.unmatched_bank,
        "needing attention",
    );
    for item in &session.conflicts.items {
        for warning in &item.result.warnings {
            println!("  {} {warning}", "warning:".yellow());
        }
    }
}

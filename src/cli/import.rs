use std::path::Path;

use colored::Colorize;

use crate::db::{find_account, get_connection};
use crate::error::Result;
use crate::executor::{ExecuteOptions, NoopTransferLinker};
use crate::ingest::read_candidates;
use crate::settings::{get_data_dir, load_settings};

pub fn run(file: &str, account: &str, force: bool) -> Result<()> {
    let settings = load_settings();
    let mut conn = get_connection(&get_data_dir().join("reckon.db"))?;
    let account = find_account(&conn, account)?;
    let candidates = read_candidates(Path::new(file))?;
    let mut session = super::open_session(&conn, &account, candidates, &settings.matching)?;

    session.auto_resolve(&settings.matching);
    let progress = session.progress();
    println!(
        "{} of {} items auto-resolved ({:.0}% reviewed)",
        progress.decided, progress.total, progress.percent
    );
    if progress.decided < progress.total && !force {
        super::analyze::print_conflicts(&session);
        println!(
            "\n{} items need manual review; re-run with --force to skip them",
            progress.total - progress.decided
        );
    }

    let report = session.execute(
        &mut conn,
        &NoopTransferLinker,
        &ExecuteOptions { force, cancel: None },
    )?;

    println!(
        "{} imported, {} already imported, {} skipped, {} excluded, {} transferred",
        report.imported.to_string().green(),
        report.already_imported,
        report.skipped,
        report.excluded,
        report.transferred,
    );
    for err in &report.errors {
        println!("  {} item {}: {} ({})", "failed:".red(), err.index, err.description, err.message);
    }
    Ok(())
}

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rusqlite::Connection;
use sha2::{Digest, Sha256};

use crate::conflict::ConflictSet;
use crate::decisions::{Decision, DecisionTracker};
use crate::error::{ReckonError, Result};
use crate::exclusions;
use crate::models::CandidateTransaction;
use crate::normalize::{self, NormalizedRecord};

// ---------------------------------------------------------------------------
// Collaborator seam
// ---------------------------------------------------------------------------

/// External transfer-linking service. MergeAsTransfer decisions are handed
/// off here instead of creating a plain transaction.
pub trait TransferLinker {
    fn link(
        &self,
        conn: &Connection,
        candidate: &CandidateTransaction,
        target_transaction_id: i64,
    ) -> Result<()>;
}

/// Default linker for contexts with no transfer service wired in.
pub struct NoopTransferLinker;

impl TransferLinker for NoopTransferLinker {
    fn link(&self, _conn: &Connection, _candidate: &CandidateTransaction, _target: i64) -> Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Options and report
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct ExecuteOptions {
    /// Treat remaining Pending decisions as Skip instead of refusing.
    pub force: bool,
    /// Checked before each item; once set, no further writes are issued and
    /// the partial report is returned. Committed items stay committed.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl ExecuteOptions {
    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone)]
pub struct ItemError {
    pub index: usize,
    pub description: String,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct ExecutionReport {
    pub imported: usize,
    /// Idempotency-key hits: the row was created by an earlier run of the
    /// same batch. Not an error.
    pub already_imported: usize,
    pub skipped: usize,
    pub excluded: usize,
    pub transferred: usize,
    pub cancelled: bool,
    pub errors: Vec<ItemError>,
}

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// Batch identity derived from the candidate set, so a retry of the same
/// batch produces the same per-item idempotency keys.
pub fn batch_id(account_id: i64, candidates: &[CandidateTransaction]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(account_id.to_le_bytes());
    for candidate in candidates {
        hasher.update(normalize::fingerprint(&normalize::normalize(candidate)).as_bytes());
    }
    hex::encode(&hasher.finalize()[..12])
}

fn idempotency_key(account_id: i64, record: &NormalizedRecord, batch: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(account_id.to_le_bytes());
    hasher.update(record.amount_cents.unwrap_or(0).to_le_bytes());
    hasher.update(
        record
            .date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
    );
    hasher.update(record.description.as_bytes());
    hasher.update(batch.as_bytes());
    hex::encode(hasher.finalize())
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Apply the decision set to the ledger inside one transaction. Refuses
/// up-front (zero writes) while any decision is Pending unless `force` is
/// set. Per-item failures are collected in the report and processing
/// continues; re-running the same batch is safe because inserts carry a
/// unique idempotency key.
pub fn execute(
    conn: &mut Connection,
    account_id: i64,
    conflicts: &ConflictSet,
    tracker: &DecisionTracker,
    linker: &dyn TransferLinker,
    options: &ExecuteOptions,
) -> Result<ExecutionReport> {
    if !options.force {
        let pending = tracker.pending_count();
        if pending > 0 {
            return Err(ReckonError::Precondition(format!(
                "{pending} item(s) still pending review; decide them or pass force"
            )));
        }
    }

    let batch = batch_id(
        account_id,
        &conflicts
            .items
            .iter()
            .map(|i| i.candidate.clone())
            .collect::<Vec<_>>(),
    );

    let mut report = ExecutionReport::default();
    let tx = conn.transaction()?;

    for item in &conflicts.items {
        if options.cancelled() {
            report.cancelled = true;
            break;
        }

        // Pending only survives to this point under force, where it means Skip.
        let outcome = match tracker.get(item.index) {
            Decision::Pending | Decision::Skip => {
                report.skipped += 1;
                Ok(())
            }
            Decision::Import => import_item(&tx, account_id, &item.candidate, &batch, &mut report),
            Decision::MarkNotDuplicate => {
                exclude_item(&tx, account_id, item, &mut report)
            }
            Decision::MergeAsTransfer(target) => linker
                .link(&tx, &item.candidate, target)
                .map(|_| report.transferred += 1),
        };

        if let Err(e) = outcome {
            report.errors.push(ItemError {
                index: item.index,
                description: item.candidate.description.clone(),
                message: e.to_string(),
            });
        }
    }

    tx.execute(
        "INSERT INTO import_batches (batch_id, account_id, total, imported, already_imported, \
                                     skipped, excluded, transferred, failed) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        rusqlite::params![
            batch,
            account_id,
            conflicts.items.len(),
            report.imported,
            report.already_imported,
            report.skipped,
            report.excluded,
            report.transferred,
            report.errors.len(),
        ],
    )?;
    tx.commit()?;
    Ok(report)
}

fn import_item(
    conn: &Connection,
    account_id: i64,
    candidate: &CandidateTransaction,
    batch: &str,
    report: &mut ExecutionReport,
) -> Result<()> {
    let record = normalize::normalize(candidate);
    let (Some(amount), Some(date)) = (record.amount_cents, record.date) else {
        return Err(ReckonError::Validation(
            "cannot import a candidate with a malformed amount or date".to_string(),
        ));
    };

    let key = idempotency_key(account_id, &record, batch);
    // Key check and insert in one statement: no read-then-write race across
    // concurrent execution attempts for the same batch.
    let changed = conn.execute(
        "INSERT INTO transactions (account_id, date, description, amount_cents, currency, \
                                   external_ref, category, source, idempotency_key) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'import', ?8) \
         ON CONFLICT(idempotency_key) DO NOTHING",
        rusqlite::params![
            account_id,
            date.format("%Y-%m-%d").to_string(),
            record.description,
            amount,
            candidate.currency,
            candidate.external_ref,
            candidate.bank_category,
            key,
        ],
    )?;
    if changed == 0 {
        report.already_imported += 1;
    } else {
        report.imported += 1;
    }
    Ok(())
}

fn exclude_item(
    conn: &Connection,
    account_id: i64,
    item: &crate::conflict::ConflictItem,
    report: &mut ExecutionReport,
) -> Result<()> {
    let record = normalize::normalize(&item.candidate);
    let mut id_set = vec![exclusions::candidate_member(&record)];
    id_set.extend(
        item.result
            .matches
            .iter()
            .map(|m| exclusions::transaction_member(m.transaction.id)),
    );
    exclusions::record_exclusion(
        conn,
        account_id,
        &id_set,
        item.result.confidence,
        Some("dismissed during import review"),
    )?;
    report.excluded += 1;
    Ok(())
}

use crate::classify::Classification;
use crate::conflict::{Bucket, ConflictSet};
use crate::error::{ReckonError, Result};

/// What to do with one candidate. Session-scoped and never persisted; any
/// decision can be revoked back to Pending until execution commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Pending,
    Import,
    Skip,
    MarkNotDuplicate,
    /// Link to an existing ledger transaction instead of creating a new one.
    MergeAsTransfer(i64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub decided: usize,
    pub total: usize,
    pub percent: f64,
}

/// One decision slot per candidate, keyed by batch index. Single writer
/// expected; concurrent writers get last-write-wins per candidate.
#[derive(Debug, Clone)]
pub struct DecisionTracker {
    decisions: Vec<Decision>,
}

impl DecisionTracker {
    pub fn new(total: usize) -> Self {
        Self {
            decisions: vec![Decision::Pending; total],
        }
    }

    pub fn get(&self, index: usize) -> Decision {
        self.decisions
            .get(index)
            .copied()
            .unwrap_or(Decision::Pending)
    }

    /// Individual override: always allowed, idempotent.
    pub fn set(&mut self, index: usize, decision: Decision) -> Result<()> {
        let slot = self.decisions.get_mut(index).ok_or_else(|| {
            ReckonError::Validation(format!("no candidate at index {index}"))
        })?;
        *slot = decision;
        Ok(())
    }

    /// Apply a decision to every currently-Pending item in a bucket. Items
    /// the user already decided individually are never touched. Returns how
    /// many items were set.
    pub fn bulk_apply(&mut self, conflicts: &ConflictSet, bucket: Bucket, decision: Decision) -> usize {
        let mut applied = 0;
        for item in conflicts.items.iter().filter(|i| i.bucket == bucket) {
            if self.get(item.index) == Decision::Pending {
                self.decisions[item.index] = decision;
                applied += 1;
            }
        }
        applied
    }

    /// Policy bulk action: exact duplicates are skipped, clean items are
    /// imported, and fuzzy matches at or above `auto_import_threshold` are
    /// imported. Everything else stays Pending for manual review.
    pub fn auto_resolve(&mut self, conflicts: &ConflictSet, auto_import_threshold: f64) -> usize {
        let mut applied = 0;
        for item in &conflicts.items {
            if self.get(item.index) != Decision::Pending {
                continue;
            }
            let decision = match item.bucket {
                Bucket::ExactDuplicates => Some(Decision::Skip),
                Bucket::ReadyToImport => Some(Decision::Import),
                Bucket::FuzzyMatches
                    if item.result.classification == Classification::FuzzyMatch
                        && item.result.confidence >= auto_import_threshold =>
                {
                    Some(Decision::Import)
                }
                _ => None,
            };
            if let Some(d) = decision {
                self.decisions[item.index] = d;
                applied += 1;
            }
        }
        applied
    }

    pub fn clear_all(&mut self) {
        for slot in &mut self.decisions {
            *slot = Decision::Pending;
        }
    }

    pub fn pending_count(&self) -> usize {
        self.decisions
            .iter()
            .filter(|d| **d == Decision::Pending)
            .count()
    }

    /// "Percent reviewed" counts any non-Pending decision, whichever it is.
    pub fn progress(&self) -> Progress {
        let total = self.decisions.len();
        let decided = total - self.pending_count();
        let percent = if total == 0 {
            100.0
        } else {
            decided as f64 / total as f64 * 100.0
        };
        Progress {
            decided,
            total,
            percent,
        }
    }
}

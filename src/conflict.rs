use chrono::NaiveDate;

use crate::classify::{classify, Classification, MatchConfig, MatchResult};
use crate::exclusions::ExclusionRegistry;
use crate::models::{CandidateTransaction, LedgerTransaction};

/// Review buckets. Every candidate lands in exactly one of the first four;
/// `UnmatchedSystem` holds existing ledger rows the statement never mentioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    ExactDuplicates,
    FuzzyMatches,
    ReadyToImport,
    UnmatchedBank,
    UnmatchedSystem,
}

impl Bucket {
    pub fn label(&self) -> &'static str {
        match self {
            Bucket::ExactDuplicates => "Exact duplicates",
            Bucket::FuzzyMatches => "Fuzzy matches",
            Bucket::ReadyToImport => "Ready to import",
            Bucket::UnmatchedBank => "Unmatched (bank)",
            Bucket::UnmatchedSystem => "Unmatched (ledger)",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConflictItem {
    /// Position in the candidate batch; the candidate's session identity.
    pub index: usize,
    pub candidate: CandidateTransaction,
    pub result: MatchResult,
    pub bucket: Bucket,
}

#[derive(Debug, Clone, Default)]
pub struct ConflictStats {
    pub total: usize,
    pub exact_duplicates: usize,
    pub fuzzy_matches: usize,
    pub ready_to_import: usize,
    pub unmatched_bank: usize,
    pub unmatched_system: usize,
}

#[derive(Debug, Clone)]
pub struct ConflictSet {
    pub items: Vec<ConflictItem>,
    pub unmatched_system: Vec<LedgerTransaction>,
    pub stats: ConflictStats,
}

fn bucket_for(result: &MatchResult) -> Bucket {
    match result.classification {
        Classification::ExactDuplicate => Bucket::ExactDuplicates,
        Classification::FuzzyMatch => Bucket::FuzzyMatches,
        Classification::Unmatched if result.warnings.is_empty() => Bucket::ReadyToImport,
        Classification::Unmatched => Bucket::UnmatchedBank,
    }
}

/// Classify the whole batch and partition the results. Candidates are
/// independent; rebuilding from scratch (after an exclusion is recorded
/// mid-session) is the supported update path.
pub fn build(
    candidates: &[CandidateTransaction],
    pool: &[LedgerTransaction],
    registry: &ExclusionRegistry,
    config: &MatchConfig,
) -> ConflictSet {
    let items: Vec<ConflictItem> = candidates
        .iter()
        .enumerate()
        .map(|(index, candidate)| {
            let result = classify(candidate, pool, registry, config);
            let bucket = bucket_for(&result);
            ConflictItem {
                index,
                candidate: candidate.clone(),
                result,
                bucket,
            }
        })
        .collect();

    let unmatched_system = find_unmatched_system(&items, pool, candidates);

    let mut stats = ConflictStats {
        total: items.len(),
        unmatched_system: unmatched_system.len(),
        ..Default::default()
    };
    for item in &items {
        match item.bucket {
            Bucket::ExactDuplicates => stats.exact_duplicates += 1,
            Bucket::FuzzyMatches => stats.fuzzy_matches += 1,
            Bucket::ReadyToImport => stats.ready_to_import += 1,
            Bucket::UnmatchedBank => stats.unmatched_bank += 1,
            Bucket::UnmatchedSystem => {}
        }
    }

    ConflictSet {
        items,
        unmatched_system,
        stats,
    }
}

/// Ledger transactions never chosen as any candidate's best match, inside
/// the date span of the batch. "Things in your ledger the statement doesn't
/// mention."
fn find_unmatched_system(
    items: &[ConflictItem],
    pool: &[LedgerTransaction],
    candidates: &[CandidateTransaction],
) -> Vec<LedgerTransaction> {
    let dates: Vec<NaiveDate> = candidates.iter().filter_map(|c| c.date).collect();
    let (Some(&start), Some(&end)) = (dates.iter().min(), dates.iter().max()) else {
        return Vec::new();
    };

    let selected: std::collections::HashSet<i64> = items
        .iter()
        .filter_map(|i| i.result.matches.first().map(|m| m.transaction.id))
        .collect();

    pool.iter()
        .filter(|t| !t.deleted && t.date >= start && t.date <= end && !selected.contains(&t.id))
        .cloned()
        .collect()
}

use serde::{Deserialize, Serialize};

use crate::exclusions::{self, ExclusionRegistry};
use crate::models::{CandidateTransaction, LedgerTransaction};
use crate::normalize::{normalize, normalize_description};
use crate::similarity::{amounts_match, date_proximity, string_similarity};

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Matching thresholds and weights. These are configuration, not law: every
/// value can be overridden from settings.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchConfig {
    /// Date window for duplicate consideration, in days.
    #[serde(default = "default_date_window_days")]
    pub date_window_days: i64,
    /// Minimum description similarity for an exact-amount same-window hit to
    /// count as an exact duplicate.
    #[serde(default = "default_exact_description_threshold")]
    pub exact_description_threshold: f64,
    /// Minimum weighted confidence for a fuzzy match.
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f64,
    /// Amount tolerance for the fuzzy pool, percent.
    #[serde(default = "default_fuzzy_amount_tolerance_pct")]
    pub fuzzy_amount_tolerance_pct: f64,
    #[serde(default = "default_weight_amount")]
    pub weight_amount: f64,
    #[serde(default = "default_weight_date")]
    pub weight_date: f64,
    #[serde(default = "default_weight_description")]
    pub weight_description: f64,
    /// How many fuzzy counterparts to report, best first.
    #[serde(default = "default_max_fuzzy_matches")]
    pub max_fuzzy_matches: usize,
    /// Fuzzy confidence at or above which auto-resolve imports anyway.
    #[serde(default = "default_auto_import_threshold")]
    pub auto_import_threshold: f64,
}

fn default_date_window_days() -> i64 {
    3
}
fn default_exact_description_threshold() -> f64 {
    0.95
}
fn default_fuzzy_threshold() -> f64 {
    0.55
}
fn default_fuzzy_amount_tolerance_pct() -> f64 {
    2.0
}
fn default_weight_amount() -> f64 {
    0.40
}
fn default_weight_date() -> f64 {
    0.20
}
fn default_weight_description() -> f64 {
    0.40
}
fn default_max_fuzzy_matches() -> usize {
    3
}
fn default_auto_import_threshold() -> f64 {
    0.85
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            date_window_days: default_date_window_days(),
            exact_description_threshold: default_exact_description_threshold(),
            fuzzy_threshold: default_fuzzy_threshold(),
            fuzzy_amount_tolerance_pct: default_fuzzy_amount_tolerance_pct(),
            weight_amount: default_weight_amount(),
            weight_date: default_weight_date(),
            weight_description: default_weight_description(),
            max_fuzzy_matches: default_max_fuzzy_matches(),
            auto_import_threshold: default_auto_import_threshold(),
        }
    }
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    ExactDuplicate,
    FuzzyMatch,
    Unmatched,
}

/// The component inputs that produced a confidence value, kept on the result
/// so reviewers and tests can see why a candidate landed where it did.
#[derive(Debug, Clone, Default)]
pub struct ComponentScores {
    pub amount_matched: bool,
    pub date_delta_days: Option<i64>,
    pub description_similarity: f64,
}

#[derive(Debug, Clone)]
pub struct MatchedTransaction {
    pub transaction: LedgerTransaction,
    pub confidence: f64,
}

#[derive(Debug, Clone)]
pub struct MatchResult {
    pub classification: Classification,
    pub confidence: f64,
    /// Counterparts ordered by descending confidence; empty for Unmatched.
    pub matches: Vec<MatchedTransaction>,
    pub scores: ComponentScores,
    pub warnings: Vec<String>,
}

impl MatchResult {
    fn unmatched(scores: ComponentScores, warnings: Vec<String>) -> Self {
        Self {
            classification: Classification::Unmatched,
            confidence: 0.0,
            matches: Vec::new(),
            scores,
            warnings,
        }
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Classify one candidate against the existing pool. Deterministic: identical
/// inputs always produce the identical result. A malformed candidate comes
/// back Unmatched with a validation warning instead of failing the batch.
pub fn classify(
    candidate: &CandidateTransaction,
    pool: &[LedgerTransaction],
    registry: &ExclusionRegistry,
    config: &MatchConfig,
) -> MatchResult {
    let norm = normalize(candidate);
    let mut warnings = candidate.warnings.clone();

    let (amount, date) = match (norm.amount_cents, norm.date) {
        (Some(a), Some(d)) => (a, d),
        _ => {
            if norm.amount_cents.is_none() {
                warnings.push("missing or malformed amount".to_string());
            }
            if norm.date.is_none() {
                warnings.push("missing or malformed date".to_string());
            }
            return MatchResult::unmatched(ComponentScores::default(), warnings);
        }
    };

    let cand_member = exclusions::candidate_member(&norm);
    let pair_excluded = |t: &LedgerTransaction| {
        registry.covers(&[cand_member.clone(), exclusions::transaction_member(t.id)])
    };

    // Step 1/2: exact-amount hits inside the date window. Best similarity
    // wins; among similarity ties the earliest-dated transaction wins.
    let mut best_exact: Option<(&LedgerTransaction, f64, i64)> = None;
    for txn in pool.iter().filter(|t| !t.deleted) {
        if txn.amount_cents != amount {
            continue;
        }
        let delta = (txn.date - date).num_days().abs();
        if delta > config.date_window_days {
            continue;
        }
        let sim = string_similarity(&norm.description, &normalize_description(&txn.description));
        let better = match best_exact {
            None => true,
            Some((bt, bsim, _)) => sim > bsim || (sim == bsim && txn.date < bt.date),
        };
        if better {
            best_exact = Some((txn, sim, delta));
        }
    }
    if let Some((hit, sim, delta)) = best_exact {
        if sim >= config.exact_description_threshold {
            let scores = ComponentScores {
                amount_matched: true,
                date_delta_days: Some(delta),
                description_similarity: sim,
            };
            // A previously-dismissed pairing never resurfaces as a conflict.
            if pair_excluded(hit) {
                return MatchResult::unmatched(scores, warnings);
            }
            return MatchResult {
                classification: Classification::ExactDuplicate,
                confidence: 1.0,
                matches: vec![MatchedTransaction {
                    transaction: hit.clone(),
                    confidence: 1.0,
                }],
                scores,
                warnings,
            };
        }
    }

    // Step 3/4: weighted scoring over the amount-tolerant pool.
    struct Scored<'a> {
        txn: &'a LedgerTransaction,
        confidence: f64,
        delta: i64,
        sim: f64,
    }
    let mut scored: Vec<Scored> = pool
        .iter()
        .filter(|t| !t.deleted)
        .filter(|t| amounts_match(amount, t.amount_cents, config.fuzzy_amount_tolerance_pct))
        .filter(|t| (t.date - date).num_days().abs() <= config.date_window_days)
        .map(|txn| {
            let delta = (txn.date - date).num_days().abs();
            let sim =
                string_similarity(&norm.description, &normalize_description(&txn.description));
            let confidence = config.weight_amount
                + config.weight_date * date_proximity(date, txn.date, config.date_window_days)
                + config.weight_description * sim;
            Scored { txn, confidence, delta, sim }
        })
        .collect();
    scored.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.txn.date.cmp(&b.txn.date))
            .then_with(|| a.txn.id.cmp(&b.txn.id))
    });

    let raw_scores = scored
        .first()
        .map(|s| ComponentScores {
            amount_matched: true,
            date_delta_days: Some(s.delta),
            description_similarity: s.sim,
        })
        .unwrap_or_default();

    // Step 5: drop pairings the user already dismissed.
    scored.retain(|s| !pair_excluded(s.txn));

    match scored.first() {
        Some(best) if best.confidence >= config.fuzzy_threshold => {
            let confidence = best.confidence;
            let scores = ComponentScores {
                amount_matched: true,
                date_delta_days: Some(best.delta),
                description_similarity: best.sim,
            };
            let matches = scored
                .iter()
                .take(config.max_fuzzy_matches)
                .filter(|s| s.confidence >= config.fuzzy_threshold)
                .map(|s| MatchedTransaction {
                    transaction: s.txn.clone(),
                    confidence: s.confidence,
                })
                .collect();
            MatchResult {
                classification: Classification::FuzzyMatch,
                confidence,
                matches,
                scores,
                warnings,
            }
        }
        _ => MatchResult::unmatched(raw_scores, warnings),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn txn(id: i64, date: NaiveDate, desc: &str, cents: i64) -> LedgerTransaction {
        LedgerTransaction {
            id,
            account_id: 1,
            date,
            description: desc.to_string(),
            amount_cents: cents,
            currency: "USD".to_string(),
            external_ref: None,
            category: None,
            source: "manual".to_string(),
            deleted: false,
        }
    }

    #[test]
    fn test_exact_duplicate_same_day_same_amount_same_description() {
        let candidate =
            CandidateTransaction::new(d(2024, 1, 1), "Coffee Shop Purchase", -2550);
        let pool = vec![txn(1, d(2024, 1, 1), "Coffee Shop Purchase", -2550)];
        let result = classify(&candidate, &pool, &ExclusionRegistry::empty(), &MatchConfig::default());

        assert_eq!(result.classification, Classification::ExactDuplicate);
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.matches.len(), 1);
        assert_eq!(result.matches[0].transaction.id, 1);
        assert!(result.scores.amount_matched);
        assert_eq!(result.scores.date_delta_days, Some(0));
    }

    #[test]
    fn test_fuzzy_match_close_amount_and_description() {
        let candidate = CandidateTransaction::new(d(2024, 1, 1), "Coffee Shop", -2550);
        let pool = vec![txn(7, d(2024, 1, 2), "Coffee Shp Purchase", -2500)];
        let result = classify(&candidate, &pool, &ExclusionRegistry::empty(), &MatchConfig::default());

        assert_eq!(result.classification, Classification::FuzzyMatch);
        assert!(result.confidence > 0.55 && result.confidence < 0.95, "got {}", result.confidence);
        assert_eq!(result.matches[0].transaction.id, 7);
    }

    #[test]
    fn test_unmatched_when_nothing_close() {
        let candidate = CandidateTransaction::new(d(2024, 1, 1), "Coffee Shop", -2550);
        // amount far outside tolerance, and a same-amount hit far outside the window
        let pool = vec![
            txn(1, d(2024, 1, 1), "Coffee Shop", -9900),
            txn(2, d(2024, 3, 1), "Coffee Shop", -2550),
        ];
        let result = classify(&candidate, &pool, &ExclusionRegistry::empty(), &MatchConfig::default());
        assert_eq!(result.classification, Classification::Unmatched);
        assert!(result.matches.is_empty());
    }

    #[test]
    fn test_unmatched_on_empty_pool() {
        let candidate = CandidateTransaction::new(d(2024, 1, 1), "Coffee Shop", -2550);
        let result = classify(&candidate, &[], &ExclusionRegistry::empty(), &MatchConfig::default());
        assert_eq!(result.classification, Classification::Unmatched);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_exclusion_downgrades_exact_to_unmatched() {
        let candidate =
            CandidateTransaction::new(d(2024, 1, 1), "Coffee Shop Purchase", -2550);
        let pool = vec![txn(1, d(2024, 1, 1), "Coffee Shop Purchase", -2550)];
        let norm = crate::normalize::normalize(&candidate);
        let registry = ExclusionRegistry::from_sets(vec![vec![
            exclusions::candidate_member(&norm),
            exclusions::transaction_member(1),
        ]]);

        let result = classify(&candidate, &pool, &registry, &MatchConfig::default());
        assert_eq!(result.classification, Classification::Unmatched);
        assert!(result.matches.is_empty());
        // raw component scores survive the downgrade
        assert!(result.scores.amount_matched);
        assert_eq!(result.scores.description_similarity, 1.0);
    }

    #[test]
    fn test_exclusion_downgrades_fuzzy_to_unmatched() {
        let candidate = CandidateTransaction::new(d(2024, 1, 1), "Coffee Shop", -2550);
        let pool = vec![txn(7, d(2024, 1, 2), "Coffee Shp Purchase", -2500)];
        let norm = crate::normalize::normalize(&candidate);
        let registry = ExclusionRegistry::from_sets(vec![vec![
            exclusions::candidate_member(&norm),
            exclusions::transaction_member(7),
        ]]);

        let result = classify(&candidate, &pool, &registry, &MatchConfig::default());
        assert_eq!(result.classification, Classification::Unmatched);
        assert!(result.matches.is_empty());
    }

    #[test]
    fn test_exclusion_leaves_other_pairings_alone() {
        let candidate = CandidateTransaction::new(d(2024, 1, 1), "Coffee Shop", -2550);
        let pool = vec![
            txn(7, d(2024, 1, 2), "Coffee Shp Purchase", -2500),
            txn(8, d(2024, 1, 1), "Coffee Shop Cart", -2540),
        ];
        let norm = crate::normalize::normalize(&candidate);
        let registry = ExclusionRegistry::from_sets(vec![vec![
            exclusions::candidate_member(&norm),
            exclusions::transaction_member(7),
        ]]);

        let result = classify(&candidate, &pool, &registry, &MatchConfig::default());
        assert_eq!(result.classification, Classification::FuzzyMatch);
        assert!(result.matches.iter().all(|m| m.transaction.id != 7));
    }

    #[test]
    fn test_malformed_candidate_isolates_with_warning() {
        let candidate = CandidateTransaction {
            date: None,
            description: "Coffee Shop".to_string(),
            amount_cents: Some(-2550),
            currency: "USD".to_string(),
            external_ref: None,
            bank_category: None,
            warnings: vec!["row 12: unparseable date '31/31/2024'".to_string()],
        };
        let pool = vec![txn(1, d(2024, 1, 1), "Coffee Shop", -2550)];
        let result = classify(&candidate, &pool, &ExclusionRegistry::empty(), &MatchConfig::default());
        assert_eq!(result.classification, Classification::Unmatched);
        assert!(result.warnings.iter().any(|w| w.contains("unparseable date")));
        assert!(result.warnings.iter().any(|w| w.contains("malformed date")));
    }

    #[test]
    fn test_exact_tie_break_prefers_earliest_dated() {
        let candidate = CandidateTransaction::new(d(2024, 1, 3), "Gym Membership", -4500);
        let pool = vec![
            txn(2, d(2024, 1, 4), "Gym Membership", -4500),
            txn(1, d(2024, 1, 2), "Gym Membership", -4500),
        ];
        let result = classify(&candidate, &pool, &ExclusionRegistry::empty(), &MatchConfig::default());
        assert_eq!(result.classification, Classification::ExactDuplicate);
        assert_eq!(result.matches[0].transaction.id, 1);
    }

    #[test]
    fn test_fuzzy_matches_capped_and_ordered() {
        let candidate = CandidateTransaction::new(d(2024, 1, 5), "Grocery Mart", -10000);
        let pool = vec![
            txn(1, d(2024, 1, 5), "Grocery Mart Store", -10010),
            txn(2, d(2024, 1, 6), "Grocery Mart", -10050),
            txn(3, d(2024, 1, 7), "Grocery Mart", -10100),
            txn(4, d(2024, 1, 8), "Grocery Mart", -10150),
        ];
        let result = classify(&candidate, &pool, &ExclusionRegistry::empty(), &MatchConfig::default());
        assert_eq!(result.classification, Classification::FuzzyMatch);
        assert!(result.matches.len() <= 3);
        for pair in result.matches.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
        assert_eq!(result.confidence, result.matches[0].confidence);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let candidate = CandidateTransaction::new(d(2024, 1, 1), "Coffee Shop", -2550);
        let pool = vec![
            txn(7, d(2024, 1, 2), "Coffee Shp Purchase", -2500),
            txn(8, d(2024, 1, 1), "Coffee Shop Cart", -2540),
        ];
        let a = classify(&candidate, &pool, &ExclusionRegistry::empty(), &MatchConfig::default());
        let b = classify(&candidate, &pool, &ExclusionRegistry::empty(), &MatchConfig::default());
        assert_eq!(format!("{a:?}"), format!("{b:?}"));
    }
}

use std::collections::HashSet;

use chrono::NaiveDate;

/// Levenshtein edit distance over characters, two-row DP.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Shared-word overlap coefficient: |A ∩ B| / min(|A|, |B|). Using the
/// smaller set as the denominator keeps the score from dropping when one
/// description merely carries extra tokens.
fn token_overlap(a: &str, b: &str) -> f64 {
    let ta: HashSet<&str> = a.split_whitespace().collect();
    let tb: HashSet<&str> = b.split_whitespace().collect();
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let shared = ta.intersection(&tb).count();
    shared as f64 / ta.len().min(tb.len()) as f64
}

/// Similarity between two normalized descriptions in [0, 1]. Symmetric,
/// exactly 1.0 for equal strings. Takes the better of normalized edit
/// distance and word-token overlap, so "COFFEE SHOP" still scores well
/// against "COFFEE SHOP PURCHASE 4521".
pub fn string_similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let max_len = a.chars().count().max(b.chars().count());
    let edit = 1.0 - levenshtein(a, b) as f64 / max_len as f64;
    edit.max(token_overlap(a, b)).clamp(0.0, 1.0)
}

/// Date-proximity score: 1.0 at zero delta, linear decay to 0.0 at the
/// window boundary and beyond.
pub fn date_proximity(d1: NaiveDate, d2: NaiveDate, window_days: i64) -> f64 {
    let delta = (d1 - d2).num_days().abs();
    if window_days <= 0 {
        return if delta == 0 { 1.0 } else { 0.0 };
    }
    (1.0 - delta as f64 / window_days as f64).max(0.0)
}

/// Amount comparison with a percentage tolerance. Tolerance 0 means exact
/// equality in cents; duplicate detection uses 0, transfer linking uses
/// wider tolerances.
pub fn amounts_match(a_cents: i64, b_cents: i64, tolerance_pct: f64) -> bool {
    if tolerance_pct <= 0.0 {
        return a_cents == b_cents;
    }
    let base = a_cents.abs().max(b_cents.abs()) as f64;
    (a_cents - b_cents).abs() as f64 <= base * tolerance_pct / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_identical_strings_score_one() {
        assert_eq!(string_similarity("COFFEE SHOP", "COFFEE SHOP"), 1.0);
        assert_eq!(string_similarity("", ""), 1.0);
    }

    #[test]
    fn test_similarity_is_symmetric() {
        let pairs = [
            ("COFFEE SHOP", "COFFEE SHP PURCHASE"),
            ("STARBUCKS", "AMAZON"),
            ("A", "ABCD"),
        ];
        for (a, b) in pairs {
            assert_eq!(string_similarity(a, b), string_similarity(b, a));
        }
    }

    #[test]
    fn test_extra_tokens_do_not_tank_score() {
        let base = string_similarity("COFFEE SHOP", "COFFEE SHOP");
        let extended = string_similarity("COFFEE SHOP", "COFFEE SHOP PURCHASE 4521 POS");
        assert_eq!(base, 1.0);
        assert!(extended >= 0.9, "got {extended}");
    }

    #[test]
    fn test_unrelated_strings_score_low() {
        assert!(string_similarity("STARBUCKS", "HOME DEPOT") < 0.3);
        assert_eq!(string_similarity("ANYTHING", ""), 0.0);
    }

    #[test]
    fn test_date_proximity_linear_decay() {
        let base = d(2024, 1, 10);
        assert_eq!(date_proximity(base, base, 3), 1.0);
        assert!((date_proximity(base, d(2024, 1, 11), 3) - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(date_proximity(base, d(2024, 1, 13), 3), 0.0);
        assert_eq!(date_proximity(base, d(2024, 2, 10), 3), 0.0);
        // symmetric in argument order
        assert_eq!(
            date_proximity(d(2024, 1, 11), base, 3),
            date_proximity(base, d(2024, 1, 11), 3)
        );
    }

    #[test]
    fn test_amounts_match_exact() {
        assert!(amounts_match(-2550, -2550, 0.0));
        assert!(!amounts_match(-2550, -2551, 0.0));
        assert!(!amounts_match(-2550, 2550, 0.0));
    }

    #[test]
    fn test_amounts_match_with_tolerance() {
        // 2% of $25.50 is 51 cents
        assert!(amounts_match(-2550, -2500, 2.0));
        assert!(!amounts_match(-2550, -2400, 2.0));
        // opposite signs never fall inside a small tolerance
        assert!(!amounts_match(-2550, 2550, 5.0));
    }
}

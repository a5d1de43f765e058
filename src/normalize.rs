use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::models::CandidateTransaction;

/// Canonical form of a candidate's comparable fields. Pure output of
/// [`normalize`]; scoring and classification only ever look at this.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    pub description: String,
    pub amount_cents: Option<i64>,
    pub date: Option<NaiveDate>,
}

// Trailing store/reference codes: "#1234" style suffixes, or purely numeric
// suffixes longer than 3 digits. Short numbers and embedded numbers are
// left alone.
fn trailing_code_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\s+#\d+|\s+\d{4,})+$").unwrap())
}

/// Trim, collapse internal whitespace, uppercase, strip trailing store codes.
/// Idempotent: a second pass is a no-op.
pub fn normalize_description(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let upper = collapsed.to_uppercase();
    trailing_code_re().replace(&upper, "").into_owned()
}

/// Parse a free-form amount string into signed cents. Accepts currency
/// symbols, thousands separators, and parenthesized negatives.
pub fn parse_amount_cents(raw: &str) -> Option<i64> {
    let s = raw.replace(',', "").replace('"', "").replace('$', "");
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Some(inner) = s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        let v: f64 = inner.trim().parse().ok()?;
        return Some(-(v * 100.0).round() as i64);
    }
    let v: f64 = s.parse().ok()?;
    Some((v * 100.0).round() as i64)
}

/// Parse a calendar date: ISO `YYYY-MM-DD` or US `MM/DD/YYYY`. Day
/// granularity only; wall-clock time never enters scoring.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%m/%d/%Y") {
        return Some(d);
    }
    None
}

pub fn normalize(candidate: &CandidateTransaction) -> NormalizedRecord {
    NormalizedRecord {
        description: normalize_description(&candidate.description),
        amount_cents: candidate.amount_cents,
        date: candidate.date,
    }
}

/// Content fingerprint of a normalized record, used as a candidate's stable
/// identity in exclusion id-sets (candidates have no database id).
pub fn fingerprint(record: &NormalizedRecord) -> String {
    let mut hasher = Sha256::new();
    hasher.update(record.amount_cents.unwrap_or(0).to_le_bytes());
    hasher.update(
        record
            .date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
    );
    hasher.update(record.description.as_bytes());
    hex::encode(&hasher.finalize()[..8])
}

use chrono::NaiveDate;

#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct Account {
    pub id: i64,
    pub name: String,
    pub account_type: String,
    pub institution: Option<String>,
    pub last_four: Option<String>,
}

/// A persisted transaction in an account's history. Amounts are stored in
/// minor units (cents) with the sign preserved.
#[derive(Debug, Clone)]
pub struct LedgerTransaction {
    pub id: i64,
    pub account_id: i64,
    pub date: NaiveDate,
    pub description: String,
    pub amount_cents: i64,
    pub currency: String,
    pub external_ref: Option<String>,
    pub category: Option<String>,
    pub source: String,
    pub deleted: bool,
}

/// An incoming transaction proposed for import. Ephemeral: lives only for one
/// review session, then either becomes a `LedgerTransaction` or is discarded.
/// `date`/`amount_cents` are `None` when the supplied value was malformed; the
/// failure is described in `warnings`.
#[derive(Debug, Clone)]
pub struct CandidateTransaction {
    pub date: Option<NaiveDate>,
    pub description: String,
    pub amount_cents: Option<i64>,
    pub currency: String,
    pub external_ref: Option<String>,
    pub bank_category: Option<String>,
    pub warnings: Vec<String>,
}

impl CandidateTransaction {
    pub fn new(date: NaiveDate, description: &str, amount_cents: i64) -> Self {
        Self {
            date: Some(date),
            description: description.to_string(),
            amount_cents: Some(amount_cents),
            currency: "USD".to_string(),
            external_ref: None,
            bank_category: None,
            warnings: Vec::new(),
        }
    }
}

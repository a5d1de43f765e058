use std::path::Path;

use crate::error::{ReckonError, Result};
use crate::models::CandidateTransaction;
use crate::normalize::{parse_amount_cents, parse_date};

/// Read candidates from a generic statement CSV. Expected columns, located
/// by header row: `date`, `description`, `amount`, and optionally `currency`
/// and `reference`. Bank-specific column mapping happens upstream; this
/// reader only handles the already-mapped shape. A malformed row becomes a
/// candidate carrying a validation warning so classification can isolate it
/// instead of the whole file failing.
pub fn read_candidates(file_path: &Path) -> Result<Vec<CandidateTransaction>> {
    let file = std::fs::File::open(file_path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(std::io::BufReader::new(file));

    let mut candidates = Vec::new();
    let mut columns: Option<Columns> = None;
    let mut line = 0usize;

    for result in rdr.records() {
        line += 1;
        let Ok(record) = result else { continue };
        match &columns {
            None => {
                if let Some(found) = Columns::from_header(&record) {
                    columns = Some(found);
                }
            }
            Some(cols) => {
                if record.iter().all(|f| f.trim().is_empty()) {
                    continue;
                }
                candidates.push(cols.parse_row(&record, line));
            }
        }
    }

    if columns.is_none() {
        return Err(ReckonError::Validation(format!(
            "{}: no header row with date/description/amount columns",
            file_path.display()
        )));
    }
    Ok(candidates)
}

struct Columns {
    date: usize,
    description: usize,
    amount: usize,
    currency: Option<usize>,
    reference: Option<usize>,
}

impl Columns {
    fn from_header(record: &csv::StringRecord) -> Option<Self> {
        let mut date = None;
        let mut description = None;
        let mut amount = None;
        let mut currency = None;
        let mut reference = None;
        for (i, field) in record.iter().enumerate() {
            match field.trim().to_lowercase().as_str() {
                "date" => date = Some(i),
                "description" | "payee" => description = Some(i),
                "amount" => amount = Some(i),
                "currency" => currency = Some(i),
                "reference" | "ref" => reference = Some(i),
                _ => {}
            }
        }
        Some(Self {
            date: date?,
            description: description?,
            amount: amount?,
            currency,
            reference,
        })
    }

    fn field<'a>(&self, record: &'a csv::StringRecord, idx: usize) -> &'a str {
        record.get(idx).unwrap_or("").trim()
    }

    fn parse_row(&self, record: &csv::StringRecord, line: usize) -> CandidateTransaction {
        let mut warnings = Vec::new();

        let raw_date = self.field(record, self.date);
        let date = parse_date(raw_date);
        if date.is_none() {
            warnings.push(format!("row {line}: unparseable date {raw_date:?}"));
        }

        let raw_amount = self.field(record, self.amount);
        let amount_cents = parse_amount_cents(raw_amount);
        if amount_cents.is_none() {
            warnings.push(format!("row {line}: unparseable amount {raw_amount:?}"));
        }

        let currency = self
            .currency
            .map(|i| self.field(record, i).to_uppercase())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| "USD".to_string());
        let external_ref = self
            .reference
            .map(|i| self.field(record, i).to_string())
            .filter(|r| !r.is_empty());

        CandidateTransaction {
            date,
            description: self.field(record, self.description).to_string(),
            amount_cents,
            currency,
            external_ref,
            bank_category: None,
            warnings,
        }
    }
}

use std::collections::BTreeSet;

use rusqlite::Connection;

use crate::error::Result;
use crate::normalize::{self, NormalizedRecord};

/// A persisted "these are not duplicates of each other" judgment. The id-set
/// holds `t:<id>` members for ledger transactions and a `c:<fingerprint>`
/// member for the unpersisted candidate; it is stored as a sorted JSON array.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct DuplicateExclusion {
    pub id: i64,
    pub account_id: i64,
    pub id_set: Vec<String>,
    pub overridden_confidence: f64,
    pub note: Option<String>,
    pub created_at: String,
}

pub fn candidate_member(record: &NormalizedRecord) -> String {
    format!("c:{}", normalize::fingerprint(record))
}

pub fn transaction_member(id: i64) -> String {
    format!("t:{id}")
}

/// In-memory view of an account's exclusions, loaded once per conflict-set
/// build. Read-only for the duration of a build.
#[derive(Debug, Clone, Default)]
pub struct ExclusionRegistry {
    sets: Vec<BTreeSet<String>>,
}

impl ExclusionRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn from_sets(sets: Vec<Vec<String>>) -> Self {
        Self {
            sets: sets.into_iter().map(|s| s.into_iter().collect()).collect(),
        }
    }

    pub fn load(conn: &Connection, account_id: i64) -> Result<Self> {
        let sets = list_exclusions(conn, account_id)?
            .into_iter()
            .map(|e| e.id_set.into_iter().collect())
            .collect();
        Ok(Self { sets })
    }

    /// True if every member of `implicated` appears in one stored exclusion,
    /// i.e. the implicated id-set is a subset of a dismissed group.
    pub fn covers(&self, implicated: &[String]) -> bool {
        if implicated.is_empty() {
            return false;
        }
        self.sets
            .iter()
            .any(|set| implicated.iter().all(|m| set.contains(m)))
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

pub fn record_exclusion(
    conn: &Connection,
    account_id: i64,
    id_set: &[String],
    overridden_confidence: f64,
    note: Option<&str>,
) -> Result<i64> {
    let mut sorted: Vec<&String> = id_set.iter().collect();
    sorted.sort();
    sorted.dedup();
    let json = serde_json::to_string(&sorted)
        .map_err(|e| crate::error::ReckonError::Other(e.to_string()))?;
    conn.execute(
        "INSERT INTO duplicate_exclusions (account_id, id_set, overridden_confidence, note) \
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![account_id, json, overridden_confidence, note],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_exclusions(conn: &Connection, account_id: i64) -> Result<Vec<DuplicateExclusion>> {
    let mut stmt = conn.prepare(
        "SELECT id, account_id, id_set, overridden_confidence, note, created_at \
         FROM duplicate_exclusions WHERE account_id = ?1 ORDER BY id",
    )?;
    let rows = stmt
        .query_map([account_id], |row| {
            let json: String = row.get(2)?;
            let id_set: Vec<String> = serde_json::from_str(&json).unwrap_or_default();
            Ok(DuplicateExclusion {
                id: row.get(0)?,
                account_id: row.get(1)?,
                id_set,
                overridden_confidence: row.get(3)?,
                note: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

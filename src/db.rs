use std::path::Path;

use chrono::NaiveDate;
use rusqlite::Connection;

use crate::error::{ReckonError, Result};
use crate::models::{Account, LedgerTransaction};

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS accounts (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    account_type TEXT NOT NULL,
    institution TEXT,
    last_four TEXT,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY,
    account_id INTEGER NOT NULL,
    date TEXT NOT NULL,
    description TEXT NOT NULL,
    amount_cents INTEGER NOT NULL,
    currency TEXT NOT NULL DEFAULT 'USD',
    external_ref TEXT,
    category TEXT,
    source TEXT NOT NULL DEFAULT 'manual',
    deleted INTEGER NOT NULL DEFAULT 0,
    idempotency_key TEXT UNIQUE,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (account_id) REFERENCES accounts(id)
);

CREATE TABLE IF NOT EXISTS duplicate_exclusions (
    id INTEGER PRIMARY KEY,
    account_id INTEGER NOT NULL,
    id_set TEXT NOT NULL,
    overridden_confidence REAL NOT NULL,
    note TEXT,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (account_id) REFERENCES accounts(id)
);

CREATE TABLE IF NOT EXISTS import_batches (
    id INTEGER PRIMARY KEY,
    batch_id TEXT NOT NULL,
    account_id INTEGER NOT NULL,
    total INTEGER NOT NULL,
    imported INTEGER NOT NULL,
    already_imported INTEGER NOT NULL,
    skipped INTEGER NOT NULL,
    excluded INTEGER NOT NULL,
    transferred INTEGER NOT NULL,
    failed INTEGER NOT NULL,
    executed_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (account_id) REFERENCES accounts(id)
);
";

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

pub fn find_account(conn: &Connection, name: &str) -> Result<Account> {
    let mut stmt = conn.prepare(
        "SELECT id, name, account_type, institution, last_four FROM accounts WHERE name = ?1",
    )?;
    stmt.query_row([name], |row| {
        Ok(Account {
            id: row.get(0)?,
            name: row.get(1)?,
            account_type: row.get(2)?,
            institution: row.get(3)?,
            last_four: row.get(4)?,
        })
    })
    .map_err(|_| ReckonError::UnknownAccount(name.to_string()))
}

fn txn_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<LedgerTransaction> {
    let date: String = row.get(2)?;
    let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(LedgerTransaction {
        id: row.get(0)?,
        account_id: row.get(1)?,
        date,
        description: row.get(3)?,
        amount_cents: row.get(4)?,
        currency: row.get(5)?,
        external_ref: row.get(6)?,
        category: row.get(7)?,
        source: row.get(8)?,
        deleted: row.get::<_, i64>(9)? != 0,
    })
}

/// The existing-pool snapshot for one account and date window. Soft-deleted
/// rows are excluded; the window is inclusive on both ends.
pub fn load_pool(
    conn: &Connection,
    account_id: i64,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<LedgerTransaction>> {
    let mut stmt = conn.prepare(
        "SELECT id, account_id, date, description, amount_cents, currency, external_ref, \
                category, source, deleted \
         FROM transactions \
         WHERE account_id = ?1 AND deleted = 0 AND date >= ?2 AND date <= ?3 \
         ORDER BY date, id",
    )?;
    let rows = stmt
        .query_map(
            rusqlite::params![
                account_id,
                start.format("%Y-%m-%d").to_string(),
                end.format("%Y-%m-%d").to_string()
            ],
            txn_from_row,
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    fn add_account(conn: &Connection, name: &str) -> i64 {
        conn.execute(
            "INSERT INTO accounts (name, account_type) VALUES (?1, 'checking')",
            [name],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    fn add_txn(conn: &Connection, account_id: i64, date: &str, desc: &str, cents: i64) -> i64 {
        conn.execute(
            "INSERT INTO transactions (account_id, date, description, amount_cents) \
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![account_id, date, desc, cents],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    #[test]
    fn test_init_db_creates_tables() {
        let (_dir, conn) = test_db();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        for expected in &["accounts", "transactions", "duplicate_exclusions", "import_batches"] {
            assert!(tables.contains(&expected.to_string()), "missing table: {expected}");
        }
    }

    #[test]
    fn test_init_db_is_idempotent() {
        let (_dir, conn) = test_db();
        init_db(&conn).unwrap();
    }

    #[test]
    fn test_find_account_unknown() {
        let (_dir, conn) = test_db();
        let err = find_account(&conn, "Nope").unwrap_err();
        assert!(matches!(err, ReckonError::UnknownAccount(_)));
    }

    #[test]
    fn test_load_pool_window_and_soft_delete() {
        let (_dir, conn) = test_db();
        let acct = add_account(&conn, "Checking");
        add_txn(&conn, acct, "2024-01-01", "INSIDE EARLY", -100);
        add_txn(&conn, acct, "2024-01-15", "INSIDE LATE", -200);
        add_txn(&conn, acct, "2024-02-01", "OUTSIDE", -300);
        let deleted = add_txn(&conn, acct, "2024-01-10", "DELETED", -400);
        conn.execute("UPDATE transactions SET deleted = 1 WHERE id = ?1", [deleted])
            .unwrap();

        let pool = load_pool(
            &conn,
            acct,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        )
        .unwrap();
        let descs: Vec<&str> = pool.iter().map(|t| t.description.as_str()).collect();
        assert_eq!(descs, vec!["INSIDE EARLY", "INSIDE LATE"]);
    }

    #[test]
    fn test_idempotency_key_is_unique() {
        let (_dir, conn) = test_db();
        let acct = add_account(&conn, "Checking");
        conn.execute(
            "INSERT INTO transactions (account_id, date, description, amount_cents, idempotency_key) \
             VALUES (?1, '2024-01-01', 'A', -100, 'k1')",
            [acct],
        )
        .unwrap();
        let dup = conn.execute(
            "INSERT INTO transactions (account_id, date, description, amount_cents, idempotency_key) \
             VALUES (?1, '2024-01-02', 'B', -200, 'k1')",
            [acct],
        );
        assert!(dup.is_err());
    }
}

use std::collections::HashMap;

use rusqlite::Connection;

use crate::classify::MatchConfig;
use crate::conflict::{self, Bucket, ConflictSet};
use crate::decisions::{Decision, DecisionTracker, Progress};
use crate::error::Result;
use crate::exclusions::ExclusionRegistry;
use crate::executor::{self, ExecuteOptions, ExecutionReport, TransferLinker};
use crate::models::{CandidateTransaction, LedgerTransaction};

/// One review workflow: the candidate batch, its conflict set, and the
/// decisions taken so far. Held in memory for the duration of the review,
/// never persisted.
pub struct ReviewSession {
    pub id: String,
    pub account_id: i64,
    pub candidates: Vec<CandidateTransaction>,
    pub conflicts: ConflictSet,
    pub decisions: DecisionTracker,
}

impl ReviewSession {
    /// Build the conflict set for a batch and open a session over it with
    /// every decision Pending.
    pub fn analyze(
        id: &str,
        account_id: i64,
        candidates: Vec<CandidateTransaction>,
        pool: &[LedgerTransaction],
        registry: &ExclusionRegistry,
        config: &MatchConfig,
    ) -> Self {
        let conflicts = conflict::build(&candidates, pool, registry, config);
        let decisions = DecisionTracker::new(conflicts.items.len());
        Self {
            id: id.to_string(),
            account_id,
            candidates,
            conflicts,
            decisions,
        }
    }

    pub fn record_decision(&mut self, candidate_index: usize, decision: Decision) -> Result<()> {
        self.decisions.set(candidate_index, decision)
    }

    pub fn bulk_apply(&mut self, bucket: Bucket, decision: Decision) -> usize {
        self.decisions.bulk_apply(&self.conflicts, bucket, decision)
    }

    pub fn auto_resolve(&mut self, config: &MatchConfig) -> usize {
        self.decisions
            .auto_resolve(&self.conflicts, config.auto_import_threshold)
    }

    pub fn progress(&self) -> Progress {
        self.decisions.progress()
    }

    /// Re-run classification for the unchanged batch, e.g. after an
    /// exclusion was recorded mid-session. Decisions are keyed by candidate
    /// index and the batch is unchanged, so they carry over.
    pub fn rebuild(
        &mut self,
        pool: &[LedgerTransaction],
        registry: &ExclusionRegistry,
        config: &MatchConfig,
    ) {
        self.conflicts = conflict::build(&self.candidates, pool, registry, config);
    }

    pub fn execute(
        &self,
        conn: &mut Connection,
        linker: &dyn TransferLinker,
        options: &ExecuteOptions,
    ) -> Result<ExecutionReport> {
        executor::execute(
            conn,
            self.account_id,
            &self.conflicts,
            &self.decisions,
            linker,
            options,
        )
    }
}

/// In-memory session registry for whatever layer hosts the API boundary.
/// Mutation is last-write-wins per candidate; a single writer is expected.
#[derive(Default)]
pub struct SessionStore {
    sessions: HashMap<String, ReviewSession>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, session: ReviewSession) {
        self.sessions.insert(session.id.clone(), session);
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut ReviewSession> {
        self.sessions.get_mut(id)
    }

    pub fn get(&self, id: &str) -> Option<&ReviewSession> {
        self.sessions.get(id)
    }

    /// Discard a session, on completion or abandonment.
    pub fn close(&mut self, id: &str) -> Option<ReviewSession> {
        self.sessions.remove(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{get_connection, init_db};
    use crate::executor::NoopTransferLinker;
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    fn add_account(conn: &Connection) -> i64 {
        conn.execute(
            "INSERT INTO accounts (name, account_type) VALUES ('Checking', 'checking')",
            [],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    fn open_session(account_id: i64) -> ReviewSession {
        let candidates = vec![
            CandidateTransaction::new(d(2024, 1, 1), "Coffee Shop", -2550),
            CandidateTransaction::new(d(2024, 1, 2), "Book Store", -1800),
            CandidateTransaction::new(d(2024, 1, 3), "Grocery Mart", -7000),
        ];
        ReviewSession::analyze(
            "s-1",
            account_id,
            candidates,
            &[],
            &ExclusionRegistry::empty(),
            &MatchConfig::default(),
        )
    }

    #[test]
    fn test_full_review_workflow() {
        let (_dir, mut conn) = test_db();
        let acct = add_account(&conn);
        let mut session = open_session(acct);
        assert_eq!(session.conflicts.stats.ready_to_import, 3);
        assert_eq!(session.progress().decided, 0);

        session.record_decision(0, Decision::Skip).unwrap();
        let applied = session.bulk_apply(Bucket::ReadyToImport, Decision::Import);
        assert_eq!(applied, 2);
        assert_eq!(session.progress().percent, 100.0);

        let report = session
            .execute(&mut conn, &NoopTransferLinker, &ExecuteOptions::default())
            .unwrap();
        assert_eq!(report.imported, 2);
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn test_auto_resolve_then_execute() {
        let (_dir, mut conn) = test_db();
        let acct = add_account(&conn);
        let mut session = open_session(acct);
        let applied = session.auto_resolve(&MatchConfig::default());
        assert_eq!(applied, 3);

        let report = session
            .execute(&mut conn, &NoopTransferLinker, &ExecuteOptions::default())
            .unwrap();
        assert_eq!(report.imported, 3);
    }

    #[test]
    fn test_store_open_get_close() {
        let mut store = SessionStore::new();
        store.open(open_session(1));
        assert!(store.get("s-1").is_some());

        store
            .get_mut("s-1")
            .unwrap()
            .record_decision(0, Decision::Import)
            .unwrap();
        assert_eq!(store.get("s-1").unwrap().progress().decided, 1);

        let closed = store.close("s-1").unwrap();
        assert_eq!(closed.id, "s-1");
        assert!(store.get("s-1").is_none());
    }

    #[test]
    fn test_rebuild_preserves_decisions() {
        let (_dir, conn) = test_db();
        let acct = add_account(&conn);
        let mut session = open_session(acct);
        session.record_decision(1, Decision::Import).unwrap();

        session.rebuild(&[], &ExclusionRegistry::empty(), &MatchConfig::default());
        assert_eq!(session.decisions.get(1), Decision::Import);
        assert_eq!(session.conflicts.items.len(), 3);
    }
}

//! SQLite backend.
//!
//! One connection behind a mutex, WAL mode for concurrent readers. Tally
//! increments go through a single upsert statement so the database performs
//! the add itself; there is no read-modify-write anywhere in this module.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rusqlite::{Connection, OptionalExtension, params};

use ballot_types::{
    ProposalId, SessionPhase, SessionToken, VoteOption, VoteRecord, VoteTally, WalletAddress,
};

use crate::{SessionStore, StoreError};

/// SQLite-backed [`SessionStore`].
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    const SCHEMA: &'static str = r"
        CREATE TABLE IF NOT EXISTS sessions (
            token TEXT PRIMARY KEY,
            phase TEXT,
            wallet TEXT,
            pending_proposal INTEGER
        );

        -- Transport identity -> session token binding
        CREATE TABLE IF NOT EXISTS requesters (
            requester TEXT PRIMARY KEY,
            token TEXT NOT NULL
        );

        -- One row per (wallet, option); count only ever grows
        CREATE TABLE IF NOT EXISTS tallies (
            wallet TEXT NOT NULL,
            option TEXT NOT NULL,
            count INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (wallet, option)
        );

        -- Latest vote per (proposal, wallet); record is a JSON VoteRecord
        CREATE TABLE IF NOT EXISTS vote_records (
            proposal_id INTEGER NOT NULL,
            wallet TEXT NOT NULL,
            record TEXT NOT NULL,
            PRIMARY KEY (proposal_id, wallet)
        );
    ";

    /// Open (creating if necessary) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(path).map_err(|source| StoreError::Open {
            path: PathBuf::from(path),
            source,
        })?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "busy_timeout", 5000)?;
        conn.execute_batch(Self::SCHEMA)?;
        tracing::debug!(path = %path.display(), "opened session store");

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (used by local runs without a data dir).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(Self::SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn read_tally(conn: &Connection, wallet: &WalletAddress) -> Result<VoteTally, StoreError> {
        let mut stmt = conn.prepare_cached("SELECT option, count FROM tallies WHERE wallet = ?1")?;
        let rows = stmt.query_map(params![wallet.as_str()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?))
        })?;

        let mut tally = VoteTally::default();
        for row in rows {
            let (option, count) = row?;
            match option.as_str() {
                "for" => tally.for_votes = count,
                "against" => tally.against_votes = count,
                "abstain" => tally.abstain_votes = count,
                // Unknown option rows are ignored rather than corrupting the read.
                _ => {}
            }
        }
        Ok(tally)
    }

    fn upsert_record(
        conn: &Connection,
        proposal: ProposalId,
        wallet: &WalletAddress,
        record: &VoteRecord,
    ) -> Result<(), StoreError> {
        let encoded = serde_json::to_string(record)?;
        conn.execute(
            "INSERT INTO vote_records (proposal_id, wallet, record) VALUES (?1, ?2, ?3)
             ON CONFLICT (proposal_id, wallet) DO UPDATE SET record = excluded.record",
            params![proposal.value(), wallet.as_str(), encoded],
        )?;
        Ok(())
    }

    fn bump_tally(
        conn: &Connection,
        wallet: &WalletAddress,
        option: VoteOption,
    ) -> Result<(), StoreError> {
        conn.execute(
            "INSERT INTO tallies (wallet, option, count) VALUES (?1, ?2, 1)
             ON CONFLICT (wallet, option) DO UPDATE SET count = count + 1",
            params![wallet.as_str(), option.as_str()],
        )?;
        Ok(())
    }
}

impl SessionStore for SqliteStore {
    fn phase(&self, session: &SessionToken) -> Result<Option<SessionPhase>, StoreError> {
        let conn = self.lock()?;
        let tag: Option<Option<String>> = conn
            .query_row(
                "SELECT phase FROM sessions WHERE token = ?1",
                params![session.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(tag
            .flatten()
            .map(|tag| SessionPhase::from_tag(&tag)))
    }

    fn set_phase(&self, session: &SessionToken, phase: SessionPhase) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO sessions (token, phase) VALUES (?1, ?2)
             ON CONFLICT (token) DO UPDATE SET phase = excluded.phase",
            params![session.as_str(), phase.as_tag()],
        )?;
        Ok(())
    }

    fn wallet(&self, session: &SessionToken) -> Result<Option<WalletAddress>, StoreError> {
        let conn = self.lock()?;
        let raw: Option<Option<String>> = conn
            .query_row(
                "SELECT wallet FROM sessions WHERE token = ?1",
                params![session.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        // An invalid persisted address reads as absent rather than panicking;
        // the engine will re-prompt for a wallet.
        Ok(raw.flatten().and_then(|s| match WalletAddress::new(s) {
            Ok(wallet) => Some(wallet),
            Err(e) => {
                tracing::warn!(session = %session, error = %e, "ignoring invalid persisted wallet");
                None
            }
        }))
    }

    fn set_wallet(
        &self,
        session: &SessionToken,
        wallet: &WalletAddress,
    ) -> Result<(), StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO sessions (token, wallet) VALUES (?1, ?2)
             ON CONFLICT (token) DO UPDATE SET wallet = excluded.wallet",
            params![session.as_str(), wallet.as_str()],
        )?;
        for option in ["for", "against", "abstain"] {
            tx.execute(
                "INSERT OR IGNORE INTO tallies (wallet, option, count) VALUES (?1, ?2, 0)",
                params![wallet.as_str(), option],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn clear_wallet(&self, session: &SessionToken) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE sessions SET wallet = NULL WHERE token = ?1",
            params![session.as_str()],
        )?;
        Ok(())
    }

    fn pending_proposal(&self, session: &SessionToken) -> Result<Option<ProposalId>, StoreError> {
        let conn = self.lock()?;
        let id: Option<Option<u64>> = conn
            .query_row(
                "SELECT pending_proposal FROM sessions WHERE token = ?1",
                params![session.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id.flatten().map(ProposalId::new))
    }

    fn set_pending_proposal(
        &self,
        session: &SessionToken,
        id: ProposalId,
    ) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO sessions (token, pending_proposal) VALUES (?1, ?2)
             ON CONFLICT (token) DO UPDATE SET pending_proposal = excluded.pending_proposal",
            params![session.as_str(), id.value()],
        )?;
        Ok(())
    }

    fn clear_pending_proposal(&self, session: &SessionToken) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE sessions SET pending_proposal = NULL WHERE token = ?1",
            params![session.as_str()],
        )?;
        Ok(())
    }

    fn clear_session(&self, session: &SessionToken) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM sessions WHERE token = ?1",
            params![session.as_str()],
        )?;
        Ok(())
    }

    fn record_vote(
        &self,
        proposal: ProposalId,
        wallet: &WalletAddress,
        record: &VoteRecord,
    ) -> Result<(), StoreError> {
        let conn = self.lock()?;
        Self::upsert_record(&conn, proposal, wallet, record)
    }

    fn vote_record(
        &self,
        proposal: ProposalId,
        wallet: &WalletAddress,
    ) -> Result<Option<VoteRecord>, StoreError> {
        let conn = self.lock()?;
        let encoded: Option<String> = conn
            .query_row(
                "SELECT record FROM vote_records WHERE proposal_id = ?1 AND wallet = ?2",
                params![proposal.value(), wallet.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        match encoded {
            Some(encoded) => Ok(Some(serde_json::from_str(&encoded)?)),
            None => Ok(None),
        }
    }

    fn increment_tally(
        &self,
        wallet: &WalletAddress,
        option: VoteOption,
    ) -> Result<(), StoreError> {
        let conn = self.lock()?;
        Self::bump_tally(&conn, wallet, option)
    }

    fn tally(&self, wallet: &WalletAddress) -> Result<VoteTally, StoreError> {
        let conn = self.lock()?;
        Self::read_tally(&conn, wallet)
    }

    /// Both writes in one transaction: a crash between them cannot leave a
    /// counter without a matching record, or vice versa.
    fn record_vote_and_increment(
        &self,
        proposal: ProposalId,
        wallet: &WalletAddress,
        record: &VoteRecord,
    ) -> Result<(), StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        Self::upsert_record(&tx, proposal, wallet, record)?;
        Self::bump_tally(&tx, wallet, record.option)?;
        tx.commit()?;
        Ok(())
    }

    fn token_for_requester(&self, requester: &str) -> Result<Option<SessionToken>, StoreError> {
        let conn = self.lock()?;
        let token: Option<String> = conn
            .query_row(
                "SELECT token FROM requesters WHERE requester = ?1",
                params![requester],
                |row| row.get(0),
            )
            .optional()?;
        Ok(token.map(SessionToken::new))
    }

    fn bind_requester(&self, requester: &str, token: &SessionToken) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO requesters (requester, token) VALUES (?1, ?2)
             ON CONFLICT (requester) DO UPDATE SET token = excluded.token",
            params![requester, token.as_str()],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ballot_types::ProposalState;

    fn open_temp() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("ballot.db")).unwrap();
        (dir, store)
    }

    #[test]
    fn reopen_preserves_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ballot.db");
        let wallet = WalletAddress::new("0x1111111111111111111111111111111111111111").unwrap();

        {
            let store = SqliteStore::open(&path).unwrap();
            store.increment_tally(&wallet, VoteOption::For).unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.tally(&wallet).unwrap().for_votes, 1);
    }

    #[test]
    fn tally_upsert_accumulates() {
        let (_dir, store) = open_temp();
        let wallet = WalletAddress::new("0x2222222222222222222222222222222222222222").unwrap();

        for _ in 0..3 {
            store.increment_tally(&wallet, VoteOption::Abstain).unwrap();
        }
        let tally = store.tally(&wallet).unwrap();
        assert_eq!(tally.abstain_votes, 3);
        assert_eq!(tally.for_votes, 0);
    }

    #[test]
    fn corrupted_phase_tag_normalizes_to_menu() {
        let (_dir, store) = open_temp();
        let session = SessionToken::new("s");

        {
            let conn = store.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO sessions (token, phase) VALUES ('s', 'garbage')",
                [],
            )
            .unwrap();
        }

        assert_eq!(store.phase(&session).unwrap(), Some(SessionPhase::Menu));
    }

    #[test]
    fn invalid_persisted_wallet_reads_as_absent() {
        let (_dir, store) = open_temp();
        let session = SessionToken::new("s");

        {
            let conn = store.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO sessions (token, wallet) VALUES ('s', 'not-an-address')",
                [],
            )
            .unwrap();
        }

        assert_eq!(store.wallet(&session).unwrap(), None);
    }

    #[test]
    fn partial_session_row_reads_cleanly() {
        let (_dir, store) = open_temp();
        let session = SessionToken::new("s");

        // Row created by set_pending_proposal alone: phase and wallet NULL.
        store
            .set_pending_proposal(&session, ProposalId::new(3))
            .unwrap();
        assert_eq!(store.phase(&session).unwrap(), None);
        assert_eq!(store.wallet(&session).unwrap(), None);
        assert_eq!(
            store.pending_proposal(&session).unwrap(),
            Some(ProposalId::new(3))
        );
    }

    #[test]
    fn vote_record_survives_as_structured_json() {
        let (_dir, store) = open_temp();
        let wallet = WalletAddress::new("0x3333333333333333333333333333333333333333").unwrap();
        let record = VoteRecord {
            option: VoteOption::For,
            timestamp: "2025-06-01T12:00:00Z".to_owned(),
            proposal_state: ProposalState::Executed,
        };

        store
            .record_vote(ProposalId::new(42), &wallet, &record)
            .unwrap();

        // The persisted form is JSON, not a debug dump.
        let raw: String = {
            let conn = store.conn.lock().unwrap();
            conn.query_row(
                "SELECT record FROM vote_records WHERE proposal_id = 42",
                [],
                |row| row.get(0),
            )
            .unwrap()
        };
        assert!(raw.starts_with('{'));
        assert_eq!(
            store.vote_record(ProposalId::new(42), &wallet).unwrap(),
            Some(record)
        );
    }
}

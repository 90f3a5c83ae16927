//! Session, tally, and vote-ledger storage.
//!
//! Every backend implements the [`SessionStore`] trait; the rest of the
//! codebase depends only on the trait, so the engine can be tested against
//! [`MemoryStore`] and deployed against [`SqliteStore`].
//!
//! The logical layout is store-agnostic:
//! - per-session record keyed by session token (phase, wallet, pending id)
//! - per-requester token binding (the transport's identity → token map)
//! - per-wallet tally record keyed by wallet address
//! - per-proposal vote ledger keyed by (proposal id, wallet address)

mod error;
mod memory;
mod sqlite;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use ballot_types::{
    ProposalId, SessionPhase, SessionToken, VoteOption, VoteRecord, VoteTally, WalletAddress,
};

/// Contract for session and vote persistence.
///
/// Reads of structured values (tally, vote record) either fully succeed or
/// report absent; no operation returns partial state.
pub trait SessionStore: Send + Sync {
    /// Current conversation phase, or `None` if the session has no row yet
    /// (first contact).
    fn phase(&self, session: &SessionToken) -> Result<Option<SessionPhase>, StoreError>;

    fn set_phase(&self, session: &SessionToken, phase: SessionPhase) -> Result<(), StoreError>;

    fn wallet(&self, session: &SessionToken) -> Result<Option<WalletAddress>, StoreError>;

    /// Registers the wallet for this session and lazily initializes the
    /// wallet's tally to zero if it does not exist yet.
    fn set_wallet(
        &self,
        session: &SessionToken,
        wallet: &WalletAddress,
    ) -> Result<(), StoreError>;

    fn clear_wallet(&self, session: &SessionToken) -> Result<(), StoreError>;

    fn pending_proposal(&self, session: &SessionToken) -> Result<Option<ProposalId>, StoreError>;

    fn set_pending_proposal(
        &self,
        session: &SessionToken,
        id: ProposalId,
    ) -> Result<(), StoreError>;

    fn clear_pending_proposal(&self, session: &SessionToken) -> Result<(), StoreError>;

    /// Removes the entire session row (phase, wallet, pending proposal).
    /// Tallies and vote records are keyed by wallet and survive.
    fn clear_session(&self, session: &SessionToken) -> Result<(), StoreError>;

    /// Upserts the vote record for (proposal, wallet). Last write wins.
    fn record_vote(
        &self,
        proposal: ProposalId,
        wallet: &WalletAddress,
        record: &VoteRecord,
    ) -> Result<(), StoreError>;

    fn vote_record(
        &self,
        proposal: ProposalId,
        wallet: &WalletAddress,
    ) -> Result<Option<VoteRecord>, StoreError>;

    /// Atomic increment of one counter. Concurrent increments for the same
    /// wallet must not lose updates.
    fn increment_tally(&self, wallet: &WalletAddress, option: VoteOption)
    -> Result<(), StoreError>;

    /// Missing counters read as zero.
    fn tally(&self, wallet: &WalletAddress) -> Result<VoteTally, StoreError>;

    /// Vote-record upsert plus tally increment as one logical unit.
    ///
    /// Backends that support multi-key atomicity override this so a crash
    /// can never leave a counter incremented without a matching record.
    fn record_vote_and_increment(
        &self,
        proposal: ProposalId,
        wallet: &WalletAddress,
        record: &VoteRecord,
    ) -> Result<(), StoreError> {
        self.record_vote(proposal, wallet, record)?;
        self.increment_tally(wallet, record.option)
    }

    /// The session token previously bound to a transport requester identity.
    fn token_for_requester(&self, requester: &str) -> Result<Option<SessionToken>, StoreError>;

    fn bind_requester(&self, requester: &str, token: &SessionToken) -> Result<(), StoreError>;
}

#[cfg(test)]
mod contract_tests {
    //! The same behavioral suite runs against every backend.

    use super::*;
    use ballot_types::ProposalState;

    fn token() -> SessionToken {
        SessionToken::new("test-session")
    }

    fn wallet() -> WalletAddress {
        WalletAddress::new("0xABCDEF0123456789ABCDEF0123456789ABCDEF01").unwrap()
    }

    fn record(option: VoteOption, timestamp: &str) -> VoteRecord {
        VoteRecord {
            option,
            timestamp: timestamp.to_owned(),
            proposal_state: ProposalState::Executed,
        }
    }

    fn exercise_store(store: &dyn SessionStore) {
        let session = token();
        let addr = wallet();

        // First contact: nothing stored.
        assert_eq!(store.phase(&session).unwrap(), None);
        assert_eq!(store.wallet(&session).unwrap(), None);
        assert_eq!(store.pending_proposal(&session).unwrap(), None);

        // Phase round trip.
        store
            .set_phase(&session, SessionPhase::AwaitingWallet)
            .unwrap();
        assert_eq!(
            store.phase(&session).unwrap(),
            Some(SessionPhase::AwaitingWallet)
        );

        // Wallet registration initializes the tally to zero.
        store.set_wallet(&session, &addr).unwrap();
        assert_eq!(store.wallet(&session).unwrap(), Some(addr.clone()));
        assert_eq!(store.tally(&addr).unwrap(), VoteTally::default());

        // Pending proposal round trip and clear.
        store
            .set_pending_proposal(&session, ProposalId::new(7))
            .unwrap();
        assert_eq!(
            store.pending_proposal(&session).unwrap(),
            Some(ProposalId::new(7))
        );
        store.clear_pending_proposal(&session).unwrap();
        assert_eq!(store.pending_proposal(&session).unwrap(), None);

        // Vote upsert + increment as one unit.
        let first = record(VoteOption::For, "2025-01-01T00:00:00Z");
        store
            .record_vote_and_increment(ProposalId::new(7), &addr, &first)
            .unwrap();
        assert_eq!(
            store.vote_record(ProposalId::new(7), &addr).unwrap(),
            Some(first)
        );
        let tally = store.tally(&addr).unwrap();
        assert_eq!(tally.for_votes, 1);
        assert_eq!(tally.against_votes, 0);

        // Resubmission overwrites the record but accumulates the tally.
        let second = record(VoteOption::Against, "2025-01-02T00:00:00Z");
        store
            .record_vote_and_increment(ProposalId::new(7), &addr, &second)
            .unwrap();
        assert_eq!(
            store.vote_record(ProposalId::new(7), &addr).unwrap(),
            Some(second)
        );
        let tally = store.tally(&addr).unwrap();
        assert_eq!(tally.for_votes, 1);
        assert_eq!(tally.against_votes, 1);

        // No record for a different proposal.
        assert_eq!(store.vote_record(ProposalId::new(8), &addr).unwrap(), None);

        // Wallet clear keeps phase; session clear removes everything.
        store.clear_wallet(&session).unwrap();
        assert_eq!(store.wallet(&session).unwrap(), None);
        store.set_phase(&session, SessionPhase::Menu).unwrap();
        store.clear_session(&session).unwrap();
        assert_eq!(store.phase(&session).unwrap(), None);

        // Tally survives session teardown (keyed by wallet).
        assert_eq!(store.tally(&addr).unwrap().for_votes, 1);

        // Requester binding.
        assert_eq!(store.token_for_requester("agent-a").unwrap(), None);
        store.bind_requester("agent-a", &session).unwrap();
        assert_eq!(
            store.token_for_requester("agent-a").unwrap(),
            Some(session)
        );
    }

    #[test]
    fn memory_store_honors_contract() {
        exercise_store(&MemoryStore::new());
    }

    #[test]
    fn sqlite_store_honors_contract() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("ballot.db")).unwrap();
        exercise_store(&store);
    }

    #[test]
    fn in_memory_sqlite_store_honors_contract() {
        exercise_store(&SqliteStore::open_in_memory().unwrap());
    }
}

//! In-memory backend for tests and single-process runs.

use std::collections::HashMap;
use std::sync::Mutex;

use ballot_types::{
    ProposalId, SessionPhase, SessionToken, VoteOption, VoteRecord, VoteTally, WalletAddress,
};

use crate::{SessionStore, StoreError};

#[derive(Debug, Default)]
struct SessionRow {
    phase: Option<SessionPhase>,
    wallet: Option<WalletAddress>,
    pending_proposal: Option<ProposalId>,
}

#[derive(Debug, Default)]
struct Inner {
    sessions: HashMap<SessionToken, SessionRow>,
    requesters: HashMap<String, SessionToken>,
    tallies: HashMap<WalletAddress, VoteTally>,
    vote_records: HashMap<(ProposalId, WalletAddress), VoteRecord>,
}

/// Mutex-backed [`SessionStore`].
///
/// All mutations hold one lock, so the vote-record upsert and tally
/// increment are trivially atomic together.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_inner<T>(&self, f: impl FnOnce(&mut Inner) -> T) -> Result<T, StoreError> {
        let mut inner = self.inner.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(f(&mut inner))
    }
}

impl SessionStore for MemoryStore {
    fn phase(&self, session: &SessionToken) -> Result<Option<SessionPhase>, StoreError> {
        self.with_inner(|inner| inner.sessions.get(session).and_then(|row| row.phase))
    }

    fn set_phase(&self, session: &SessionToken, phase: SessionPhase) -> Result<(), StoreError> {
        self.with_inner(|inner| {
            inner.sessions.entry(session.clone()).or_default().phase = Some(phase);
        })
    }

    fn wallet(&self, session: &SessionToken) -> Result<Option<WalletAddress>, StoreError> {
        self.with_inner(|inner| {
            inner
                .sessions
                .get(session)
                .and_then(|row| row.wallet.clone())
        })
    }

    fn set_wallet(
        &self,
        session: &SessionToken,
        wallet: &WalletAddress,
    ) -> Result<(), StoreError> {
        self.with_inner(|inner| {
            inner.sessions.entry(session.clone()).or_default().wallet = Some(wallet.clone());
            inner.tallies.entry(wallet.clone()).or_default();
        })
    }

    fn clear_wallet(&self, session: &SessionToken) -> Result<(), StoreError> {
        self.with_inner(|inner| {
            if let Some(row) = inner.sessions.get_mut(session) {
                row.wallet = None;
            }
        })
    }

    fn pending_proposal(&self, session: &SessionToken) -> Result<Option<ProposalId>, StoreError> {
        self.with_inner(|inner| {
            inner
                .sessions
                .get(session)
                .and_then(|row| row.pending_proposal)
        })
    }

    fn set_pending_proposal(
        &self,
        session: &SessionToken,
        id: ProposalId,
    ) -> Result<(), StoreError> {
        self.with_inner(|inner| {
            inner
                .sessions
                .entry(session.clone())
                .or_default()
                .pending_proposal = Some(id);
        })
    }

    fn clear_pending_proposal(&self, session: &SessionToken) -> Result<(), StoreError> {
        self.with_inner(|inner| {
            if let Some(row) = inner.sessions.get_mut(session) {
                row.pending_proposal = None;
            }
        })
    }

    fn clear_session(&self, session: &SessionToken) -> Result<(), StoreError> {
        self.with_inner(|inner| {
            inner.sessions.remove(session);
        })
    }

    fn record_vote(
        &self,
        proposal: ProposalId,
        wallet: &WalletAddress,
        record: &VoteRecord,
    ) -> Result<(), StoreError> {
        self.with_inner(|inner| {
            inner
                .vote_records
                .insert((proposal, wallet.clone()), record.clone());
        })
    }

    fn vote_record(
        &self,
        proposal: ProposalId,
        wallet: &WalletAddress,
    ) -> Result<Option<VoteRecord>, StoreError> {
        self.with_inner(|inner| inner.vote_records.get(&(proposal, wallet.clone())).cloned())
    }

    fn increment_tally(
        &self,
        wallet: &WalletAddress,
        option: VoteOption,
    ) -> Result<(), StoreError> {
        self.with_inner(|inner| {
            inner
                .tallies
                .entry(wallet.clone())
                .or_default()
                .increment(option);
        })
    }

    fn tally(&self, wallet: &WalletAddress) -> Result<VoteTally, StoreError> {
        self.with_inner(|inner| inner.tallies.get(wallet).copied().unwrap_or_default())
    }

    fn record_vote_and_increment(
        &self,
        proposal: ProposalId,
        wallet: &WalletAddress,
        record: &VoteRecord,
    ) -> Result<(), StoreError> {
        self.with_inner(|inner| {
            inner
                .vote_records
                .insert((proposal, wallet.clone()), record.clone());
            inner
                .tallies
                .entry(wallet.clone())
                .or_default()
                .increment(record.option);
        })
    }

    fn token_for_requester(&self, requester: &str) -> Result<Option<SessionToken>, StoreError> {
        self.with_inner(|inner| inner.requesters.get(requester).cloned())
    }

    fn bind_requester(&self, requester: &str, token: &SessionToken) -> Result<(), StoreError> {
        self.with_inner(|inner| {
            inner.requesters.insert(requester.to_owned(), token.clone());
        })
    }
}

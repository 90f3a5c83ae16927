//! The per-message state machine.

use std::time::Duration;

use ballot_chain::ProposalSource;
use ballot_insight::InsightSource;
use ballot_store::{SessionStore, StoreError};
use ballot_types::{
    Proposal, ProposalId, ProposalState, SessionPhase, SessionToken, VoteOption, VoteRecord,
    WalletAddress, is_reset_phrase,
};
use chrono::{SecondsFormat, Utc};
use thiserror::Error;

use crate::prompts;

/// How many recent proposals the analysis view covers.
const PROPOSAL_WINDOW: u64 = 10;

const DEFAULT_INSIGHT_TIMEOUT_SECS: u64 = 20;

/// Only store failures abort a request; everything else becomes user text
/// and the session stays usable.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The conversation state machine. One instance serves every session;
/// all per-session state lives in the store.
pub struct VotingSession<S, P, I> {
    store: S,
    proposals: P,
    insight: I,
    insight_timeout: Duration,
}

impl<S, P, I> VotingSession<S, P, I>
where
    S: SessionStore,
    P: ProposalSource,
    I: InsightSource,
{
    pub fn new(store: S, proposals: P, insight: I) -> Self {
        Self {
            store,
            proposals,
            insight,
            insight_timeout: Duration::from_secs(DEFAULT_INSIGHT_TIMEOUT_SECS),
        }
    }

    #[must_use]
    pub fn with_insight_timeout(mut self, timeout: Duration) -> Self {
        self.insight_timeout = timeout;
        self
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Interpret one inbound message and return the reply text.
    pub async fn handle_message(
        &self,
        session: &SessionToken,
        input: &str,
    ) -> Result<String, EngineError> {
        let input = input.trim();
        let phase = self.store.phase(session)?;

        tracing::debug!(session = %session, ?phase, "handling message");

        // First contact and reset phrases both restart the flow. A reset
        // drops the wallet and any pending proposal so the new flow starts
        // clean.
        if phase.is_none() || is_reset_phrase(input) {
            self.store.clear_wallet(session)?;
            self.store.clear_pending_proposal(session)?;
            self.store
                .set_phase(session, SessionPhase::AwaitingWallet)?;
            return Ok(prompts::WELCOME.to_owned());
        }

        match phase.unwrap_or(SessionPhase::Menu) {
            SessionPhase::AwaitingWallet => self.register_wallet(session, input),
            SessionPhase::Menu => self.menu_choice(session, input).await,
            SessionPhase::AwaitingProposal => self.capture_proposal_id(session, input),
            SessionPhase::AwaitingVote => self.capture_vote(session, input).await,
        }
    }

    fn register_wallet(
        &self,
        session: &SessionToken,
        input: &str,
    ) -> Result<String, EngineError> {
        match WalletAddress::new(input) {
            Ok(wallet) => {
                self.store.set_wallet(session, &wallet)?;
                self.store.set_phase(session, SessionPhase::Menu)?;
                tracing::info!(session = %session, wallet = %wallet, "wallet registered");
                Ok(prompts::wallet_accepted(&wallet))
            }
            Err(e) => {
                tracing::debug!(session = %session, error = %e, "wallet rejected");
                Ok(prompts::WALLET_REJECTED.to_owned())
            }
        }
    }

    async fn menu_choice(
        &self,
        session: &SessionToken,
        input: &str,
    ) -> Result<String, EngineError> {
        match input {
            "1" => {
                let body = self.display_proposals(session).await?;
                Ok(format!("{body}\n{}", prompts::menu()))
            }
            "2" => {
                self.store
                    .set_phase(session, SessionPhase::AwaitingProposal)?;
                Ok(prompts::ASK_PROPOSAL_ID.to_owned())
            }
            "3" => {
                let body = self.voting_history(session).await?;
                Ok(format!("{body}\n{}", prompts::menu()))
            }
            "4" => {
                self.store.clear_wallet(session)?;
                self.store
                    .set_phase(session, SessionPhase::AwaitingWallet)?;
                Ok(prompts::NEW_WALLET.to_owned())
            }
            "5" => {
                self.store.clear_session(session)?;
                Ok(prompts::FAREWELL.to_owned())
            }
            _ => Ok(format!("Invalid choice. {}", prompts::menu())),
        }
    }

    fn capture_proposal_id(
        &self,
        session: &SessionToken,
        input: &str,
    ) -> Result<String, EngineError> {
        match input.parse::<u64>() {
            Ok(id) => {
                self.store
                    .set_pending_proposal(session, ProposalId::new(id))?;
                self.store.set_phase(session, SessionPhase::AwaitingVote)?;
                Ok(prompts::ASK_VOTE.to_owned())
            }
            Err(_) => {
                self.store.set_phase(session, SessionPhase::Menu)?;
                Ok(format!("Invalid proposal ID. {}", prompts::menu()))
            }
        }
    }

    async fn capture_vote(
        &self,
        session: &SessionToken,
        input: &str,
    ) -> Result<String, EngineError> {
        let pending = self.store.pending_proposal(session)?;

        // The pending id is cleared and the session rests at the menu no
        // matter how the submission went.
        self.store.clear_pending_proposal(session)?;
        self.store.set_phase(session, SessionPhase::Menu)?;

        let Some(proposal) = pending else {
            return Ok(format!("Error: No proposal ID found. {}", prompts::menu()));
        };

        let body = self.submit_vote(session, proposal, input).await?;
        Ok(format!("{body}\n{}", prompts::menu()))
    }

    /// Vote acceptance: wallet registered, option recognized, proposal
    /// exists, proposal lifecycle state is `Executed`. The record upsert
    /// and the tally increment happen as one store unit.
    async fn submit_vote(
        &self,
        session: &SessionToken,
        proposal_id: ProposalId,
        input: &str,
    ) -> Result<String, EngineError> {
        let Some(wallet) = self.store.wallet(session)? else {
            return Ok(prompts::NO_WALLET.to_owned());
        };

        let option = match input.parse::<VoteOption>() {
            Ok(option) => option,
            Err(_) => {
                return Ok(format!(
                    "Invalid vote option: {}",
                    input.trim().to_lowercase()
                ));
            }
        };

        let proposal = match self.proposals.proposal(proposal_id).await {
            Ok(proposal) => proposal,
            Err(e) if e.is_not_found() => {
                return Ok(format!("Proposal {proposal_id} not found"));
            }
            Err(e) => {
                tracing::warn!(proposal = %proposal_id, error = %e, "proposal fetch failed");
                return Ok(format!("Error submitting vote: {e}"));
            }
        };

        if proposal.state != ProposalState::Executed {
            return Ok(format!(
                "Proposal {proposal_id} is not Executed (current state: {})",
                proposal.state
            ));
        }

        let record = VoteRecord {
            option,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            proposal_state: proposal.state,
        };
        self.store
            .record_vote_and_increment(proposal_id, &wallet, &record)?;

        let log_message = format!(
            "Vote recorded - Proposal: {proposal_id}, Wallet: {wallet}, Vote: {option}"
        );
        tracing::info!(proposal = %proposal_id, wallet = %wallet, vote = %option, "vote recorded");
        Ok(format!("Vote successfully recorded!\n\n{log_message}"))
    }

    /// Menu choice 1: insight summary, the recent proposal id window, and
    /// the caller's tally. The insight section degrades to a notice when
    /// the service fails or times out; the rest still renders.
    async fn display_proposals(&self, session: &SessionToken) -> Result<String, EngineError> {
        let Some(wallet) = self.store.wallet(session)? else {
            return Ok(prompts::NO_WALLET.to_owned());
        };

        let count = match self.proposals.proposal_count().await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(error = %e, "proposal count fetch failed");
                return Ok(format!("Error displaying proposals: {e}"));
            }
        };

        let window = count.saturating_sub(PROPOSAL_WINDOW).max(1)..=count;

        let mut recent: Vec<Proposal> = Vec::new();
        for id in window.clone() {
            match self.proposals.proposal(ProposalId::new(id)).await {
                Ok(proposal) => recent.push(proposal),
                Err(e) => {
                    tracing::debug!(proposal = id, error = %e, "skipping proposal");
                }
            }
        }

        let mut output = vec!["=== Current Proposal Analysis ===".to_owned()];

        match tokio::time::timeout(self.insight_timeout, self.insight.summarize(&recent)).await {
            Ok(Ok(summary)) => output.push(summary),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "insight summary failed");
                output.push("Proposal analysis is currently unavailable.".to_owned());
            }
            Err(_) => {
                tracing::warn!(timeout = ?self.insight_timeout, "insight summary timed out");
                output.push("Proposal analysis is currently unavailable.".to_owned());
            }
        }

        let ids: Vec<String> = window.map(|id| id.to_string()).collect();
        output.push("\n=== Available Proposals ID for Voting ===\n".to_owned());
        output.push(format!("[{}]", ids.join(", ")));

        let tally = self.store.tally(&wallet)?;
        output.push(prompts::tally_section(&tally));

        Ok(output.join("\n"))
    }

    /// Menu choice 3: one block per proposal this wallet has voted on,
    /// scanning ids 1 through the current count.
    async fn voting_history(&self, session: &SessionToken) -> Result<String, EngineError> {
        let Some(wallet) = self.store.wallet(session)? else {
            return Ok(prompts::NO_WALLET.to_owned());
        };

        let count = match self.proposals.proposal_count().await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(error = %e, "proposal count fetch failed");
                return Ok(format!("Error retrieving voting history: {e}"));
            }
        };

        let tally = self.store.tally(&wallet)?;
        let mut output = vec!["\n=== Your Voting History ===".to_owned()];

        for id in 1..=count {
            let Some(record) = self.store.vote_record(ProposalId::new(id), &wallet)? else {
                continue;
            };
            output.push(format!("\nProposal ID: {id}"));
            output.push(format!("Vote: {}", record.option));
            output.push(format!("Timestamp: {}", record.timestamp));
            output.push(format!("Proposal State: {}", record.proposal_state));
            output.push("Current Vote Counts:".to_owned());
            output.push(format!("- For: {}", tally.for_votes));
            output.push(format!("- Against: {}", tally.against_votes));
            output.push(format!("- Abstain: {}", tally.abstain_votes));
        }

        if output.len() == 1 {
            return Ok(prompts::NO_HISTORY.to_owned());
        }

        Ok(output.join("\n"))
    }
}

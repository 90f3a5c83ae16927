//! Core domain types for Ballot.
//!
//! This crate contains pure domain types with no IO, no async, and minimal
//! dependencies. Everything here can be used from any layer of the
//! application: wallet addresses, proposal data, vote options, tallies,
//! and the session phase enum driving the conversation state machine.

mod address;
mod ids;
mod proposal;
mod session;
mod vote;

pub use address::{AddressError, WalletAddress};
pub use ids::{ProposalId, SessionToken};
pub use proposal::{Proposal, ProposalState, ProposalStateError};
pub use session::{SessionPhase, is_reset_phrase};
pub use vote::{VoteOption, VoteOptionError, VoteRecord, VoteTally};

//! Conversation state machine for the voting flow.
//!
//! [`VotingSession`] interprets one inbound message at a time against the
//! session's persisted phase, mutates the store, and returns the next
//! user-facing text. Collaborators are injected through the
//! [`ballot_store::SessionStore`], [`ballot_chain::ProposalSource`], and
//! [`ballot_insight::InsightSource`] traits so the whole machine is
//! testable with in-memory doubles.
//!
//! Phases and the transition rules:
//! - no stored phase (first contact) or a reset phrase from any phase
//!   prompts for a wallet and moves to `AwaitingWallet`
//! - `AwaitingWallet` accepts a `0x` + 40-hex address, then rests at `Menu`
//! - `Menu` dispatches on choices 1-5
//! - `AwaitingProposal` captures a numeric proposal id
//! - `AwaitingVote` runs the vote acceptance checks, then returns to `Menu`
//!   whether or not the vote was accepted

mod prompts;
mod session;

pub use session::{EngineError, VotingSession};

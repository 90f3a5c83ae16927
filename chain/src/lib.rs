//! Read-only proposal source over a governance contract.
//!
//! The engine depends on the [`ProposalSource`] trait; [`GovernorClient`]
//! implements it against a GovernorBravo-style contract through plain
//! JSON-RPC `eth_call` requests. No transactions are ever signed or sent.

mod abi;
mod error;
mod governor;

pub use error::ChainError;
pub use governor::GovernorClient;

use ballot_types::{Proposal, ProposalId};

/// Read-only accessor over the governance contract.
///
/// `proposal` must surface an unknown/invalid id as
/// [`ChainError::NotFound`], distinguishable from transport failures.
pub trait ProposalSource: Send + Sync {
    fn proposal(
        &self,
        id: ProposalId,
    ) -> impl Future<Output = Result<Proposal, ChainError>> + Send;

    fn proposal_count(&self) -> impl Future<Output = Result<u64, ChainError>> + Send;
}

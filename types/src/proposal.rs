//! On-chain proposal data, sourced read-only from the governance contract.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ProposalId, WalletAddress};

/// GovernorBravo proposal lifecycle states, in contract ordinal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalState {
    Pending = 0,
    Active = 1,
    Canceled = 2,
    Defeated = 3,
    Succeeded = 4,
    Queued = 5,
    Expired = 6,
    Executed = 7,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unknown proposal state ordinal {0}")]
pub struct ProposalStateError(pub u8);

impl TryFrom<u8> for ProposalState {
    type Error = ProposalStateError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Pending),
            1 => Ok(Self::Active),
            2 => Ok(Self::Canceled),
            3 => Ok(Self::Defeated),
            4 => Ok(Self::Succeeded),
            5 => Ok(Self::Queued),
            6 => Ok(Self::Expired),
            7 => Ok(Self::Executed),
            other => Err(ProposalStateError(other)),
        }
    }
}

impl ProposalState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Active => "Active",
            Self::Canceled => "Canceled",
            Self::Defeated => "Defeated",
            Self::Succeeded => "Succeeded",
            Self::Queued => "Queued",
            Self::Expired => "Expired",
            Self::Executed => "Executed",
        }
    }
}

impl fmt::Display for ProposalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A governance proposal as read from the contract. Never mutated here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    pub proposer: WalletAddress,
    pub start_block: u64,
    pub end_block: u64,
    /// Raw vote weights from the contract (wei-denominated).
    pub for_votes: u128,
    pub against_votes: u128,
    pub abstain_votes: u128,
    pub canceled: bool,
    pub executed: bool,
    pub state: ProposalState,
}

impl Proposal {
    /// Total weight cast across all three options.
    #[must_use]
    pub fn total_votes(&self) -> u128 {
        self.for_votes + self.against_votes + self.abstain_votes
    }
}

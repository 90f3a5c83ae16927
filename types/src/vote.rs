//! Vote options, per-wallet tallies, and the per-proposal vote ledger entry.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ProposalState;

/// The three recognized vote options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteOption {
    For,
    Against,
    Abstain,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid vote option '{0}'; expected for, against, or abstain")]
pub struct VoteOptionError(pub String);

impl VoteOption {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::For => "for",
            Self::Against => "against",
            Self::Abstain => "abstain",
        }
    }
}

impl FromStr for VoteOption {
    type Err = VoteOptionError;

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "for" => Ok(Self::For),
            "against" => Ok(Self::Against),
            "abstain" => Ok(Self::Abstain),
            other => Err(VoteOptionError(other.to_owned())),
        }
    }
}

impl fmt::Display for VoteOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cumulative per-wallet vote counters, one per option.
///
/// Counters only ever grow; a missing counter reads as zero.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    #[serde(rename = "for")]
    pub for_votes: u64,
    #[serde(rename = "against")]
    pub against_votes: u64,
    #[serde(rename = "abstain")]
    pub abstain_votes: u64,
}

impl VoteTally {
    #[must_use]
    pub fn count(&self, option: VoteOption) -> u64 {
        match option {
            VoteOption::For => self.for_votes,
            VoteOption::Against => self.against_votes,
            VoteOption::Abstain => self.abstain_votes,
        }
    }

    pub fn increment(&mut self, option: VoteOption) {
        match option {
            VoteOption::For => self.for_votes += 1,
            VoteOption::Against => self.against_votes += 1,
            VoteOption::Abstain => self.abstain_votes += 1,
        }
    }
}

/// The latest recorded choice for a (proposal, wallet) pair.
///
/// A later accepted submission overwrites the earlier one; there is no
/// append history. Persisted as an explicit serde structure, never as a
/// debug dump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub option: VoteOption,
    /// ISO 8601 timestamp of the accepted submission.
    pub timestamp: String,
    /// Proposal lifecycle state observed at the time of voting.
    pub proposal_state: ProposalState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_parses_case_insensitively() {
        assert_eq!("FOR".parse::<VoteOption>().unwrap(), VoteOption::For);
        assert_eq!(" against ".parse::<VoteOption>().unwrap(), VoteOption::Against);
        assert_eq!("Abstain".parse::<VoteOption>().unwrap(), VoteOption::Abstain);
    }

    #[test]
    fn option_rejects_unknown_text() {
        let err = "yes".parse::<VoteOption>().unwrap_err();
        assert_eq!(err, VoteOptionError("yes".to_owned()));
    }

    #[test]
    fn tally_increments_exactly_one_counter() {
        let mut tally = VoteTally::default();
        tally.increment(VoteOption::For);
        assert_eq!(tally.for_votes, 1);
        assert_eq!(tally.against_votes, 0);
        assert_eq!(tally.abstain_votes, 0);
    }

    #[test]
    fn record_serializes_as_structured_json() {
        let record = VoteRecord {
            option: VoteOption::For,
            timestamp: "2025-01-01T00:00:00Z".to_owned(),
            proposal_state: ProposalState::Executed,
        };
        let json = serde_json::to_string(&record).unwrap();
        let back: VoteRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}

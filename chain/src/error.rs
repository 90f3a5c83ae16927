use ballot_types::ProposalId;
use thiserror::Error;

/// Failures from the governance contract read path.
#[derive(Debug, Error)]
pub enum ChainError {
    /// The contract reverted for this id: no such proposal.
    #[error("proposal {0} not found")]
    NotFound(ProposalId),

    /// The node answered with a JSON-RPC error other than a revert.
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// Transport-level failure reaching the node.
    #[error("RPC transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The node returned data we could not interpret.
    #[error("malformed RPC response: {0}")]
    Decode(String),
}

impl ChainError {
    /// True when the failure means "no such proposal" rather than a
    /// transport or node fault.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

//! Conversation phases and reset-phrase detection.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Free-text commands that restart the conversation flow from any phase.
///
/// Matched case-insensitively against the trimmed input.
const RESET_PHRASES: &[&str] = &[
    "start a new vote",
    "begin dao session",
    "initiate governance",
    "reset voting session",
];

/// Returns true if the input is a recognized reset phrase.
#[must_use]
pub fn is_reset_phrase(input: &str) -> bool {
    let normalized = input.trim().to_lowercase();
    RESET_PHRASES.contains(&normalized.as_str())
}

/// Where a session currently is in the voting conversation.
///
/// The absence of any stored phase is the implicit initial state (first
/// contact); there is no variant for it. `Menu` is the resting phase the
/// machine returns to after every completed sub-flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    AwaitingWallet,
    Menu,
    AwaitingProposal,
    AwaitingVote,
}

impl SessionPhase {
    /// Stable string tag used by session stores.
    #[must_use]
    pub const fn as_tag(self) -> &'static str {
        match self {
            Self::AwaitingWallet => "awaiting_wallet",
            Self::Menu => "menu",
            Self::AwaitingProposal => "awaiting_proposal",
            Self::AwaitingVote => "awaiting_vote",
        }
    }

    /// Parse a persisted tag. Unknown values normalize to `Menu` so a
    /// corrupted or legacy row can never strand a session in an
    /// unreachable state.
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "awaiting_wallet" => Self::AwaitingWallet,
            "awaiting_proposal" => Self::AwaitingProposal,
            "awaiting_vote" => Self::AwaitingVote,
            _ => Self::Menu,
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

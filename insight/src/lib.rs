//! Proposal analysis: derived metrics plus an LLM-written summary.
//!
//! [`evaluate`] is pure arithmetic over proposal vote weights. The
//! [`AnthropicSummarizer`] turns a batch of evaluations into a prompt for
//! the Anthropic Messages API and returns the model's text. Summaries are
//! best-effort by contract: callers must tolerate [`InsightError`] and
//! render without the summary section.

mod anthropic;
mod metrics;
mod retry;

pub use anthropic::{AnthropicConfig, AnthropicSummarizer};
pub use metrics::{Evaluation, Feasibility, Impact, evaluate};
pub use retry::RetryConfig;

use ballot_types::Proposal;
use thiserror::Error;

/// Failures from the summary service. All of them degrade to a partial
/// render; none are fatal.
#[derive(Debug, Error)]
pub enum InsightError {
    #[error("summary request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("summary API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("summary response was malformed: {0}")]
    Decode(String),
}

/// Best-effort natural-language summarizer over a batch of proposals.
pub trait InsightSource: Send + Sync {
    fn summarize(
        &self,
        proposals: &[Proposal],
    ) -> impl Future<Output = Result<String, InsightError>> + Send;
}

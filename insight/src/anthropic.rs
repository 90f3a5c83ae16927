//! Anthropic Messages API summarizer.

use std::time::Duration;

use ballot_types::Proposal;
use serde::Deserialize;
use serde_json::json;

use crate::retry::{RetryConfig, RetryOutcome, send_with_retry};
use crate::{Evaluation, InsightError, InsightSource, evaluate};

pub const MESSAGES_API_URL: &str = "https://api.anthropic.com/v1/messages";

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-3-haiku-20240307";
const DEFAULT_MAX_TOKENS: u32 = 500;
const DEFAULT_TEMPERATURE: f64 = 0.8;

const CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

/// Connection settings for the Messages API. `base_url` exists so tests
/// can point at a mock server.
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub request_timeout: Duration,
    pub retry: RetryConfig,
}

impl AnthropicConfig {
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_owned(),
            base_url: MESSAGES_API_URL.to_owned(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            retry: RetryConfig::default(),
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

#[derive(Debug, Deserialize)]
struct MessagesReply {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

/// Summarizes governance activity by sending aggregate metrics to the
/// Messages API and returning the model's text verbatim.
pub struct AnthropicSummarizer {
    http: reqwest::Client,
    config: AnthropicConfig,
}

impl AnthropicSummarizer {
    pub fn new(config: AnthropicConfig) -> Result<Self, InsightError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(config.request_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { http, config })
    }
}

impl InsightSource for AnthropicSummarizer {
    async fn summarize(&self, proposals: &[Proposal]) -> Result<String, InsightError> {
        if proposals.is_empty() {
            return Ok(
                "No active or recent proposals detected in the governance contract.".to_owned(),
            );
        }

        let evaluations: Vec<Evaluation> = proposals.iter().map(evaluate).collect();
        let prompt = build_prompt(&evaluations);

        let body = json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let outcome = send_with_retry(
            || {
                self.http
                    .post(&self.config.base_url)
                    .header("x-api-key", &self.config.api_key)
                    .header("anthropic-version", ANTHROPIC_VERSION)
                    .json(&body)
            },
            &self.config.retry,
        )
        .await;

        let response = match outcome {
            RetryOutcome::Success(response) => response,
            RetryOutcome::HttpError(response) => {
                let status = response.status().as_u16();
                let body = read_capped_error_body(response).await;
                return Err(InsightError::Api { status, body });
            }
            RetryOutcome::ConnectionError { attempts, source } => {
                tracing::warn!(attempts, error = %source, "summary request gave up");
                return Err(InsightError::Transport(source));
            }
        };

        let reply: MessagesReply = response
            .json()
            .await
            .map_err(|e| InsightError::Decode(e.to_string()))?;

        let text = reply
            .content
            .first()
            .map(|block| block.text.trim().to_owned())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| InsightError::Decode("reply carried no text content".to_owned()))?;

        Ok(text)
    }
}

fn build_prompt(evaluations: &[Evaluation]) -> String {
    let active = evaluations
        .iter()
        .filter(|e| e.state == ballot_types::ProposalState::Active)
        .count();
    let high_impact = evaluations
        .iter()
        .filter(|e| e.impact == crate::Impact::High)
        .count();
    let avg_support =
        evaluations.iter().map(|e| e.support_ratio).sum::<f64>() / evaluations.len() as f64;

    let details: Vec<serde_json::Value> = evaluations
        .iter()
        .map(|e| {
            json!({
                "id": e.id,
                "support_ratio": format!("{:.2}", e.support_ratio),
                "impact": e.impact.to_string(),
                "feasibility": e.feasibility.to_string(),
                "status": e.state.as_str(),
                "risks": e.risks,
            })
        })
        .collect();

    format!(
        "Analyze the following DAO governance data:\n\
         \n\
         Current State:\n\
         - Total Proposals Analyzed: {total}\n\
         - Active Proposals: {active}\n\
         - High Impact Proposals: {high_impact}\n\
         - Average Support Ratio: {avg_support:.2}%\n\
         \n\
         Detailed Evaluations: {details}\n\
         \n\
         Provide a concise analysis focusing on:\n\
         1. Overall governance health\n\
         2. Key trends in proposal success/failure\n\
         3. Recommendations for improving participation",
        total = evaluations.len(),
        details = serde_json::Value::Array(details),
    )
}

async fn read_capped_error_body(response: reqwest::Response) -> String {
    match response.bytes().await {
        Ok(body) => {
            if body.len() > MAX_ERROR_BODY_BYTES {
                let text = String::from_utf8_lossy(&body[..MAX_ERROR_BODY_BYTES]);
                format!("{text}...(truncated)")
            } else {
                String::from_utf8_lossy(&body).into_owned()
            }
        }
        Err(e) => format!("(error body unreadable: {e})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ballot_types::{ProposalId, ProposalState, WalletAddress};
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn proposal(id: u64, for_votes: u128, against: u128, state: ProposalState) -> Proposal {
        Proposal {
            id: ProposalId::new(id),
            proposer: WalletAddress::new("0x2222222222222222222222222222222222222222").unwrap(),
            start_block: 10,
            end_block: 20,
            for_votes,
            against_votes: against,
            abstain_votes: 0,
            canceled: false,
            executed: state == ProposalState::Executed,
            state,
        }
    }

    fn summarizer(server: &MockServer) -> AnthropicSummarizer {
        let config = AnthropicConfig::new("test-key")
            .with_base_url(format!("{}/v1/messages", server.uri()));
        AnthropicSummarizer::new(config).unwrap()
    }

    #[tokio::test]
    async fn returns_model_text_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test-key"))
            .and(header("anthropic-version", ANTHROPIC_VERSION))
            .and(body_string_contains("Total Proposals Analyzed: 2"))
            .and(body_string_contains("Average Support Ratio: 75.00%"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [{ "type": "text", "text": "  Governance looks healthy.  " }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let proposals = vec![
            proposal(1, 100, 0, ProposalState::Active),
            proposal(2, 50, 50, ProposalState::Executed),
        ];
        let text = summarizer(&server).summarize(&proposals).await.unwrap();
        assert_eq!(text, "Governance looks healthy.");
    }

    #[tokio::test]
    async fn empty_batch_short_circuits_without_a_request() {
        let server = MockServer::start().await;
        // No mock mounted: any request would 404 and fail the test below.
        let text = summarizer(&server).summarize(&[]).await.unwrap();
        assert!(text.contains("No active or recent proposals"));
    }

    #[tokio::test]
    async fn api_error_carries_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_string(r#"{"error":{"message":"invalid model"}}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let proposals = vec![proposal(1, 10, 0, ProposalState::Active)];
        let err = summarizer(&server).summarize(&proposals).await.unwrap_err();
        match err {
            InsightError::Api { status, body } => {
                assert_eq!(status, 400);
                assert!(body.contains("invalid model"));
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_reply_is_a_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "content": [] })))
            .mount(&server)
            .await;

        let proposals = vec![proposal(1, 10, 0, ProposalState::Active)];
        let err = summarizer(&server).summarize(&proposals).await.unwrap_err();
        assert!(matches!(err, InsightError::Decode(_)));
    }
}

//! GovernorBravo contract reader.

use std::time::Duration;

use ballot_types::{Proposal, ProposalId, ProposalState, WalletAddress};
use serde::Deserialize;
use serde_json::json;

use crate::abi::{
    SELECTOR_PROPOSAL_COUNT, SELECTOR_PROPOSALS, SELECTOR_STATE, decode_result, encode_call,
    encode_call_u64, word_address, word_bool, word_u64, word_u128,
};
use crate::{ChainError, ProposalSource};

const CONNECT_TIMEOUT_SECS: u64 = 10;
const REQUEST_TIMEOUT_SECS: u64 = 30;

// GovernorBravo `proposals(uint256)` tuple layout:
// [id, proposer, eta, startBlock, endBlock, forVotes, againstVotes,
//  abstainVotes, canceled, executed]
const WORD_PROPOSER: usize = 1;
const WORD_START_BLOCK: usize = 3;
const WORD_END_BLOCK: usize = 4;
const WORD_FOR_VOTES: usize = 5;
const WORD_AGAINST_VOTES: usize = 6;
const WORD_ABSTAIN_VOTES: usize = 7;
const WORD_CANCELED: usize = 8;
const WORD_EXECUTED: usize = 9;

#[derive(Debug, Deserialize)]
struct RpcReply {
    result: Option<String>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

impl RpcErrorBody {
    /// Geth reports reverts as code 3; other nodes put "revert" in the
    /// message. Either way it means the contract rejected the call.
    fn is_revert(&self) -> bool {
        self.code == 3 || self.message.to_ascii_lowercase().contains("revert")
    }
}

enum CallResult {
    Data(Vec<u8>),
    Reverted,
}

/// Read-only JSON-RPC client for a GovernorBravo governance contract.
pub struct GovernorClient {
    http: reqwest::Client,
    rpc_url: String,
    contract: WalletAddress,
}

impl GovernorClient {
    pub fn new(rpc_url: impl Into<String>, contract: WalletAddress) -> Result<Self, ChainError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self {
            http,
            rpc_url: rpc_url.into(),
            contract,
        })
    }

    async fn eth_call(&self, data: String) -> Result<CallResult, ChainError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_call",
            "params": [{ "to": self.contract.as_str(), "data": data }, "latest"],
        });

        let reply: RpcReply = self
            .http
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        match (reply.result, reply.error) {
            (Some(result), _) => Ok(CallResult::Data(decode_result(&result)?)),
            (None, Some(error)) if error.is_revert() => {
                tracing::debug!(code = error.code, message = %error.message, "eth_call reverted");
                Ok(CallResult::Reverted)
            }
            (None, Some(error)) => Err(ChainError::Rpc {
                code: error.code,
                message: error.message,
            }),
            (None, None) => Err(ChainError::Decode(
                "RPC reply carried neither result nor error".to_owned(),
            )),
        }
    }

    async fn state(&self, id: ProposalId) -> Result<ProposalState, ChainError> {
        let data = encode_call_u64(SELECTOR_STATE, id.value());
        match self.eth_call(data).await? {
            // GovernorBravo reverts state() for an invalid proposal id.
            CallResult::Reverted => Err(ChainError::NotFound(id)),
            CallResult::Data(data) => {
                let ordinal = word_u64(&data, 0)?;
                let ordinal = u8::try_from(ordinal)
                    .map_err(|_| ChainError::Decode(format!("state ordinal {ordinal}")))?;
                ProposalState::try_from(ordinal)
                    .map_err(|e| ChainError::Decode(e.to_string()))
            }
        }
    }
}

impl ProposalSource for GovernorClient {
    async fn proposal(&self, id: ProposalId) -> Result<Proposal, ChainError> {
        // state() is the existence check; proposals() returns a zeroed
        // tuple for unknown ids instead of reverting.
        let state = self.state(id).await?;

        let data = encode_call_u64(SELECTOR_PROPOSALS, id.value());
        let data = match self.eth_call(data).await? {
            CallResult::Reverted => return Err(ChainError::NotFound(id)),
            CallResult::Data(data) => data,
        };

        let proposer = WalletAddress::new(word_address(&data, WORD_PROPOSER)?)
            .map_err(|e| ChainError::Decode(format!("proposer address: {e}")))?;

        Ok(Proposal {
            id,
            proposer,
            start_block: word_u64(&data, WORD_START_BLOCK)?,
            end_block: word_u64(&data, WORD_END_BLOCK)?,
            for_votes: word_u128(&data, WORD_FOR_VOTES)?,
            against_votes: word_u128(&data, WORD_AGAINST_VOTES)?,
            abstain_votes: word_u128(&data, WORD_ABSTAIN_VOTES)?,
            canceled: word_bool(&data, WORD_CANCELED)?,
            executed: word_bool(&data, WORD_EXECUTED)?,
            state,
        })
    }

    async fn proposal_count(&self) -> Result<u64, ChainError> {
        let data = encode_call(SELECTOR_PROPOSAL_COUNT);
        match self.eth_call(data).await? {
            CallResult::Reverted => Err(ChainError::Rpc {
                code: 3,
                message: "proposalCount() reverted".to_owned(),
            }),
            CallResult::Data(data) => word_u64(&data, 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn contract() -> WalletAddress {
        WalletAddress::new("0x408ED6354d4973f66138C91495F2f2FCbd8724C3").unwrap()
    }

    fn rpc_result(hex_words: &str) -> serde_json::Value {
        json!({ "jsonrpc": "2.0", "id": 1, "result": format!("0x{hex_words}") })
    }

    fn word_hex(value: u64) -> String {
        format!("{value:064x}")
    }

    /// Build a proposals() return with the GovernorBravo field order.
    fn proposals_return(
        proposer: &str,
        start_block: u64,
        end_block: u64,
        for_votes: u64,
        against_votes: u64,
        abstain_votes: u64,
        canceled: bool,
        executed: bool,
    ) -> String {
        let mut words = String::new();
        words.push_str(&word_hex(7)); // id
        words.push_str(&format!("{:0>64}", proposer.trim_start_matches("0x")));
        words.push_str(&word_hex(0)); // eta
        words.push_str(&word_hex(start_block));
        words.push_str(&word_hex(end_block));
        words.push_str(&word_hex(for_votes));
        words.push_str(&word_hex(against_votes));
        words.push_str(&word_hex(abstain_votes));
        words.push_str(&word_hex(u64::from(canceled)));
        words.push_str(&word_hex(u64::from(executed)));
        words
    }

    #[tokio::test]
    async fn reads_proposal_count() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .and(body_string_contains(SELECTOR_PROPOSAL_COUNT))
            .respond_with(ResponseTemplate::new(200).set_body_json(rpc_result(&word_hex(12))))
            .expect(1)
            .mount(&server)
            .await;

        let client = GovernorClient::new(server.uri(), contract()).unwrap();
        assert_eq!(client.proposal_count().await.unwrap(), 12);
    }

    #[tokio::test]
    async fn reads_an_executed_proposal() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(body_string_contains(SELECTOR_STATE))
            .respond_with(ResponseTemplate::new(200).set_body_json(rpc_result(&word_hex(7))))
            .mount(&server)
            .await;

        let proposer = "0x1111111111111111111111111111111111111111";
        Mock::given(method("POST"))
            .and(body_string_contains(SELECTOR_PROPOSALS))
            .respond_with(ResponseTemplate::new(200).set_body_json(rpc_result(
                &proposals_return(proposer, 100, 200, 900, 50, 25, false, true),
            )))
            .mount(&server)
            .await;

        let client = GovernorClient::new(server.uri(), contract()).unwrap();
        let proposal = client.proposal(ProposalId::new(7)).await.unwrap();

        assert_eq!(proposal.state, ProposalState::Executed);
        assert_eq!(proposal.proposer.as_str(), proposer);
        assert_eq!(proposal.start_block, 100);
        assert_eq!(proposal.end_block, 200);
        assert_eq!(proposal.for_votes, 900);
        assert_eq!(proposal.against_votes, 50);
        assert_eq!(proposal.abstain_votes, 25);
        assert!(!proposal.canceled);
        assert!(proposal.executed);
        assert_eq!(proposal.total_votes(), 975);
    }

    #[tokio::test]
    async fn revert_maps_to_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": {
                    "code": 3,
                    "message": "execution reverted: GovernorBravo::state: invalid proposal id"
                }
            })))
            .mount(&server)
            .await;

        let client = GovernorClient::new(server.uri(), contract()).unwrap();
        let err = client.proposal(ProposalId::new(999)).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn node_fault_is_not_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": { "code": -32000, "message": "header not found" }
            })))
            .mount(&server)
            .await;

        let client = GovernorClient::new(server.uri(), contract()).unwrap();
        let err = client.proposal(ProposalId::new(1)).await.unwrap_err();
        assert!(!err.is_not_found());
        assert!(matches!(err, ChainError::Rpc { code: -32000, .. }));
    }

    #[tokio::test]
    async fn http_error_is_transport() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let client = GovernorClient::new(server.uri(), contract()).unwrap();
        let err = client.proposal_count().await.unwrap_err();
        assert!(matches!(err, ChainError::Transport(_)));
    }
}

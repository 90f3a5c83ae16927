//! HTTP surface: request/response types, routing, and handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use ballot_chain::ProposalSource;
use ballot_engine::{EngineError, VotingSession};
use ballot_insight::InsightSource;
use ballot_store::SessionStore;
use ballot_types::SessionToken;

pub struct AppState<S, P, I> {
    pub session: VotingSession<S, P, I>,
}

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    /// Requester identity as reported by the transport.
    pub sender: String,
    /// Free-text message body.
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct ExecuteReply {
    pub text: String,
    pub cost: Cost,
}

/// Flat per-request billing annotation, opaque to the engine.
#[derive(Debug, Serialize)]
pub struct Cost {
    pub amount: u64,
    pub currency: &'static str,
}

impl ExecuteReply {
    fn new(text: String) -> Self {
        Self {
            text,
            cost: Cost {
                amount: 1,
                currency: "USDC",
            },
        }
    }
}

/// Engine failures (store unreachable) are the only server errors; every
/// user-level condition is already plain reply text.
pub struct ApiError(EngineError);

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        Self(e)
    }
}

impl From<ballot_store::StoreError> for ApiError {
    fn from(e: ballot_store::StoreError) -> Self {
        Self(EngineError::Store(e))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self.0, "request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": self.0.to_string() })),
        )
            .into_response()
    }
}

pub fn router<S, P, I>(state: Arc<AppState<S, P, I>>) -> Router
where
    S: SessionStore + 'static,
    P: ProposalSource + 'static,
    I: InsightSource + 'static,
{
    Router::new()
        .route("/health", get(health))
        .route("/execute", post(execute::<S, P, I>))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn execute<S, P, I>(
    State(state): State<Arc<AppState<S, P, I>>>,
    Json(request): Json<ExecuteRequest>,
) -> Result<Json<ExecuteReply>, ApiError>
where
    S: SessionStore,
    P: ProposalSource,
    I: InsightSource,
{
    let token = session_for(state.session.store(), &request.sender)?;
    tracing::info!(sender = %request.sender, session = %token, "executing request");

    let text = state.session.handle_message(&token, &request.text).await?;
    Ok(Json(ExecuteReply::new(text)))
}

/// Look up the session token bound to this requester, minting a fresh
/// random one on first contact. This is the only place tokens are minted.
fn session_for(
    store: &dyn SessionStore,
    sender: &str,
) -> Result<SessionToken, ballot_store::StoreError> {
    if let Some(token) = store.token_for_requester(sender)? {
        return Ok(token);
    }
    let token = SessionToken::new(Uuid::new_v4().to_string());
    store.bind_requester(sender, &token)?;
    Ok(token)
}

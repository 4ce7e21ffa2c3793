use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::api::error::ApiError;
use crate::api::server::AppState;
use crate::commands::parse_participant;
use crate::emotion::EmotionVector;
use crate::engine::Reply;
use crate::lifecycle::HealthRecord;
use crate::routing::RouteExplanation;
use crate::types::{Agent, AgentId, FusionId, FusionRequest, FusionStatus, Message};

const DEFAULT_MESSAGE_LIMIT: usize = 50;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub agents: BTreeMap<AgentId, HealthRecord>,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        agents: state.dispatcher.health_snapshot(),
    })
}

pub async fn list_agents(State(state): State<AppState>) -> Json<Vec<Agent>> {
    Json(state.dispatcher.registry().all().to_vec())
}

#[derive(Serialize)]
pub struct EmotionResponse {
    pub agent_id: AgentId,
    pub dominant: String,
    pub emotions: EmotionVector,
}

pub async fn get_emotions(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EmotionResponse>, ApiError> {
    let agent_id = AgentId::from(id);
    state.dispatcher.registry().lookup(&agent_id)?;
    let emotions = state.dispatcher.emotions().get(&agent_id);
    let (dominant, _) = emotions.dominant();
    Ok(Json(EmotionResponse {
        agent_id,
        dominant: dominant.as_str().to_string(),
        emotions,
    }))
}

#[derive(Deserialize)]
pub struct RouteRequest {
    pub text: String,
}

pub async fn explain_route(
    State(state): State<AppState>,
    Json(request): Json<RouteRequest>,
) -> Json<RouteExplanation> {
    Json(state.dispatcher.router().route_explained(&request.text))
}

#[derive(Deserialize)]
pub struct AskRequest {
    pub text: String,
    /// Skip routing and ask this agent.
    #[serde(default)]
    pub agent_id: Option<AgentId>,
}

pub async fn ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<Reply>, ApiError> {
    let reply = match &request.agent_id {
        Some(agent_id) => state.dispatcher.ask_agent(agent_id, &request.text).await?,
        None => state.dispatcher.handle_text(&request.text).await?,
    };
    Ok(Json(reply))
}

#[derive(Deserialize)]
pub struct FusionStartRequest {
    pub agent_ids: Vec<AgentId>,
    pub query: String,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Serialize)]
pub struct FusionStarted {
    pub fusion_id: FusionId,
    pub status: FusionStatus,
}

pub async fn start_fusion(
    State(state): State<AppState>,
    Json(request): Json<FusionStartRequest>,
) -> Result<Json<FusionStarted>, ApiError> {
    let dispatcher = &state.dispatcher;
    let timeout_ms = request
        .timeout_ms
        .unwrap_or_else(|| dispatcher.fusion().default_timeout_ms());
    let fusion_id = dispatcher.start_fusion("api", &request.agent_ids, &request.query, timeout_ms)?;
    let status = dispatcher
        .fusion()
        .status(&fusion_id)
        .map(|r| r.status)
        .unwrap_or(FusionStatus::Pending);
    Ok(Json(FusionStarted { fusion_id, status }))
}

pub async fn get_fusion(
    State(state): State<AppState>,
    Path(id): Path<FusionId>,
) -> Result<Json<FusionRequest>, ApiError> {
    state
        .dispatcher
        .fusion()
        .status(&id)
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Fusion not found: {}", id)))
}

#[derive(Deserialize)]
pub struct MessageQuery {
    pub a: Option<String>,
    pub b: Option<String>,
    pub limit: Option<usize>,
}

/// Messages between `a` and `b` when both are given, otherwise the latest ones.
pub async fn list_messages(
    State(state): State<AppState>,
    Query(query): Query<MessageQuery>,
) -> Json<Vec<Message>> {
    let limit = query.limit.unwrap_or(DEFAULT_MESSAGE_LIMIT);
    let bridge = state.dispatcher.bridge();
    let messages = match (&query.a, &query.b) {
        (Some(a), Some(b)) => bridge.history(&parse_participant(a), &parse_participant(b), limit),
        _ => bridge.recent(limit),
    };
    Json(messages)
}

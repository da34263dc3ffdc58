// rest_api/src/handlers/ai.rs
use axum::{extract::State, http::HeaderMap, Json};
use lib::ai::{AnalysisReport, ChatMessage, ChatReply, JsonRpcResponse};
use security::permissions;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{ApiResult, RestApiError};
use crate::extract::{resolve_scope, tenant_header, ApiJson, ApiPath, AuthUser};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub session_id: Option<Uuid>,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub symptoms: String,
}

pub async fn chat_handler(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiJson(body): ApiJson<ChatRequest>,
) -> ApiResult<Json<ChatReply>> {
    caller.require(&state, permissions::AI_USE)?;
    Ok(Json(state.platform.chat.send(&caller.actor, body.session_id, &body.message).await?))
}

pub async fn chat_history_handler(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiPath(session_id): ApiPath<Uuid>,
) -> ApiResult<Json<Vec<ChatMessage>>> {
    caller.require(&state, permissions::AI_USE)?;
    Ok(Json(state.platform.chat.history(&caller.actor, session_id).await?))
}

pub async fn analyze_handler(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiJson(body): ApiJson<AnalyzeRequest>,
) -> ApiResult<Json<AnalysisReport>> {
    caller.require(&state, permissions::AI_USE)?;
    if body.symptoms.trim().is_empty() {
        return Err(RestApiError::InvalidInput("symptoms must not be empty".into()));
    }
    Ok(Json(state.platform.analyzer.analyze(&body.symptoms)))
}

/// JSON-RPC endpoint for tool-calling agents. Tools that read hospital data
/// run against the `X-Tenant` hospital or the caller's own.
pub async fn mcp_handler(
    State(state): State<AppState>,
    caller: AuthUser,
    headers: HeaderMap,
    ApiJson(body): ApiJson<Value>,
) -> ApiResult<Json<JsonRpcResponse>> {
    caller.require(&state, permissions::AI_USE)?;
    let header = tenant_header(&headers);
    let scope = if header.is_some() || caller.actor.tenant_id.is_some() {
        Some(resolve_scope(&state, header, Some(&caller.actor)).await?)
    } else {
        None
    };
    Ok(Json(state.platform.mcp.handle_value(scope.as_ref(), body).await))
}

//! Aicall endpoints.
//!
//! - `POST   /v1/aicalls`                  start an aicall
//! - `GET    /v1/aicalls`                  list with filters
//! - `GET    /v1/aicalls/:id`              get
//! - `DELETE /v1/aicalls/:id`              terminate if live, then soft delete
//! - `POST   /v1/aicalls/:id/start`        also `pause`, `resume`, `terminate`
//! - `GET    /v1/aicalls/:id/messages`     ledger, newest first
//! - `POST   /v1/aicalls/:id/messages`     run a conversation turn
//! - `POST   /v1/aicalls/:id/tools`        dispatch a tool call

use ac_domain::aicall::{Aicall, AicallStatus, Gender, ReferenceType};
use ac_domain::error::Error;
use ac_domain::message::{FunctionCall, Message, Role, ToolType};
use ac_runtime::{CleanupWarning, TransitionOutcome};
use ac_store::{AicallFilter, MessageFilter, Page};
use axum::extract::{Path, Query, State};
use axum::response::Json;
use serde::Deserialize;
use uuid::Uuid;

use super::error::ApiResult;
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    pub ai_id: Uuid,
    #[serde(default)]
    pub activeflow_id: Option<Uuid>,
    #[serde(default)]
    pub reference_type: ReferenceType,
    #[serde(default)]
    pub reference_id: Option<Uuid>,
    #[serde(default)]
    pub gender: Gender,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    "en-US".into()
}

#[derive(Debug, Deserialize)]
pub struct ListAicallsQuery {
    #[serde(default)]
    pub customer_id: Option<Uuid>,
    #[serde(default)]
    pub reference_id: Option<Uuid>,
    #[serde(default)]
    pub transcribe_id: Option<Uuid>,
    #[serde(default)]
    pub status: Option<AicallStatus>,
    #[serde(default)]
    pub page_size: Option<usize>,
    #[serde(default)]
    pub page_token: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub page_size: Option<usize>,
    #[serde(default)]
    pub page_token: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    #[serde(default = "default_role")]
    pub role: Role,
    pub text: String,
    #[serde(default)]
    pub return_response: bool,
}

fn default_role() -> Role {
    Role::User
}

#[derive(Debug, Deserialize)]
pub struct ToolRequest {
    pub tool_call_id: String,
    #[serde(rename = "type", default)]
    pub kind: ToolType,
    pub function: FunctionCall,
}

fn outcome_json(outcome: TransitionOutcome) -> serde_json::Value {
    let warnings: Vec<serde_json::Value> = outcome
        .warnings
        .iter()
        .map(|w: &CleanupWarning| serde_json::json!({ "step": w.step.as_str(), "error": w.error }))
        .collect();
    serde_json::json!({ "aicall": outcome.aicall, "warnings": warnings })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Lifecycle
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn start_aicall(
    State(state): State<AppState>,
    Json(req): Json<StartRequest>,
) -> ApiResult<Json<Aicall>> {
    let outcome = state
        .aicalls
        .start(
            req.ai_id,
            req.activeflow_id,
            req.reference_type,
            req.reference_id,
            req.gender,
            &req.language,
        )
        .await?;

    // Call initialization continues in the background; its failure has
    // already terminated the aicall, so only log it here.
    if let Some(init) = outcome.init {
        let id = outcome.aicall.id;
        tokio::spawn(async move {
            match init.join().await {
                Ok(aicall) => tracing::debug!(aicall_id = %id, status = %aicall.status, "init finished"),
                Err(e) => tracing::warn!(aicall_id = %id, error = %e, "init did not complete"),
            }
        });
    }
    Ok(Json(outcome.aicall))
}

pub async fn list_aicalls(
    State(state): State<AppState>,
    Query(q): Query<ListAicallsQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let filter = AicallFilter {
        customer_id: q.customer_id,
        reference_id: q.reference_id,
        transcribe_id: q.transcribe_id,
        status: q.status,
        deleted: Some(false),
    };
    let page = Page {
        size: q.page_size,
        token: q.page_token,
    };
    let aicalls = state.aicalls.list(&filter, &page).await?;
    let next_page_token = aicalls.last().map(|a| a.id);
    Ok(Json(serde_json::json!({
        "result": aicalls,
        "next_page_token": next_page_token,
    })))
}

pub async fn get_aicall(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Aicall>> {
    Ok(Json(state.aicalls.get(id).await?))
}

pub async fn delete_aicall(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Aicall>> {
    Ok(Json(state.aicalls.delete(id).await?))
}

pub async fn start(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<serde_json::Value>> {
    let aicall = state.aicalls.process_start(id).await?;
    Ok(Json(outcome_json(TransitionOutcome::clean(aicall))))
}

pub async fn pause(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<serde_json::Value>> {
    Ok(Json(outcome_json(state.aicalls.process_pause(id).await?)))
}

pub async fn resume(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<serde_json::Value>> {
    let aicall = state.aicalls.process_resume(id).await?;
    Ok(Json(outcome_json(TransitionOutcome::clean(aicall))))
}

pub async fn terminate(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<serde_json::Value>> {
    Ok(Json(outcome_json(state.aicalls.process_terminate(id).await?)))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Messages & tools
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn list_messages(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(q): Query<PageQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    state.aicalls.get(id).await?;
    let page = Page {
        size: q.page_size,
        token: q.page_token,
    };
    let messages = state
        .aicalls
        .messages()
        .list(id, &MessageFilter::live(), &page)
        .await?;
    let next_page_token = messages.last().map(|m| m.id);
    Ok(Json(serde_json::json!({
        "result": messages,
        "next_page_token": next_page_token,
    })))
}

pub async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SendRequest>,
) -> ApiResult<Json<Message>> {
    if req.text.trim().is_empty() {
        return Err(Error::Validation("text must not be empty".into()).into());
    }
    let message = state
        .aicalls
        .send(id, req.role, &req.text, req.return_response)
        .await?;
    Ok(Json(message))
}

pub async fn dispatch_tool(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ToolRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let resp = state
        .aicalls
        .dispatch(id, &req.tool_call_id, req.kind, req.function)
        .await?;
    Ok(Json(serde_json::json!({
        "result": resp.payload,
        "terminating": resp.terminating,
    })))
}

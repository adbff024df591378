//! AI configuration endpoints.
//!
//! - `POST   /v1/ais`      create
//! - `GET    /v1/ais`      list (`customer_id`, `page_size`, `page_token`)
//! - `GET    /v1/ais/:id`  get
//! - `PUT    /v1/ais/:id`  replace mutable fields
//! - `DELETE /v1/ais/:id`  soft delete

use ac_domain::ai::{Ai, AiFields};
use ac_store::{AiFilter, Page};
use axum::extract::{Path, Query, State};
use axum::response::Json;
use serde::Deserialize;
use uuid::Uuid;

use super::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListAisQuery {
    #[serde(default)]
    pub customer_id: Option<Uuid>,
    #[serde(default)]
    pub page_size: Option<usize>,
    #[serde(default)]
    pub page_token: Option<Uuid>,
}

pub async fn create_ai(State(state): State<AppState>, Json(fields): Json<AiFields>) -> ApiResult<Json<Ai>> {
    Ok(Json(state.ais.create(fields).await?))
}

pub async fn list_ais(
    State(state): State<AppState>,
    Query(q): Query<ListAisQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let filter = AiFilter {
        customer_id: q.customer_id,
        deleted: Some(false),
    };
    let page = Page {
        size: q.page_size,
        token: q.page_token,
    };
    let ais = state.ais.list(&filter, &page).await?;
    let next_page_token = ais.last().map(|a| a.id);
    Ok(Json(serde_json::json!({
        "result": ais,
        "next_page_token": next_page_token,
    })))
}

pub async fn get_ai(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Ai>> {
    Ok(Json(state.ais.get(id).await?))
}

pub async fn update_ai(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(fields): Json<AiFields>,
) -> ApiResult<Json<Ai>> {
    Ok(Json(state.ais.update(id, fields).await?))
}

pub async fn delete_ai(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Ai>> {
    Ok(Json(state.ais.delete(id).await?))
}

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::error::Result;
use crate::model::url::StatsResponse;
use crate::state::AppState;

/// `GET /ping` — back-end liveness.
pub async fn ping_handler(State(state): State<AppState>) -> Result<Response> {
    state.mediator.ping().await?;
    Ok(StatusCode::OK.into_response())
}

/// `GET /api/internal/stats` — storage usage counters. Reached only
/// through the trusted-subnet admission layer.
pub async fn stats_handler(State(state): State<AppState>) -> Result<Response> {
    let stats = state.mediator.stats().await?;
    Ok(Json(StatsResponse {
        urls: stats.urls,
        users: stats.users,
    })
    .into_response())
}

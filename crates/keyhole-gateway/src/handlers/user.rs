use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use keyhole_core::Slug;
use tracing::debug;

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::model::url::UserUrlResponse;
use crate::state::AppState;

/// `GET /api/user/urls` — the caller's live pairs, or 204 when there are
/// none.
pub async fn user_urls_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Response> {
    let urls = state.mediator.urls_for_user(&user.user_id).await?;
    if urls.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let body: Vec<UserUrlResponse> = urls
        .into_iter()
        .map(|pair| UserUrlResponse {
            original_url: pair.original_url,
            short_url: pair.short_url,
        })
        .collect();
    Ok(Json(body).into_response())
}

/// `DELETE /api/user/urls` — accepts a JSON array of slugs for
/// asynchronous deletion and acknowledges with 202.
pub async fn delete_urls_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    body: std::result::Result<Json<Vec<String>>, JsonRejection>,
) -> Result<Response> {
    let Json(slugs) = body.map_err(|e| AppError::BadRequest(e.to_string()))?;
    debug!(count = slugs.len(), "deletion request accepted");

    let slugs: Vec<Slug> = slugs.into_iter().map(Slug::new).collect();
    state.mediator.delete(slugs, &user.user_id).await?;
    Ok(StatusCode::ACCEPTED.into_response())
}

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use keyhole_shortener::RequestError;
use tracing::debug;

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::model::url::{
    BatchShortenEntry, BatchShortenResult, ShortenRequest, ShortenResponse,
};
use crate::state::AppState;

/// `POST /` — plain-text url in, plain-text short URL out.
pub async fn shorten_text_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    body: String,
) -> Result<Response> {
    debug!(url = %body, "text shorten request");
    match state.mediator.shorten(&body, &user.user_id).await {
        Ok(short_url) => Ok((StatusCode::CREATED, short_url).into_response()),
        Err(RequestError::Conflict { short_url }) => {
            Ok((StatusCode::CONFLICT, short_url).into_response())
        }
        Err(err) => Err(err.into()),
    }
}

/// `POST /api/shorten` — `{"url": ...}` in, `{"result": ...}` out.
pub async fn shorten_json_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    body: std::result::Result<Json<ShortenRequest>, JsonRejection>,
) -> Result<Response> {
    let Json(request) = body.map_err(|e| AppError::BadRequest(e.to_string()))?;
    debug!(url = %request.url, "json shorten request");
    match state.mediator.shorten(&request.url, &user.user_id).await {
        Ok(result) => Ok((StatusCode::CREATED, Json(ShortenResponse { result })).into_response()),
        Err(RequestError::Conflict { short_url }) => Ok((
            StatusCode::CONFLICT,
            Json(ShortenResponse { result: short_url }),
        )
            .into_response()),
        Err(err) => Err(err.into()),
    }
}

/// `POST /api/shorten/batch` — correlated entries in, correlated short
/// URLs out. An already-stored url contributes its existing short URL
/// instead of failing the batch.
pub async fn shorten_batch_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    body: std::result::Result<Json<Vec<BatchShortenEntry>>, JsonRejection>,
) -> Result<Response> {
    let Json(entries) = body.map_err(|e| AppError::BadRequest(e.to_string()))?;
    if entries.is_empty() {
        return Err(AppError::BadRequest("empty batch".to_string()));
    }

    let mut results = Vec::with_capacity(entries.len());
    for entry in entries {
        let short_url = match state
            .mediator
            .shorten(&entry.original_url, &user.user_id)
            .await
        {
            Ok(short_url) => short_url,
            Err(RequestError::Conflict { short_url }) => short_url,
            Err(err) => return Err(err.into()),
        };
        results.push(BatchShortenResult {
            correlation_id: entry.correlation_id,
            short_url,
        });
    }

    Ok((StatusCode::CREATED, Json(results)).into_response())
}

/// `GET /{urlID}` — temporary redirect to the original URL.
pub async fn redirect_handler(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Response> {
    let url = state.mediator.resolve(&slug.into()).await?;
    Ok((
        StatusCode::TEMPORARY_REDIRECT,
        [(header::LOCATION, url)],
    )
        .into_response())
}

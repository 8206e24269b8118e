use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::decompression::RequestDecompressionLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware::{auth, subnet};
use crate::state::AppState;

/// Builds the HTTP front's router.
///
/// Every route sits behind cookie authentication; the internal stats
/// endpoint additionally sits behind trusted-subnet admission.
pub fn router(state: AppState) -> Router {
    let stats = Router::new()
        .route("/api/internal/stats", get(handlers::stats_handler))
        .route_layer(from_fn_with_state(state.clone(), subnet::admit_trusted));

    Router::new()
        .route("/", post(handlers::shorten_text_handler))
        .route("/api/shorten", post(handlers::shorten_json_handler))
        .route("/api/shorten/batch", post(handlers::shorten_batch_handler))
        .route(
            "/api/user/urls",
            get(handlers::user_urls_handler).delete(handlers::delete_urls_handler),
        )
        .route("/ping", get(handlers::ping_handler))
        .route("/{urlID}", get(handlers::redirect_handler))
        .merge(stats)
        .layer(from_fn_with_state(state.clone(), auth::authenticate))
        .layer(RequestDecompressionLayer::new())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

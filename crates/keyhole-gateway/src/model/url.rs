use serde::{Deserialize, Serialize};

/// Body of `POST /api/shorten`.
#[derive(Debug, Deserialize)]
pub struct ShortenRequest {
    pub url: String,
}

/// Body of the `POST /api/shorten` 201/409 responses.
#[derive(Debug, Serialize)]
pub struct ShortenResponse {
    pub result: String,
}

/// One entry of `POST /api/shorten/batch`.
#[derive(Debug, Deserialize)]
pub struct BatchShortenEntry {
    pub correlation_id: String,
    pub original_url: String,
}

/// One entry of the batch response.
#[derive(Debug, Serialize)]
pub struct BatchShortenResult {
    pub correlation_id: String,
    pub short_url: String,
}

/// One entry of the `GET /api/user/urls` response.
#[derive(Debug, Serialize)]
pub struct UserUrlResponse {
    pub original_url: String,
    pub short_url: String,
}

/// Body of `GET /api/internal/stats`.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub urls: i64,
    pub users: i64,
}

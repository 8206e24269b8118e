use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use keyhole_shortener::RequestError;

pub type Result<T> = std::result::Result<T, AppError>;

/// HTTP-side error wrapper mapping the request taxonomy onto status codes.
#[derive(Debug)]
pub enum AppError {
    /// Malformed request surface (bad body, bad path parameter).
    BadRequest(String),
    Request(RequestError),
}

impl From<RequestError> for AppError {
    fn from(err: RequestError) -> Self {
        AppError::Request(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            AppError::Request(err) => {
                let status = match &err {
                    RequestError::InvalidUrl(_) => StatusCode::BAD_REQUEST,
                    RequestError::InvalidAuth => StatusCode::UNAUTHORIZED,
                    RequestError::NotFound(_) => StatusCode::NOT_FOUND,
                    RequestError::Deleted(_) => StatusCode::GONE,
                    // Conflict responses echo the previously stored short
                    // URL as their body.
                    RequestError::Conflict { short_url } => {
                        return (StatusCode::CONFLICT, short_url.clone()).into_response();
                    }
                    RequestError::Timeout => StatusCode::GATEWAY_TIMEOUT,
                    RequestError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, err.to_string()).into_response()
            }
        }
    }
}

use axum::body::Body;
use axum::extract::State;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use crate::state::AppState;

/// The authenticated caller, installed into request extensions for
/// handlers to extract.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
}

/// Cookie authentication.
///
/// A request without the auth cookie gets a freshly issued token: the
/// request proceeds under the new identity and the response carries the
/// matching `Set-Cookie`. A present but invalid token is rejected with 401.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    match cookie_value(request.headers(), &state.auth_key) {
        Some(token) => match state.identity.validate(&token) {
            Ok(user_id) => {
                request.extensions_mut().insert(AuthUser { user_id });
                next.run(request).await
            }
            Err(e) => {
                debug!(error = %e, "rejected tampered auth cookie");
                (StatusCode::UNAUTHORIZED, "token authentication failed").into_response()
            }
        },
        None => {
            let issued = match state.identity.issue() {
                Ok(issued) => issued,
                Err(e) => {
                    return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
                }
            };
            request.extensions_mut().insert(AuthUser {
                user_id: issued.user_id,
            });

            let mut response = next.run(request).await;
            let cookie = format!("{}={}; Path=/", state.auth_key, issued.token);
            if let Ok(value) = HeaderValue::from_str(&cookie) {
                response.headers_mut().append(SET_COOKIE, value);
            }
            response
        }
    }
}

/// Extracts the named cookie from the `Cookie` header(s).
fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn finds_named_cookie_among_others() {
        let headers = headers_with("theme=dark; user=abcdef; lang=en");
        assert_eq!(cookie_value(&headers, "user").as_deref(), Some("abcdef"));
    }

    #[test]
    fn missing_cookie_is_none() {
        let headers = headers_with("theme=dark");
        assert_eq!(cookie_value(&headers, "user"), None);
    }

    #[test]
    fn empty_header_map_is_none() {
        assert_eq!(cookie_value(&HeaderMap::new(), "user"), None);
    }
}

//! End-to-end tests of the HTTP front over the in-memory back-end.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use keyhole_gateway::middleware::subnet::TrustedSubnet;
use keyhole_gateway::{app, AppState};
use keyhole_identity::Identity;
use keyhole_shortener::{Mediator, NanoSlugGenerator, ShortenerService, SlugSettings};
use keyhole_storage::MemoryStore;
use tower::ServiceExt;
use url::Url;

const BASE_URL: &str = "http://localhost:8080";

fn test_router() -> Router {
    let store = Arc::new(MemoryStore::new());
    let generator = NanoSlugGenerator::new(SlugSettings::builder().build());
    let service = ShortenerService::new(store, Box::new(generator));
    let mediator = Arc::new(Mediator::new(service, Url::parse(BASE_URL).unwrap()));

    let state = AppState::builder()
        .mediator(mediator)
        .identity(Arc::new(Identity::new("test secret")))
        .auth_key("user".to_string())
        .trusted_subnet(TrustedSubnet::parse("127.0.0.0/8"))
        .build();
    app::router(state)
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Returns the `name=value` pair from the response's `Set-Cookie` header.
fn session_cookie(response: &axum::response::Response) -> String {
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("response should set the auth cookie")
        .to_str()
        .unwrap();
    cookie.split(';').next().unwrap().to_string()
}

fn text_shorten_request(url: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri("/");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(url.to_string())).unwrap()
}

async fn shorten(router: &Router, url: &str, cookie: Option<&str>) -> (String, String) {
    let response = router
        .clone()
        .oneshot(text_shorten_request(url, cookie))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let cookie = match cookie {
        Some(existing) => existing.to_string(),
        None => session_cookie(&response),
    };
    (body_string(response).await, cookie)
}

fn slug_of(short_url: &str) -> &str {
    short_url.rsplit('/').next().unwrap()
}

#[tokio::test]
async fn shorten_then_lookup_roundtrips() {
    let router = test_router();

    let (short_url, _) = shorten(&router, "https://www.example.com/a", None).await;
    assert!(short_url.starts_with(&format!("{BASE_URL}/")));

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/{}", slug_of(&short_url)))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "https://www.example.com/a"
    );
}

#[tokio::test]
async fn duplicate_shorten_returns_409_with_prior_short_url() {
    let router = test_router();

    let (first, _) = shorten(&router, "https://www.example.com/a", None).await;

    let response = router
        .clone()
        .oneshot(text_shorten_request("https://www.example.com/a", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_string(response).await, first);
}

#[tokio::test]
async fn json_shorten_returns_result_envelope() {
    let router = test_router();

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/shorten")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"url":"https://www.example.com/a"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    let result = body["result"].as_str().unwrap();
    assert!(result.starts_with(&format!("{BASE_URL}/")));
}

#[tokio::test]
async fn malformed_shorten_body_is_bad_request() {
    let router = test_router();

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/shorten")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn invalid_url_is_bad_request() {
    let router = test_router();

    let response = router
        .clone()
        .oneshot(text_shorten_request("definitely not a url", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn lookup_of_deleted_returns_410() {
    let router = test_router();

    let (short_url, cookie) = shorten(&router, "https://www.example.com/a", None).await;
    let slug = slug_of(&short_url);

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/user/urls")
                .header(header::COOKIE, &cookie)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(format!(r#"["{slug}"]"#)))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    // The in-memory back-end applies tombstones synchronously.
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/{slug}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::GONE);
}

#[tokio::test]
async fn unknown_slug_returns_404() {
    let router = test_router();

    let response = router
        .clone()
        .oneshot(Request::builder().uri("/ghost").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn per_user_listing_is_scoped() {
    let router = test_router();

    let (_, cookie) = shorten(&router, "https://www.example.com/a", None).await;
    shorten(&router, "https://www.example.com/b", Some(&cookie)).await;
    shorten(&router, "https://www.example.com/c", Some(&cookie)).await;

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/user/urls")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body.as_array().unwrap().len(), 3);

    // A fresh identity sees nothing.
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/user/urls")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn tampered_cookie_is_unauthorized() {
    let router = test_router();

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/user/urls")
                .header(header::COOKIE, "user=deadbeef")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn issued_cookie_is_accepted_on_subsequent_requests() {
    let router = test_router();

    let (_, cookie) = shorten(&router, "https://www.example.com/a", None).await;

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/user/urls")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn batch_shorten_reuses_existing_short_urls() {
    let router = test_router();

    let (existing, cookie) = shorten(&router, "https://stored.example/a", None).await;

    let body = r#"[{"correlation_id":"one","original_url":"https://fresh.example/b"},
                   {"correlation_id":"two","original_url":"https://stored.example/a"}]"#;
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/shorten/batch")
                .header(header::COOKIE, &cookie)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let results: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    let results = results.as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["correlation_id"], "one");
    assert!(results[0]["short_url"].as_str().unwrap().starts_with(BASE_URL));
    // The duplicate entry echoes the short URL issued earlier.
    assert_eq!(results[1]["short_url"], existing.as_str());
}

#[tokio::test]
async fn empty_batch_is_bad_request() {
    let router = test_router();

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/shorten/batch")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("[]"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn ping_reports_liveness() {
    let router = test_router();

    let response = router
        .clone()
        .oneshot(Request::builder().uri("/ping").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn stats_admits_trusted_subnet_only() {
    let router = test_router();
    shorten(&router, "https://www.example.com/a", None).await;

    // Inside 127.0.0.0/8.
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/internal/stats")
                .header("x-real-ip", "127.0.0.1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["urls"], 1);
    assert_eq!(body["users"], 1);

    // Outside the subnet.
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/internal/stats")
                .header("x-real-ip", "203.0.113.9")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn deletion_is_scoped_to_the_requesting_user() {
    let router = test_router();

    let (short_url, _owner_cookie) = shorten(&router, "https://www.example.com/a", None).await;
    let slug = slug_of(&short_url);

    // A different (fresh) identity asks for the deletion; nothing happens.
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/user/urls")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(format!(r#"["{slug}"]"#)))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/{slug}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
}

#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Router tests that run without a database: the admin gate, the highlight
//! stylesheet, favicons, health reporting and CSRF rejection.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use tower_sessions::session::Id;

use common::{TestApp, body_string, set_cookies};

#[tokio::test]
async fn admin_without_session_redirects_to_login() {
    let app = TestApp::new().await;

    let response = app.get("/admin").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "/login?next=%2Fadmin"
    );
    assert!(
        set_cookies(&response)
            .iter()
            .all(|c| !c.starts_with("quire_session=")),
        "no cookie to clear when none was sent"
    );
}

#[tokio::test]
async fn redirect_keeps_the_query_string() {
    let app = TestApp::new().await;

    let response = app.get("/admin/posts?page=2").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "/login?next=%2Fadmin%2Fposts%3Fpage%3D2"
    );
}

#[tokio::test]
async fn stale_session_cookie_is_cleared() {
    let app = TestApp::new().await;

    let request = Request::get("/admin/settings")
        .header(header::COOKIE, format!("quire_session={}", Id::default()))
        .body(Body::empty())
        .unwrap();
    let response = app.request(request).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "/login?next=%2Fadmin%2Fsettings"
    );
    let cookies = set_cookies(&response);
    assert!(
        cookies
            .iter()
            .any(|c| c.starts_with("quire_session=") && c.contains("Max-Age=0")),
        "expected a removal cookie, got {cookies:?}"
    );
}

#[tokio::test]
async fn admin_posts_are_gated_too() {
    let app = TestApp::new().await;

    let response = app.post_form("/admin/tags/new", "name=rust").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let request = Request::post("/admin/menus")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("[]"))
        .unwrap();
    let response = app.request(request).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn tag_post_listing_is_gated() {
    let app = TestApp::new().await;

    let response = app
        .get("/admin/tags/0190a6f2-7c4b-7d0e-9a1b-1c2d3e4f5a6b/posts")
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(
        response
            .headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("/login?next=%2Fadmin%2Ftags%2F")
    );
}

#[tokio::test]
async fn favicons_are_served_once_generated() {
    let app = TestApp::new().await;

    assert_eq!(app.get("/favicon.ico").await.status(), StatusCode::NOT_FOUND);

    app.state
        .media()
        .store_asset("favicon.ico", b"\x00\x00\x01\x00icon")
        .await
        .unwrap();

    let response = app.get("/favicon.ico").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get(header::CONTENT_TYPE).unwrap(), "image/x-icon");
    assert_eq!(
        response.headers().get(header::X_CONTENT_TYPE_OPTIONS).unwrap(),
        "nosniff"
    );
    assert_eq!(app.get("/apple-touch-icon.png").await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn highlight_css_is_cached_by_etag() {
    let app = TestApp::new().await;

    let response = app.get("/highlight.css").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/css; charset=utf-8"
    );
    let etag = response
        .headers()
        .get(header::ETAG)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    let css = body_string(response).await;
    assert!(css.contains(".hl-"));

    let request = Request::get("/highlight.css")
        .header(header::IF_NONE_MATCH, &etag)
        .body(Body::empty())
        .unwrap();
    let response = app.request(request).await;
    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    assert_eq!(response.headers().get(header::ETAG).unwrap(), etag.as_str());
    assert!(body_string(response).await.is_empty());

    let request = Request::get("/highlight.css")
        .header(header::IF_NONE_MATCH, "\"something-else\"")
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.request(request).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn health_reports_unreachable_database() {
    let app = TestApp::new().await;

    let response = app.get("/health").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["postgres"], false);
    assert_eq!(body["storage"], "local");
}

#[tokio::test]
async fn login_without_csrf_token_is_rejected() {
    let app = TestApp::new().await;

    let response = app
        .post_form("/login", "email=ada%40example.com&password=x&csrf_token=forged")
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_string(response).await;
    assert!(body.contains("Your form expired"));
    assert!(body.contains("ada@example.com"));
}

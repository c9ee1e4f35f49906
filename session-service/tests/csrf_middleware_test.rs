mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use tower::util::ServiceExt;

use common::{bearer, body_json, session_record, setup, setup_with_failing_store};

#[tokio::test]
async fn valid_header_token_allows_state_change() {
    let ctx = setup().await;
    ctx.store.insert(session_record("sess-a", 1));

    let csrf = ctx.state.csrf.issue(Some("sess-a")).await.unwrap();

    let response = ctx
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/sessions/revoke-all")
                .header(header::AUTHORIZATION, bearer(&ctx.state, 1, "sess-a"))
                .header("x-csrf-token", csrf)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["message"], "All other sessions revoked successfully");
}

#[tokio::test]
async fn token_in_json_body_is_accepted() {
    let ctx = setup().await;
    ctx.store.insert(session_record("sess-a", 1));

    let csrf = ctx.state.csrf.issue(Some("sess-a")).await.unwrap();
    let body = serde_json::json!({ "_csrf": csrf, "excludeCurrent": false });

    let response = ctx
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/sessions/revoke-all")
                .header(header::AUTHORIZATION, bearer(&ctx.state, 1, "sess-a"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["message"], "All sessions revoked successfully");
}

#[tokio::test]
async fn missing_token_is_rejected() {
    let ctx = setup().await;
    ctx.store.insert(session_record("sess-a", 1));

    let response = ctx
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/sessions/revoke-all")
                .header(header::AUTHORIZATION, bearer(&ctx.state, 1, "sess-a"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["error"], "csrf_invalid");
}

#[tokio::test]
async fn tampered_token_is_rejected() {
    let ctx = setup().await;
    ctx.store.insert(session_record("sess-a", 1));

    let csrf = ctx.state.csrf.issue(Some("sess-a")).await.unwrap();
    let flipped = if csrf.starts_with('0') { "1" } else { "0" };
    let tampered = format!("{}{}", flipped, &csrf[1..]);

    let response = ctx
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/sessions/revoke-all")
                .header(header::AUTHORIZATION, bearer(&ctx.state, 1, "sess-a"))
                .header("x-csrf-token", tampered)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["error"], "csrf_invalid");
    // Token material never appears in the rejection.
    assert!(!body["message"].as_str().unwrap().contains(&csrf));
}

#[tokio::test]
async fn token_issued_for_another_session_is_rejected() {
    let ctx = setup().await;
    ctx.store.insert(session_record("sess-a", 1));
    ctx.store.insert(session_record("sess-b", 2));

    // Token belongs to sess-b, request authenticates as sess-a.
    let csrf = ctx.state.csrf.issue(Some("sess-b")).await.unwrap();

    let response = ctx
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/sessions/revoke-all")
                .header(header::AUTHORIZATION, bearer(&ctx.state, 1, "sess-a"))
                .header("x-csrf-token", csrf)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn safe_methods_skip_validation() {
    let ctx = setup().await;
    ctx.store.insert(session_record("sess-a", 1));

    let response = ctx
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/sessions")
                .header(header::AUTHORIZATION, bearer(&ctx.state, 1, "sess-a"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn exempt_path_prefix_skips_validation() {
    let ctx = setup().await;

    // No route is mounted under /auth/, so passing the CSRF layer shows
    // up as a plain 404 rather than a 403.
    let response = ctx
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/login")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn anonymous_state_change_fails_closed() {
    let ctx = setup().await;

    let response = ctx
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/sessions/revoke-all")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["error"], "csrf_invalid");
}

#[tokio::test]
async fn store_outage_fails_closed() {
    let ctx = setup_with_failing_store().await;

    let response = ctx
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/sessions/revoke-all")
                .header(header::AUTHORIZATION, bearer(&ctx.state, 1, "sess-a"))
                .header("x-csrf-token", "a".repeat(64))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["error"], "store_unavailable");
}

#[tokio::test]
async fn anonymous_caller_can_fetch_a_token() {
    let ctx = setup().await;

    let response = ctx
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/csrf-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let token = body["csrfToken"].as_str().unwrap();
    assert_eq!(token.len(), 64);
    assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
}

#[tokio::test]
async fn issuing_a_new_token_invalidates_the_previous_one() {
    let ctx = setup().await;
    ctx.store.insert(session_record("sess-a", 1));

    let first = ctx.state.csrf.issue(Some("sess-a")).await.unwrap();
    let second = ctx.state.csrf.issue(Some("sess-a")).await.unwrap();
    assert_ne!(first, second);

    let response = ctx
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/sessions/revoke-all")
                .header(header::AUTHORIZATION, bearer(&ctx.state, 1, "sess-a"))
                .header("x-csrf-token", first)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use session_service::services::{SessionBlacklist, SessionStore};
use tower::util::ServiceExt;

use common::{bearer, body_json, session_record, setup, setup_with_failing_store};

#[tokio::test]
async fn list_returns_only_the_callers_sessions() {
    let ctx = setup().await;
    ctx.store.insert(session_record("sess-a", 1));
    ctx.store.insert(session_record("sess-b", 1));
    ctx.store.insert(session_record("sess-other", 2));

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
    let body = body_json(response).await;
    let sessions = body["sessions"].as_array().unwrap();
    assert_eq!(sessions.len(), 2);
    for s in sessions {
        let is_current = s["sessionId"] == "sess-a";
        assert_eq!(s["isCurrent"], is_current);
    }
}

#[tokio::test]
async fn list_never_exposes_csrf_material() {
    let ctx = setup().await;
    let mut record = session_record("sess-a", 1);
    record.csrf_token = Some("super-secret-token".to_string());
    record.csrf_signature = Some("super-secret-signature".to_string());
    ctx.store.insert(record);

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
    let raw = body_json(response).await.to_string();
    assert!(!raw.contains("super-secret-token"));
    assert!(!raw.contains("super-secret-signature"));
    assert!(!raw.contains("csrfToken"));
}

#[tokio::test]
async fn revoking_an_owned_session_succeeds() {
    let ctx = setup().await;
    ctx.store.insert(session_record("sess-a", 1));
    ctx.store.insert(session_record("sess-b", 1));

    let csrf = ctx.state.csrf.issue(Some("sess-a")).await.unwrap();

    let response = ctx
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/sessions/sess-b")
                .header(header::AUTHORIZATION, bearer(&ctx.state, 1, "sess-a"))
                .header("x-csrf-token", csrf)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Session revoked successfully");

    let stored = ctx.store.get("sess-b").await.unwrap().unwrap();
    assert!(stored.revoked_at.is_some());
    assert!(ctx.blacklist.is_blacklisted("sess-b").await.unwrap());
}

#[tokio::test]
async fn revoking_another_users_session_is_forbidden() {
    let ctx = setup().await;
    ctx.store.insert(session_record("sess-a", 1));
    ctx.store.insert(session_record("sess-theirs", 2));

    let csrf = ctx.state.csrf.issue(Some("sess-a")).await.unwrap();

    let response = ctx
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/sessions/sess-theirs")
                .header(header::AUTHORIZATION, bearer(&ctx.state, 1, "sess-a"))
                .header("x-csrf-token", csrf)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["error"], "forbidden");
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("Session not found or access denied"));

    // Untouched.
    let stored = ctx.store.get("sess-theirs").await.unwrap().unwrap();
    assert!(stored.revoked_at.is_none());
}

#[tokio::test]
async fn revoking_an_unknown_session_is_indistinguishable_from_forbidden() {
    let ctx = setup().await;
    ctx.store.insert(session_record("sess-a", 1));

    let csrf = ctx.state.csrf.issue(Some("sess-a")).await.unwrap();

    let response = ctx
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/sessions/no-such-session")
                .header(header::AUTHORIZATION, bearer(&ctx.state, 1, "sess-a"))
                .header("x-csrf-token", csrf)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["error"], "forbidden");
}

#[tokio::test]
async fn revoke_all_spares_the_current_session_by_default() {
    let ctx = setup().await;
    ctx.store.insert(session_record("sess-a", 1));
    ctx.store.insert(session_record("sess-b", 1));
    ctx.store.insert(session_record("sess-c", 1));

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

    assert!(ctx.store.get("sess-a").await.unwrap().unwrap().revoked_at.is_none());
    assert!(ctx.store.get("sess-b").await.unwrap().unwrap().revoked_at.is_some());
    assert!(ctx.store.get("sess-c").await.unwrap().unwrap().revoked_at.is_some());
}

#[tokio::test]
async fn revoke_all_can_include_the_current_session() {
    let ctx = setup().await;
    ctx.store.insert(session_record("sess-a", 1));
    ctx.store.insert(session_record("sess-b", 1));

    let csrf = ctx.state.csrf.issue(Some("sess-a")).await.unwrap();
    let body = serde_json::json!({ "excludeCurrent": false });

    let response = ctx
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/sessions/revoke-all")
                .header(header::AUTHORIZATION, bearer(&ctx.state, 1, "sess-a"))
                .header("x-csrf-token", csrf)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["message"], "All sessions revoked successfully");

    assert!(ctx.store.get("sess-a").await.unwrap().unwrap().revoked_at.is_some());
    assert!(ctx.store.get("sess-b").await.unwrap().unwrap().revoked_at.is_some());
}

#[tokio::test]
async fn management_routes_require_authentication() {
    let ctx = setup().await;

    let response = ctx
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/sessions")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn listing_fails_closed_when_the_store_is_down() {
    let ctx = setup_with_failing_store().await;

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

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["error"], "store_unavailable");
}

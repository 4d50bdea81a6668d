mod common;

use axum::body::Body;
use common::{body_json, operator_request, request, TestServer};
use http::{Method, Request, StatusCode};
use roomcast::gateway::events::{Event, Identity, RoomId};
use tower::ServiceExt;

#[tokio::test]
async fn test_health_endpoint() {
    let app = common::test_app().await;
    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"ok");
}

#[tokio::test]
async fn test_not_found() {
    let app = common::test_app().await;
    let response = app
        .oneshot(request(Method::GET, "/nonexistent", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cors_headers_present() {
    let app = common::test_app().await;
    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("Origin", "http://example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(response
        .headers()
        .contains_key("access-control-allow-origin"));
}

#[tokio::test]
async fn test_version_reports_room_count() {
    let app = common::test_app().await;
    let response = app
        .oneshot(request(Method::GET, "/api/v1/version", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(json["rooms"], 0);
}

#[tokio::test]
async fn test_operator_creates_user_with_working_token() {
    let server = TestServer::new().await;

    let response = server
        .router()
        .oneshot(operator_request(
            Method::POST,
            "/api/v1/users",
            Some(serde_json::json!({ "username": "alice" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    let token = json["data"]["token"].as_str().unwrap().to_string();
    assert_eq!(json["data"]["user"]["username"], "alice");

    let response = server
        .router()
        .oneshot(
            Request::builder()
                .uri("/api/v1/users/@me")
                .header("Authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["username"], "alice");
}

#[tokio::test]
async fn test_operator_endpoints_require_key() {
    let app = common::test_app().await;

    let response = app
        .clone()
        .oneshot(request(
            Method::POST,
            "/api/v1/rooms",
            None,
            Some(serde_json::json!({ "name": "lobby" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let mut req = request(
        Method::POST,
        "/api/v1/rooms/status/status",
        None,
        Some(serde_json::json!({ "status": "RUNNING" })),
    );
    req.headers_mut()
        .insert("X-Publish-Key", "wrong".parse().unwrap());
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_publishing_disabled_without_key() {
    let server = TestServer::new().await;
    let mut state = server.state.clone();
    state.publish_key = None;

    let response = roomcast::routes::router(state)
        .oneshot(operator_request(
            Method::POST,
            "/api/v1/rooms/status/status",
            Some(serde_json::json!({ "status": "RUNNING" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "unauthorized");
}

#[tokio::test]
async fn test_requests_without_token_are_rejected() {
    let app = common::test_app().await;
    let response = app
        .oneshot(request(Method::GET, "/api/v1/users/@me", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_room_lifecycle_and_membership() {
    let server = TestServer::new().await;
    let alice = server.create_user_with_token("alice").await;
    let bob = server.create_user_with_token("bob").await;

    let response = server
        .router()
        .oneshot(operator_request(
            Method::POST,
            "/api/v1/rooms",
            Some(serde_json::json!({ "id": "chat_1", "name": "Alice and friends" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["data"]["public"], false);

    let response = server
        .router()
        .oneshot(operator_request(
            Method::PUT,
            "/api/v1/rooms/chat_1/members/alice",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = server
        .router()
        .oneshot(request(Method::GET, "/api/v1/rooms/chat_1", Some(&alice), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["name"], "Alice and friends");

    let response = server
        .router()
        .oneshot(request(Method::GET, "/api/v1/rooms/chat_1", Some(&bob), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = server
        .router()
        .oneshot(request(Method::GET, "/api/v1/users/@me/rooms", Some(&alice), None))
        .await
        .unwrap();
    let rooms = body_json(response).await;
    assert_eq!(rooms["data"].as_array().unwrap().len(), 1);
    assert_eq!(rooms["data"][0]["id"], "chat_1");

    let response = server
        .router()
        .oneshot(operator_request(
            Method::DELETE,
            "/api/v1/rooms/chat_1/members/alice",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = server
        .router()
        .oneshot(operator_request(
            Method::DELETE,
            "/api/v1/rooms/chat_1/members/alice",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_duplicate_room_conflicts() {
    let server = TestServer::new().await;
    server.create_room("chat_1", false).await;

    let response = server
        .router()
        .oneshot(operator_request(
            Method::POST,
            "/api/v1/rooms",
            Some(serde_json::json!({ "id": "chat_1", "name": "again" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_history_pages_backwards() {
    let server = TestServer::new().await;
    let alice = server.create_user_with_token("alice").await;
    server.create_room("chat_1", false).await;
    server.add_member("chat_1", &alice.user.id).await;

    let room = RoomId::from("chat_1");
    for i in 0..5 {
        roomcast::db::events::insert_event(
            server.pool(),
            &Event::chat(room.clone(), Identity::from("alice"), format!("m{i}")),
        )
        .await
        .unwrap();
    }

    let response = server
        .router()
        .oneshot(request(
            Method::GET,
            "/api/v1/rooms/chat_1/messages?limit=3",
            Some(&alice),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let page = body_json(response).await;
    let bodies: Vec<_> = page["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["body"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(bodies, vec!["m2", "m3", "m4"]);
    assert_eq!(page["data"][0]["kind"], "chat_message");
    assert_eq!(page["cursor"]["has_more"], true);

    let before = page["cursor"]["before"].as_str().unwrap();
    let response = server
        .router()
        .oneshot(request(
            Method::GET,
            &format!("/api/v1/rooms/chat_1/messages?limit=3&before={before}"),
            Some(&alice),
            None,
        ))
        .await
        .unwrap();
    let page = body_json(response).await;
    assert_eq!(page["data"].as_array().unwrap().len(), 2);
    assert_eq!(page["data"][0]["body"], "m0");
    assert_eq!(page["cursor"]["has_more"], false);
}

#[tokio::test]
async fn test_history_rejects_bad_cursor() {
    let server = TestServer::new().await;
    let alice = server.create_user_with_token("alice").await;
    server.create_room("lobby", true).await;

    let response = server
        .router()
        .oneshot(request(
            Method::GET,
            "/api/v1/rooms/lobby/messages?before=yesterday",
            Some(&alice),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["code"], "invalid_request");
}

#[tokio::test]
async fn test_presence_of_empty_room() {
    let server = TestServer::new().await;
    let alice = server.create_user_with_token("alice").await;
    server.create_room("lobby", true).await;

    let response = server
        .router()
        .oneshot(request(
            Method::GET,
            "/api/v1/rooms/lobby/presence",
            Some(&alice),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["room_id"], "lobby");
    assert_eq!(json["data"]["connected"], 0);
}

#[tokio::test]
async fn test_publish_status_persists_event() {
    let server = TestServer::new().await;

    let response = server
        .router()
        .oneshot(operator_request(
            Method::POST,
            "/api/v1/rooms/status/status",
            Some(serde_json::json!({ "status": "RUNNING" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["room_id"], "status");
    assert_eq!(json["data"]["delivered"], 0);

    let stored = roomcast::db::events::list_events(server.pool(), "status", None, 10)
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id(), json["data"]["event_id"].as_str().unwrap());
}

#[tokio::test]
async fn test_publish_status_rejects_blank() {
    let app = common::test_app().await;
    let response = app
        .oneshot(operator_request(
            Method::POST,
            "/api/v1/rooms/status/status",
            Some(serde_json::json!({ "status": "  " })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_publish_status_length_counts_characters() {
    let server = TestServer::new().await;

    let accepted = server
        .router()
        .oneshot(operator_request(
            Method::POST,
            "/api/v1/rooms/status/status",
            Some(serde_json::json!({ "status": "ö".repeat(256) })),
        ))
        .await
        .unwrap();
    assert_eq!(accepted.status(), StatusCode::ACCEPTED);

    let rejected = server
        .router()
        .oneshot(operator_request(
            Method::POST,
            "/api/v1/rooms/status/status",
            Some(serde_json::json!({ "status": "ö".repeat(257) })),
        ))
        .await
        .unwrap();
    assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_logout_revokes_only_the_presented_token() {
    let server = TestServer::new().await;
    let alice = server.create_user_with_token("alice").await;
    let second = roomcast::db::auth::issue_token(server.pool(), &alice.user.id)
        .await
        .unwrap();

    let response = server
        .router()
        .oneshot(request(Method::POST, "/api/v1/auth/logout", Some(&alice), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = server
        .router()
        .oneshot(request(Method::GET, "/api/v1/users/@me", Some(&alice), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"]["code"], "unauthorized");

    let response = server
        .router()
        .oneshot(
            Request::builder()
                .uri("/api/v1/users/@me")
                .header("Authorization", format!("Bearer {second}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

//! End-to-end checks of the router against a bridge with faked remotes.

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use ferry_api::{AppState, build_router};
use ferry_bridge::testing::{Harness, SERVICE_URL, remote_actor};
use serde_json::{Value, json};
use tower::ServiceExt;

const ALICE: &str = "https://m.example/users/alice";

fn pubkey() -> String {
    "ab".repeat(32)
}

fn router(h: &Harness) -> Router {
    build_router(AppState::new(h.bridge.clone()))
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Option<String>, Value) {
    let resp = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let content_type = resp
        .headers()
        .get(header::CONTENT_TYPE)
        .map(|v| v.to_str().unwrap().to_owned());
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, content_type, body)
}

async fn post_inbox(app: &Router, body: String) -> StatusCode {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/inbox")
                .header(header::CONTENT_TYPE, "application/activity+json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap()
        .status()
}

fn follow() -> Value {
    json!({
        "@context": "https://www.w3.org/ns/activitystreams",
        "id": format!("{ALICE}/follows/1"),
        "type": "Follow",
        "actor": ALICE,
        "object": format!("{SERVICE_URL}/actor/{}", pubkey()),
    })
}

#[tokio::test]
async fn follow_then_undo_updates_followers() {
    let h = Harness::new();
    h.client.add_actor(remote_actor(ALICE, "alice"));
    let app = router(&h);
    let followers_uri = format!("/actor/{}/followers", pubkey());

    assert_eq!(post_inbox(&app, follow().to_string()).await, StatusCode::OK);
    assert_eq!(h.delivery.sent().len(), 1);

    let (status, content_type, body) = get(&app, &followers_uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/activity+json"));
    assert_eq!(body["totalItems"], 1);
    assert_eq!(body["first"]["orderedItems"], json!([ALICE]));

    let undo = json!({ "type": "Undo", "actor": ALICE, "object": follow() });
    assert_eq!(post_inbox(&app, undo.to_string()).await, StatusCode::OK);

    let (_, _, body) = get(&app, &format!("{followers_uri}?page=1")).await;
    assert_eq!(body["type"], "OrderedCollectionPage");
    assert_eq!(body["orderedItems"], json!([]));
}

#[tokio::test]
async fn inbox_rejects_bad_bodies() {
    let h = Harness::new();
    let app = router(&h);

    assert_eq!(post_inbox(&app, "not json".into()).await, StatusCode::BAD_REQUEST);

    let mut to_nobody = follow();
    to_nobody["object"] = json!(format!("{SERVICE_URL}/actor/nobody"));
    h.client.add_actor(remote_actor(ALICE, "alice"));
    assert_eq!(post_inbox(&app, to_nobody.to_string()).await, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn failed_accept_is_service_unavailable() {
    let h = Harness::new();
    h.client.add_actor(remote_actor(ALICE, "alice"));
    h.delivery.fail_for(&format!("{ALICE}/inbox"));
    let app = router(&h);

    assert_eq!(post_inbox(&app, follow().to_string()).await, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn unknown_activity_types_are_acknowledged() {
    let h = Harness::new();
    let app = router(&h);
    let like = json!({ "type": "Like", "actor": ALICE, "object": "https://m.example/notes/1" });
    assert_eq!(post_inbox(&app, like.to_string()).await, StatusCode::OK);
}

#[tokio::test]
async fn webfinger_resolves_local_accounts() {
    let h = Harness::new();
    let app = router(&h);

    let uri = format!("/.well-known/webfinger?resource=acct:{}@ferry.test", pubkey());
    let (status, content_type, body) = get(&app, &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/jrd+json"));
    assert_eq!(body["links"][0]["href"], format!("{SERVICE_URL}/actor/{}", pubkey()));

    let (status, _, _) = get(&app, "/.well-known/webfinger").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let uri = format!("/.well-known/webfinger?resource=acct:{}@elsewhere.example", pubkey());
    let (status, _, _) = get(&app, &uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn nip05_names_bridged_accounts() {
    let h = Harness::new();
    h.client.add_account("alice@m.example", ALICE);
    let app = router(&h);

    let (status, _, body) = get(&app, "/.well-known/nostr.json?name=alice_at_m.example").await;
    assert_eq!(status, StatusCode::OK);
    let pubkey = body["names"]["alice_at_m.example"].as_str().unwrap().to_owned();
    assert_eq!(pubkey.len(), 64);
    assert_eq!(body["relays"][&pubkey], json!(["wss://ferry.test/relay"]));

    let (status, _, _) = get(&app, "/.well-known/nostr.json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_actor_and_note_are_not_found() {
    let h = Harness::new();
    let app = router(&h);

    let (status, _, body) = get(&app, &format!("/actor/{}", pubkey())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.get("error").is_some());

    let (status, _, _) = get(&app, &format!("/note/{}", "cd".repeat(32))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_reports_healthy_store() {
    let h = Harness::new();
    let (status, _, body) = get(&router(&h), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

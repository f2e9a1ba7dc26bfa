use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use super::support::*;
use crate::web::router;

const TOKEN: &str = "s3cret-token";

fn search_request(body: Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/search")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

fn seeded_app(token: Option<&str>) -> (Router, Fixture) {
    let fx = fixture();
    seed_react(fx.store.as_ref());
    let model = Arc::new(ScriptedModel::new(analysis_reply(&["React"], &[], 0.9)));
    let library = library(fx.store.clone(), Arc::new(StubEmbedder::new()), Some(model));
    (router(Arc::new(library), token.map(str::to_string)), fx)
}

#[tokio::test]
async fn test_search_requires_token_when_configured() {
    let (app, _fx) = seeded_app(Some(TOKEN));

    let (status, body) = send(
        app.clone(),
        search_request(json!({"query": "React", "workspaceId": "ws1"}), None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let body = json!({"query": "React", "workspaceId": "ws1"});
    let (status, _) = send(app, search_request(body, Some("wrong"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_search_payload_shape() {
    let (app, _fx) = seeded_app(Some(TOKEN));

    let (status, body) = send(
        app,
        search_request(json!({"query": "React", "workspaceId": "ws1"}), Some(TOKEN)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(
        body["debug"],
        json!({"vectorCount": 2, "keywordCount": 2, "combinedCount": 2})
    );
    assert!(body["message"]
        .as_str()
        .unwrap()
        .starts_with("2 items found for \"React\" (2 bookmarks)."));

    let first = &body["results"][0];
    assert_eq!(first["searchType"], "vector");
    assert_eq!(first["type"], "bookmark");
    assert_eq!(first["title"], "React Hooks Guide");
    assert_eq!(first["workspaceId"], "ws1");
    assert!(first["similarity"].as_f64().unwrap() > 0.9);
    assert_eq!(first["tags"].as_array().unwrap().len(), 2);
    assert!(first["tags"][0]["id"].is_string());

    assert_eq!(body["analysis"]["intent"], "find React resources");
    assert_eq!(body["analysis"]["searchTerms"], json!(["React"]));
    assert!(body["analysis"]["filters"]["confidence"].as_f64().unwrap() > 0.8);
}

#[tokio::test]
async fn test_open_server_without_token() {
    let (app, _fx) = seeded_app(None);

    let (status, body) = send(app, search_request(json!({"query": "React"}), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"], json!([]));
    assert_eq!(body["debug"]["combinedCount"], 0);
    assert!(body["message"].as_str().unwrap().starts_with("No items found"));
}

#[tokio::test]
async fn test_store_failure_is_generic_500() {
    let library = library(Arc::new(BrokenStore), Arc::new(StubEmbedder::new()), None);
    let app = router(Arc::new(library), None);

    let (status, body) = send(
        app,
        search_request(json!({"query": "React", "workspaceId": "ws1"}), None),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": "internal server error"}));
}

#[tokio::test]
async fn test_tags_and_health() {
    let (app, _fx) = seeded_app(Some(TOKEN));

    let request = Request::builder()
        .uri("/tags?workspaceId=ws1")
        .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app.clone(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tags"][0]["name"], "frontend");
    assert_eq!(body["tags"][0]["count"], 2);

    let request = Request::builder().uri("/tags?workspaceId=ws1").body(Body::empty()).unwrap();
    let (status, _) = send(app.clone(), request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}

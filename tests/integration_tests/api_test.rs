//! HTTP API tests
//!
//! Drives the router in-process with `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use raspberry::server::{create_router, AppState};

use crate::common::{TestCatalog, SEED_CSV};

async fn router(catalog: &TestCatalog) -> Router {
    let service = catalog.ready_service().await;
    create_router(AppState::new(Arc::new(service)))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_health() {
    let catalog = TestCatalog::new();
    let app = router(&catalog).await;

    let (status, body) = send(&app, Method::GET, "/api/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "healthy");
}

#[tokio::test]
async fn test_intervals_endpoint_shape() {
    let catalog = TestCatalog::with_seed(SEED_CSV);
    let app = router(&catalog).await;

    let (status, body) = send(&app, Method::GET, "/api/producers/intervals", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "min": [{"producer": "X", "interval": 1, "previousWin": 1990, "followingWin": 1991}],
            "max": [{"producer": "Y", "interval": 13, "previousWin": 2002, "followingWin": 2015}]
        })
    );
}

#[tokio::test]
async fn test_create_get_update_delete() {
    let catalog = TestCatalog::with_seed(SEED_CSV);
    let app = router(&catalog).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/movies",
        Some(json!({
            "year": 2016,
            "title": "Hillary's America",
            "studios": "Quality Flix",
            "producers": "Gerald R. Molen"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["id"], 6);
    assert_eq!(body["data"]["winner"], false);

    let (status, body) = send(&app, Method::GET, "/api/movies/6", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], "Hillary's America");

    let (status, body) = send(
        &app,
        Method::PUT,
        "/api/movies/6",
        Some(json!({
            "year": 2016,
            "title": "Hillary's America",
            "studios": "Quality Flix",
            "producers": "Gerald R. Molen",
            "winner": true
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["winner"], true);

    let (status, _) = send(&app, Method::DELETE, "/api/movies/6", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&app, Method::GET, "/api/movies/6", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_validation_error_is_bad_request() {
    let catalog = TestCatalog::new();
    let app = router(&catalog).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/movies",
        Some(json!({
            "year": 1850,
            "title": "Too Early",
            "studios": "S",
            "producers": "P"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("year"));
}

#[tokio::test]
async fn test_list_with_query() {
    let catalog = TestCatalog::with_seed(SEED_CSV);
    let app = router(&catalog).await;

    let (status, body) = send(&app, Method::GET, "/api/movies?winner=true&size=3", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 4);
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 3);

    let (status, _) = send(&app, Method::GET, "/api/movies?size=0", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_unknown_is_not_found() {
    let catalog = TestCatalog::new();
    let app = router(&catalog).await;

    let (status, body) = send(&app, Method::DELETE, "/api/movies/99", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

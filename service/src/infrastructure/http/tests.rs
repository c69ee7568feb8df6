use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use cmdr_common::test_utils::{SimpleRegistry, StepClock, library, make_named_type};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use super::router;
use crate::domain::service::LibraryItemService;
use crate::infrastructure::AppStateImpl;
use crate::infrastructure::persistence::memory::InMemoryRepository;

fn app() -> Router {
    let registry = SimpleRegistry::new(vec![make_named_type("compound")]);
    let repository =
        InMemoryRepository::with_libraries(vec![library("Sponsor", true), library("CDISC", false)]);
    let service = LibraryItemService::new(
        repository,
        Arc::new(registry),
        Arc::new(StepClock::default()),
    );
    router(AppStateImpl::new(service))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-author-id", "alice");
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn create_compound(app: &Router, name: &str) -> Value {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/items/compound",
        Some(json!({ "library": "Sponsor", "value": { "name": name } })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body
}

#[tokio::test]
async fn health_check_is_ok() {
    let (status, _) = send(&app(), Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn item_types_are_listed_and_described() {
    let app = app();

    let (status, body) = send(&app, Method::GET, "/api/item-types", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["id"], "compound");
    assert_eq!(body[0]["uidPrefix"], "Compound");

    let (status, body) = send(&app, Method::GET, "/api/item-types/compound", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["fields"][0]["id"], "definition");
    assert_eq!(body["fields"][0]["type"], "Template");

    let (status, body) = send(&app, Method::GET, "/api/item-types/unknown", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status_code"], 404);
}

#[tokio::test]
async fn item_types_can_be_reloaded() {
    let (status, body) = send(&app(), Method::POST, "/api/item-types/refresh", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["loaded"], 1);
}

#[tokio::test]
async fn created_item_starts_as_draft() {
    let app = app();

    let body = create_compound(&app, "Aspirin").await;

    assert_eq!(body["uid"], "Compound_000001");
    assert_eq!(body["status"], "Draft");
    assert_eq!(body["version"], "0.1");
    assert_eq!(body["authorId"], "alice");
    assert_eq!(body["changeDescription"], "Initial version");
    assert_eq!(body["value"], json!({ "name": "Aspirin" }));
    assert_eq!(body["possibleActions"], json!(["approve", "edit", "delete"]));
}

#[tokio::test]
async fn lifecycle_round_trip() {
    let app = app();
    create_compound(&app, "Aspirin").await;
    let item = "/api/items/compound/Compound_000001";

    let (status, body) = send(
        &app,
        Method::PATCH,
        item,
        Some(json!({ "value": { "name": "Aspirin", "definition": "pain [relief]" }, "changeDescription": "Added definition" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version"], "0.2");

    let (status, body) = send(&app, Method::POST, &format!("{item}/approvals"), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "Final");
    assert_eq!(body["version"], "1.0");
    assert_eq!(body["changeDescription"], "Approved version");

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("{item}/versions"),
        Some(json!({ "changeDescription": "Rework" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "Draft");
    assert_eq!(body["version"], "1.1");

    let (status, body) = send(&app, Method::GET, &format!("{item}?version=1.0"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Final");
    assert!(body["endDate"].is_string());
    assert!(body.get("possibleActions").is_none());

    let (status, body) = send(&app, Method::GET, &format!("{item}?status=Final"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version"], "1.0");

    let (status, body) = send(&app, Method::GET, &format!("{item}/versions"), None).await;
    assert_eq!(status, StatusCode::OK);
    let versions: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["version"].as_str().unwrap())
        .collect();
    assert_eq!(versions, vec!["1.1", "1.0", "0.2", "0.1"]);
    assert_eq!(body[0]["possibleActions"], json!(["approve", "edit"]));
    assert!(body[3].get("possibleActions").is_none());

    let (status, body) = send(&app, Method::GET, &format!("{item}/actions"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!(["approve", "edit"]));
}

#[tokio::test]
async fn retire_and_reactivate_through_activations() {
    let app = app();
    create_compound(&app, "Aspirin").await;
    let item = "/api/items/compound/Compound_000001";
    send(&app, Method::POST, &format!("{item}/approvals"), None).await;

    let (status, body) = send(&app, Method::DELETE, &format!("{item}/activations"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Retired");
    assert_eq!(body["version"], "1.0");

    let (status, body) = send(&app, Method::POST, &format!("{item}/activations"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Final");
    assert_eq!(body["changeDescription"], "Reactivated version");
}

#[tokio::test]
async fn invalid_transition_is_a_bad_request() {
    let app = app();
    create_compound(&app, "Aspirin").await;
    let item = "/api/items/compound/Compound_000001";

    let (status, body) = send(&app, Method::POST, &format!("{item}/activations"), None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status_code"], 400);
    assert!(body["data"]["message"].as_str().unwrap().contains("reactivate"));
}

#[tokio::test]
async fn duplicate_unique_value_is_a_conflict() {
    let app = app();
    create_compound(&app, "Aspirin").await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/items/compound",
        Some(json!({ "library": "Sponsor", "value": { "name": "Aspirin" } })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn invalid_references_are_unprocessable() {
    let app = app();

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/items/compound",
        Some(json!({ "library": "Unknown", "value": { "name": "Aspirin" } })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/items/compound",
        Some(json!({ "library": "Sponsor", "value": { "weight": 3 } })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn deleted_draft_disappears() {
    let app = app();
    create_compound(&app, "Aspirin").await;
    let item = "/api/items/compound/Compound_000001";

    let (status, body) = send(&app, Method::DELETE, item, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (status, _) = send(&app, Method::GET, item, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn approved_item_cannot_be_deleted() {
    let app = app();
    create_compound(&app, "Aspirin").await;
    let item = "/api/items/compound/Compound_000001";
    send(&app, Method::POST, &format!("{item}/approvals"), None).await;

    let (status, _) = send(&app, Method::DELETE, item, None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn list_filters_by_status_and_pages() {
    let app = app();
    create_compound(&app, "Aspirin").await;
    create_compound(&app, "Ibuprofen").await;
    create_compound(&app, "Paracetamol").await;
    send(
        &app,
        Method::POST,
        "/api/items/compound/Compound_000002/approvals",
        None,
    )
    .await;

    let (status, body) = send(&app, Method::GET, "/api/items/compound?status=Final", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["total"], 1);
    assert_eq!(body["data"][0]["uid"], "Compound_000002");

    let (_, body) = send(&app, Method::GET, "/api/items/compound?page=2&pageSize=2", None).await;
    assert_eq!(body["meta"]["total"], 3);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["uid"], "Compound_000003");

    let (_, body) = send(&app, Method::GET, "/api/items/compound?page=1&pageSize=1", None).await;
    assert_eq!(body["meta"]["total"], 3);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, _) = send(&app, Method::GET, "/api/items/compound?status=Pending", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn conflicting_version_selectors_are_rejected() {
    let app = app();
    create_compound(&app, "Aspirin").await;

    let (status, _) = send(
        &app,
        Method::GET,
        "/api/items/compound/Compound_000001?version=0.1&status=Draft",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn read_at_instant() {
    let app = app();
    let created = create_compound(&app, "Aspirin").await;
    let item = "/api/items/compound/Compound_000001";
    send(&app, Method::POST, &format!("{item}/approvals"), None).await;

    let at = created["startDate"].as_str().unwrap();
    let (status, body) = send(&app, Method::GET, &format!("{item}?at={at}"), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version"], "0.1");
}

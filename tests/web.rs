use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use beachgen::{
    config::{CountRange, GenerationConfig},
    scenario::BeachInfo,
    store::{DatasetStore, MemoryStore},
    web::build_router,
    BeachDatasetBuilder,
};
use serde_json::{json, Value};
use tower::ServiceExt;

fn seeded_store() -> Arc<MemoryStore> {
    let store = MemoryStore::new();
    let info = BeachInfo {
        id: "beachid444987".into(),
        name: "black orange".into(),
        lat: 12.35678,
        lon: 77.13456,
    };
    let config = GenerationConfig {
        num_runs: 2,
        locations_per_run: CountRange::fixed(4),
        seed: Some(10),
        ..GenerationConfig::default()
    };
    let dataset = BeachDatasetBuilder::new(config).build(&info).unwrap();
    store.save(&info, &dataset).unwrap();

    store
        .insert_summary(&BeachInfo {
            id: "sparse".into(),
            name: "Sparse Cove".into(),
            lat: -1.0,
            lon: 2.0,
        })
        .unwrap();
    store
        .insert_raw("sparse", json!({"runs": [{"date": "2025-01-02"}]}))
        .unwrap();
    Arc::new(store)
}

async fn get(router: Router, uri: &str) -> (StatusCode, Value) {
    let response = router
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn lists_beach_summaries() {
    let router = build_router(seeded_store());

    let (status, body) = get(router, "/api/beaches").await;

    assert_eq!(status, StatusCode::OK);
    let beaches = body.as_array().unwrap();
    assert_eq!(beaches.len(), 2);
    assert_eq!(beaches[0]["id"], "beachid444987");
    assert_eq!(beaches[0]["name"], "black orange");
    assert_eq!(beaches[0]["lat"], 12.35678);
    assert!(beaches[0].get("runs").is_none());
}

#[tokio::test]
async fn returns_full_document_for_known_id() {
    let router = build_router(seeded_store());

    let (status, body) = get(router, "/api/runs/beachid444987").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "beachid444987");
    assert_eq!(body["runs"].as_array().unwrap().len(), 2);
    assert_eq!(body["runs"][0]["operation_id"], "run_20250921");
    assert_eq!(body["runs"][0]["locations"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn fills_defaults_for_sparse_documents() {
    let router = build_router(seeded_store());

    let (status, body) = get(router, "/api/runs/sparse").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Sparse Cove");
    assert_eq!(body["runs"][0]["operation_id"], "run_2025-01-02");
    assert_eq!(body["runs"][0]["locations"], json!([]));
}

#[tokio::test]
async fn unknown_id_is_not_found() {
    let router = build_router(seeded_store());

    let (status, body) = get(router, "/api/runs/nowhere").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Beach 'nowhere' not found.");
}

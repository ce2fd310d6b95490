//! Queue and results API tests against a bound server.

mod common;

use std::time::Duration;

use common::TestHarness;
use serde_json::{json, Value};

async fn wait_until_idle(client: &reqwest::Client, addr: std::net::SocketAddr) -> Vec<Value> {
    for _ in 0..100 {
        let jobs: Vec<Value> = client
            .get(format!("http://{addr}/api/queue"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if jobs
            .iter()
            .all(|j| j["status"] == "completed" || j["status"] == "error")
        {
            return jobs;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("queue did not drain");
}

#[tokio::test]
async fn queue_process_and_collect_results() {
    let (h, addr) = TestHarness::with_server().await;
    let client = reqwest::Client::new();
    let files = vec![
        h.input("a.mp4").display().to_string(),
        h.input("b.mp4").display().to_string(),
    ];

    let resp = client
        .post(format!("http://{addr}/api/queue"))
        .json(&json!({
            "files": files,
            "preset": {"kind": "video", "speed": {"min": 0.9, "max": 1.1}},
            "copies": 2
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let queued: Vec<Value> = resp.json().await.unwrap();
    assert_eq!(queued.len(), 2);
    assert_eq!(queued[0]["mode"], "batch");
    assert_eq!(queued[0]["status"], "waiting");

    let resp = client
        .post(format!("http://{addr}/api/queue/process"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 202);

    let jobs = wait_until_idle(&client, addr).await;
    assert!(jobs.iter().all(|j| j["status"] == "completed"));
    assert!(jobs.iter().all(|j| j["results"].as_array().unwrap().len() == 2));

    let results: Vec<Value> = client
        .get(format!("http://{addr}/api/results?source=batch"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(results.len(), 4);
    assert_eq!(results[0]["source"], "batch");

    let single: Vec<Value> = client
        .get(format!("http://{addr}/api/results?source=single"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(single.is_empty());

    let id = results[0]["id"].as_str().unwrap();
    let resp = client
        .delete(format!("http://{addr}/api/results/{id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);
    assert_eq!(h.ctx.aggregator.len(), 3);
}

#[tokio::test]
async fn single_file_enqueues_in_single_mode() {
    let (h, addr) = TestHarness::with_server().await;
    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/api/queue"))
        .json(&json!({
            "files": [h.input("only.png").display().to_string()],
            "preset": {"kind": "image"},
            "copies": 1
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let queued: Vec<Value> = resp.json().await.unwrap();
    assert_eq!(queued[0]["mode"], "single");
    assert_eq!(queued[0]["kind"], "image");
}

#[tokio::test]
async fn invalid_requests_map_to_status_codes() {
    let (h, addr) = TestHarness::with_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{addr}/api/queue"))
        .json(&json!({"files": [], "preset": {"kind": "video"}, "copies": 1}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = client
        .post(format!("http://{addr}/api/queue"))
        .json(&json!({
            "files": [h.input("a.mp4").display().to_string()],
            "preset": {"kind": "video"},
            "copies": 0
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let unknown = vf_core::JobId::new();
    let resp = client
        .delete(format!("http://{addr}/api/queue/{unknown}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let waiting = h
        .ctx
        .scheduler
        .enqueue(&h.input("b.mp4"), vf_core::Preset::Video(Default::default()), 1)
        .unwrap();
    let resp = client
        .post(format!("http://{addr}/api/queue/{waiting}/retry"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = client
        .delete(format!("http://{addr}/api/queue"))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["removed"], 1);
}

#[tokio::test]
async fn openapi_document_lists_the_relay() {
    let (_h, addr) = TestHarness::with_server().await;
    let doc: Value = reqwest::get(format!("http://{addr}/api-docs/openapi.json"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(doc["paths"]["/process-video"].is_object());
    assert!(doc["paths"]["/api/queue"].is_object());
}

#[tokio::test]
async fn sse_stream_connects() {
    let (_h, addr) = TestHarness::with_server().await;
    let resp = reqwest::Client::new()
        .get(format!("http://{addr}/api/events?category=queue"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let ct = resp.headers()["content-type"].to_str().unwrap().to_string();
    assert!(ct.contains("text/event-stream"), "got {ct}");
}

#[tokio::test]
async fn request_id_is_echoed() {
    let (_h, addr) = TestHarness::with_server().await;
    let resp = reqwest::Client::new()
        .get(format!("http://{addr}/health"))
        .header("x-request-id", "abc-123")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.headers()["x-request-id"], "abc-123");
}

//! Router-level integration test for `/insert_new_announcement` and `/health`,
//! standing up the app with an in-memory fake broker instead of Redis
//! (the reason `QueueBroker` is a trait — see `pipeline_queue::broker`).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{DateTime, Utc};
use http_body_util::BodyExt;
use pipeline_core::job::Job;
use pipeline_queue::{DelayedEntry, Delivered, QueueBroker, QueueError, QueueHealth};
use tower::ServiceExt;

struct FakeQueueBroker;

#[async_trait]
impl QueueBroker for FakeQueueBroker {
    async fn enqueue(&self, _queue: &str, _job: &Job) -> Result<(), QueueError> {
        Ok(())
    }
    async fn dequeue(&self, _queue: &str, _worker_list: &str, _timeout: Duration) -> Result<Option<Delivered>, QueueError> {
        Ok(None)
    }
    async fn ack(&self, _worker_list: &str, _delivered: &Delivered) -> Result<(), QueueError> {
        Ok(())
    }
    async fn enqueue_delayed(&self, _queue: &str, _job: &Job, _at: DateTime<Utc>) -> Result<(), QueueError> {
        Ok(())
    }
    async fn due_delayed(&self, _queue: &str, _now: DateTime<Utc>, _max: usize) -> Result<Vec<DelayedEntry>, QueueError> {
        Ok(vec![])
    }
    async fn remove_delayed(&self, _queue: &str, _raw: &str) -> Result<(), QueueError> {
        Ok(())
    }
    async fn restage_delayed(&self, _queue: &str, _raw: &str, _at: DateTime<Utc>) -> Result<(), QueueError> {
        Ok(())
    }
    async fn queue_len(&self, _queue: &str) -> Result<u64, QueueError> {
        Ok(0)
    }
    async fn delayed_len(&self, _queue: &str) -> Result<u64, QueueError> {
        Ok(0)
    }
    async fn acquire_lock(&self, _key: &str, _owner: &str, _ttl: Duration) -> Result<bool, QueueError> {
        Ok(true)
    }
    async fn release_lock(&self, _key: &str, _owner: &str) -> Result<(), QueueError> {
        Ok(())
    }
    async fn set_marker_if_absent(&self, _key: &str, _ttl: Duration) -> Result<bool, QueueError> {
        Ok(true)
    }
    async fn set_processing_meta(&self, _hash: &str, _job_id: &str, _at: DateTime<Utc>) -> Result<(), QueueError> {
        Ok(())
    }
    async fn set_processing_payload(&self, _hash: &str, _job_id: &str, _raw: &str) -> Result<(), QueueError> {
        Ok(())
    }
    async fn get_processing_payload(&self, _hash: &str, _job_id: &str) -> Result<Option<String>, QueueError> {
        Ok(None)
    }
    async fn stale_processing(&self, _meta_hash: &str, _ttl: Duration, _now: DateTime<Utc>) -> Result<Vec<String>, QueueError> {
        Ok(vec![])
    }
    async fn clear_processing(&self, _meta_hash: &str, _payload_hash: &str, _job_id: &str) -> Result<(), QueueError> {
        Ok(())
    }
    async fn incr_retry(&self, _hash: &str, _job_id: &str) -> Result<u32, QueueError> {
        Ok(1)
    }
    async fn clear_retry(&self, _hash: &str, _job_id: &str) -> Result<(), QueueError> {
        Ok(())
    }
    async fn publish(&self, _channel: &str, _payload: &str) -> Result<(), QueueError> {
        Ok(())
    }
    async fn health_check(&self, watched_queues: &[&str]) -> Result<QueueHealth, QueueError> {
        Ok(QueueHealth { connected: true, queue_depths: watched_queues.iter().map(|q| (q.to_string(), 0)).collect() })
    }
}

fn test_app() -> axum::Router {
    let config = server::config::ServerConfig { host: "127.0.0.1".into(), port: 0, broadcast_capacity: 64 };
    let queue: Arc<dyn QueueBroker> = Arc::new(FakeQueueBroker);
    let state = server::state::AppState::new(config, queue);
    server::router::build_router(state)
}

#[tokio::test]
async fn health_returns_ok() {
    let app = test_app();
    let response = app.oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn intake_skips_procedural_administrative() {
    let app = test_app();
    let filing = serde_json::json!({
        "corp_id": "11111111-1111-1111-1111-111111111111",
        "news_id": "N001",
        "security_id": "500325",
        "isin": null,
        "symbol": null,
        "company_name": "Acme Ltd",
        "category": "Procedural/Administrative",
        "headline": "Closure of Trading Window for Q3",
        "ai_summary": "Please refer to the original document provided.",
        "original_summary": "",
        "sentiment": "Neutral",
        "event_date": "2024-10-20T14:02:11Z",
        "file_url": null,
    });

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/insert_new_announcement")
                .header("content-type", "application/json")
                .body(Body::from(filing.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed["status"], "skipped");
}

#[tokio::test]
async fn intake_accepts_financial_results() {
    let app = test_app();
    let filing = serde_json::json!({
        "corp_id": "22222222-2222-2222-2222-222222222222",
        "news_id": "N002",
        "security_id": "500325",
        "isin": null,
        "symbol": null,
        "company_name": "Acme Ltd",
        "category": "Financial Results",
        "headline": "Board Meeting Outcome Q1",
        "ai_summary": "Quarterly results approved.",
        "original_summary": "",
        "sentiment": "Positive",
        "event_date": "2024-10-20T14:02:11Z",
        "file_url": null,
    });

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/insert_new_announcement")
                .header("content-type", "application/json")
                .body(Body::from(filing.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed["status"], "success");
}

//! Integration test: drive the write guard through its public API the way a
//! tool handler does, from healthy writes through a tripped breaker.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use serde_json::{Value, json};

use josephine_core::config::{BreakerConfig, GuardConfig, IdempotencyFailMode};
use josephine_core::idempotency::MemoryIdempotencyStore;
use josephine_mcp::envelope::{Envelope, Status, start_context};
use josephine_mcp::error::{ErrorCode, ToolError};
use josephine_mcp::guard::{WriteControl, WriteGuard};
use josephine_mcp::registry::ToolName;
use josephine_mcp::write_guard;

fn control(key: &str) -> WriteControl {
    WriteControl {
        confirm: Some(true),
        idempotency_key: Some(key.to_string()),
        reason: Some("integration".to_string()),
        ..Default::default()
    }
}

fn body(control: &WriteControl, job: &str) -> Value {
    let mut v = serde_json::to_value(control).expect("control json");
    v["job"] = json!(job);
    v
}

async fn call(
    guard: &WriteGuard,
    key: &str,
    job: &str,
    fail: bool,
    calls: &AtomicU32,
) -> Envelope {
    let ctx = start_context(ToolName::TriggerEtl);
    let control = control(key);
    guard
        .run(&ctx, &control, &body(&control, job), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            if fail {
                Err(ToolError::upstream("etl queue unavailable"))
            } else {
                Ok(json!({"job": job, "status": "queued"}))
            }
        })
        .await
}

#[tokio::test]
async fn tenth_failure_switches_tool_to_preview() {
    let config = GuardConfig {
        breaker: BreakerConfig::new(10, 60_000, 60_000),
        writes_enabled: true,
        idempotency_fail_mode: IdempotencyFailMode::Open,
    };
    let store = Arc::new(MemoryIdempotencyStore::new());
    let guard = write_guard(&config, store.clone());
    let calls = AtomicU32::new(0);

    for i in 0..9 {
        let env = call(&guard, &format!("fail-{i}"), "sales_daily", true, &calls).await;
        assert_eq!(env.status(), Status::Error);
        assert_eq!(env.error_code(), Some(ErrorCode::UpstreamError));
    }
    assert_eq!(guard.breaker().check(ToolName::TriggerEtl), None);

    let env = call(&guard, "fail-9", "sales_daily", true, &calls).await;
    assert_eq!(env.error_code(), Some(ErrorCode::UpstreamError));
    let retry_after = guard
        .breaker()
        .check(ToolName::TriggerEtl)
        .expect("breaker should be open");
    assert!(retry_after > 0 && retry_after <= 60);

    let fetches = store.fetch_count();
    let env = call(&guard, "next", "sales_daily", false, &calls).await;
    assert_eq!(env.status(), Status::Preview);
    assert_eq!(env.data()["applied"], false);
    assert_eq!(env.data()["wouldApply"]["job"], "sales_daily");
    assert_eq!(store.fetch_count(), fetches);
    assert_eq!(calls.load(Ordering::SeqCst), 10);

    // reads and other write tools keep working
    assert_eq!(guard.breaker().check(ToolName::AdjustInventory), None);
}

#[tokio::test]
async fn replay_and_conflict_across_calls() {
    let config = GuardConfig {
        writes_enabled: true,
        ..GuardConfig::default()
    };
    let store = Arc::new(MemoryIdempotencyStore::new());
    let guard = write_guard(&config, store.clone());
    let calls = AtomicU32::new(0);

    let first = call(&guard, "k1", "sales_daily", false, &calls).await;
    let second = call(&guard, "k1", "sales_daily", false, &calls).await;
    assert_eq!(first.status(), Status::Ok);
    assert_eq!(second.status(), Status::Ok);
    assert_eq!(first.data(), second.data());
    assert_ne!(first.request_id(), second.request_id());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(store.upsert_count(), 1);

    let other = call(&guard, "k1", "labour_daily", false, &calls).await;
    assert_eq!(other.error_code(), Some(ErrorCode::Conflict));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

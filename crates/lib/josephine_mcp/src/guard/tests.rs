//! Write guard gate tests over an in-memory idempotency store.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use serde_json::{Value, json};

    use josephine_core::config::{BreakerConfig, GuardConfig, IdempotencyFailMode};
    use josephine_core::idempotency::{IdempotencyStore, MemoryIdempotencyStore, StoreError};
    use josephine_core::models::idempotency::{IdempotencyRecord, NewIdempotencyRecord};

    use crate::breaker::BreakerRegistry;
    use crate::envelope::{Status, start_context};
    use crate::error::{ErrorCode, ToolError};
    use crate::guard::{Actor, Admission, WriteControl, WriteGuard};
    use crate::registry::ToolName;

    const TOOL: ToolName = ToolName::AdjustInventory;

    fn config(threshold: u32) -> GuardConfig {
        GuardConfig {
            breaker: BreakerConfig::new(threshold, 60_000, 60_000),
            writes_enabled: true,
            idempotency_fail_mode: IdempotencyFailMode::Open,
        }
    }

    fn guard_with(cfg: GuardConfig) -> (WriteGuard, Arc<MemoryIdempotencyStore>) {
        let store = Arc::new(MemoryIdempotencyStore::new());
        let breaker = Arc::new(BreakerRegistry::new(cfg.breaker));
        (WriteGuard::new(&cfg, breaker, store.clone()), store)
    }

    fn control(key: &str) -> WriteControl {
        WriteControl {
            confirm: Some(true),
            idempotency_key: Some(key.to_string()),
            reason: Some("weekly stock count".to_string()),
            actor: Some(Actor {
                name: Some("Ana".to_string()),
                role: Some("manager".to_string()),
            }),
            request_id: None,
        }
    }

    fn input(control: &WriteControl, delta: f64) -> Value {
        let mut v = serde_json::to_value(control).unwrap();
        v["itemId"] = json!("5d6c1f0e-8c1f-4f7a-9d55-2a7a9a5e7d11");
        v["delta"] = json!(delta);
        v
    }

    /// Runs a write through the guard, counting executions.
    async fn run(
        guard: &WriteGuard,
        control: &WriteControl,
        delta: f64,
        calls: &AtomicU32,
    ) -> crate::envelope::Envelope {
        let ctx = start_context(TOOL);
        let input = input(control, delta);
        guard
            .run(&ctx, control, &input, || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(json!({"movement": n, "delta": delta}))
            })
            .await
    }

    #[tokio::test]
    async fn writes_disabled_rejects_before_anything_else() {
        let mut cfg = config(10);
        cfg.writes_enabled = false;
        let (guard, store) = guard_with(cfg);
        let calls = AtomicU32::new(0);

        let env = run(&guard, &control("k1"), 1.0, &calls).await;
        assert_eq!(env.status(), Status::Error);
        assert_eq!(env.error_code(), Some(ErrorCode::WritesDisabled));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.fetch_count(), 0);
    }

    #[tokio::test]
    async fn missing_controls_are_local_errors() {
        let (guard, store) = guard_with(config(10));
        let calls = AtomicU32::new(0);

        let mut c = control("k1");
        c.confirm = Some(false);
        let env = run(&guard, &c, 1.0, &calls).await;
        assert_eq!(env.error_code(), Some(ErrorCode::MissingConfirm));

        let mut c = control("k1");
        c.confirm = None;
        let env = run(&guard, &c, 1.0, &calls).await;
        assert_eq!(env.error_code(), Some(ErrorCode::MissingConfirm));

        let mut c = control("k1");
        c.idempotency_key = Some("   ".to_string());
        let env = run(&guard, &c, 1.0, &calls).await;
        assert_eq!(env.error_code(), Some(ErrorCode::MissingIdempotencyKey));

        let mut c = control("k1");
        c.reason = None;
        let env = run(&guard, &c, 1.0, &calls).await;
        assert_eq!(env.error_code(), Some(ErrorCode::MissingReason));
        assert_eq!(env.data(), &Value::Null);

        let env = run(&guard, &control(&"k".repeat(201)), 1.0, &calls).await;
        assert_eq!(env.error_code(), Some(ErrorCode::InvalidInput));

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.fetch_count(), 0);
    }

    #[tokio::test]
    async fn key_length_is_counted_in_characters() {
        let (guard, _store) = guard_with(config(10));
        let calls = AtomicU32::new(0);

        // 200 two-byte characters: 400 bytes, still within the limit.
        let env = run(&guard, &control(&"é".repeat(200)), 1.0, &calls).await;
        assert_eq!(env.status(), Status::Ok);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let env = run(&guard, &control(&"é".repeat(201)), 1.0, &calls).await;
        assert_eq!(env.error_code(), Some(ErrorCode::InvalidInput));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retry_replays_without_second_mutation() {
        let (guard, store) = guard_with(config(10));
        let calls = AtomicU32::new(0);
        let c = control("k1");

        let first = run(&guard, &c, 2.5, &calls).await;
        assert_eq!(first.status(), Status::Ok);
        assert_eq!(first.meta()["idempotency"], "executed");
        assert_eq!(store.len(), 1);

        // a retry with a new correlation id is still the same request
        let mut retry = c.clone();
        retry.request_id = Some("corr-2".to_string());
        let second = run(&guard, &retry, 2.5, &calls).await;
        assert_eq!(second.status(), Status::Ok);
        assert_eq!(second.meta()["idempotency"], "replay");
        assert_eq!(second.warnings().len(), 1);
        assert_eq!(
            serde_json::to_string(first.data()).unwrap(),
            serde_json::to_string(second.data()).unwrap()
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn key_reuse_with_different_payload_conflicts() {
        let (guard, _store) = guard_with(config(10));
        let calls = AtomicU32::new(0);
        let c = control("k1");

        run(&guard, &c, 2.0, &calls).await;
        let env = run(&guard, &c, 3.0, &calls).await;
        assert_eq!(env.status(), Status::Error);
        assert_eq!(env.error_code(), Some(ErrorCode::Conflict));
        assert!(env.errors()[0].hint.is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn open_breaker_previews_without_touching_store() {
        let (guard, store) = guard_with(config(2));
        guard.breaker().record_error(TOOL);
        assert!(guard.breaker().record_error(TOOL));

        let calls = AtomicU32::new(0);
        let env = run(&guard, &control("k1"), 1.0, &calls).await;
        assert_eq!(env.status(), Status::Preview);
        assert!(env.errors().is_empty());
        assert_eq!(env.data()["applied"], false);
        assert_eq!(env.data()["wouldApply"]["delta"], 1.0);
        assert!(env.data()["wouldApply"].get("idempotencyKey").is_none());
        assert!(env.data()["retryAfterSec"].as_u64().unwrap() <= 60);
        assert_eq!(env.warnings().len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.fetch_count(), 0);
        assert_eq!(store.upsert_count(), 0);
    }

    #[tokio::test]
    async fn failures_record_errors_and_trip() {
        let (guard, store) = guard_with(config(2));

        for i in 0..2 {
            let ctx = start_context(TOOL);
            let c = control(&format!("fail-{i}"));
            let env = guard
                .run(&ctx, &c, &input(&c, 1.0), || async {
                    Err(ToolError::upstream("rpc failed"))
                })
                .await;
            assert_eq!(env.status(), Status::Error);
            assert_eq!(env.error_code(), Some(ErrorCode::UpstreamError));
        }

        assert!(guard.breaker().check(TOOL).is_some());
        assert_eq!(store.upsert_count(), 0);

        // a failed key was never stored, so it is not replayed later
        guard.breaker().record_success(TOOL);
        let calls = AtomicU32::new(0);
        let env = run(&guard, &control("fail-0"), 1.0, &calls).await;
        assert_eq!(env.status(), Status::Ok);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn success_resets_error_history() {
        let (guard, _store) = guard_with(config(2));
        guard.breaker().record_error(TOOL);

        let calls = AtomicU32::new(0);
        run(&guard, &control("ok-1"), 1.0, &calls).await;

        // one more error would have tripped without the reset
        assert!(!guard.breaker().record_error(TOOL));
        assert_eq!(guard.breaker().check(TOOL), None);
    }

    #[tokio::test]
    async fn concurrent_duplicate_is_rejected_while_in_flight() {
        let (guard, _store) = guard_with(config(10));
        let c = control("k1");
        let body = input(&c, 1.0);

        let ctx1 = start_context(TOOL);
        let permit = match guard.admit(&ctx1, &c, &body).await {
            Admission::Execute(p) => p,
            Admission::Respond(_) => panic!("first call should be admitted"),
        };
        assert_eq!(permit.idempotency_key(), "k1");

        let ctx2 = start_context(TOOL);
        match guard.admit(&ctx2, &c, &body).await {
            Admission::Respond(parts) => {
                let env = crate::envelope::build_envelope(&ctx2, parts);
                assert_eq!(env.error_code(), Some(ErrorCode::Conflict));
            }
            Admission::Execute(_) => panic!("duplicate should not be admitted"),
        }

        guard.complete(permit, &json!({"done": true})).await;

        let ctx3 = start_context(TOOL);
        match guard.admit(&ctx3, &c, &body).await {
            Admission::Respond(parts) => {
                let env = crate::envelope::build_envelope(&ctx3, parts);
                assert_eq!(env.status(), Status::Ok);
                assert_eq!(env.data(), &json!({"done": true}));
            }
            Admission::Execute(_) => panic!("completed key should replay"),
        }
    }

    #[tokio::test]
    async fn dropped_permit_releases_key() {
        let (guard, _store) = guard_with(config(10));
        let c = control("k1");
        let body = input(&c, 1.0);

        let ctx = start_context(TOOL);
        let permit = guard.admit(&ctx, &c, &body).await;
        drop(permit);

        let ctx = start_context(TOOL);
        assert!(matches!(
            guard.admit(&ctx, &c, &body).await,
            Admission::Execute(_)
        ));
    }

    struct UnavailableStore;

    #[async_trait]
    impl IdempotencyStore for UnavailableStore {
        async fn fetch(
            &self,
            _tool_name: &str,
            _idempotency_key: &str,
        ) -> Result<Option<IdempotencyRecord>, StoreError> {
            Err(StoreError::DbError(sqlx::Error::PoolTimedOut))
        }

        async fn upsert(&self, _record: NewIdempotencyRecord) -> Result<(), StoreError> {
            Err(StoreError::DbError(sqlx::Error::PoolTimedOut))
        }
    }

    #[tokio::test]
    async fn unavailable_store_fails_open_by_default() {
        let cfg = config(10);
        let guard = WriteGuard::new(
            &cfg,
            Arc::new(BreakerRegistry::new(cfg.breaker)),
            Arc::new(UnavailableStore),
        );
        let calls = AtomicU32::new(0);
        let env = run(&guard, &control("k1"), 1.0, &calls).await;
        assert_eq!(env.status(), Status::Ok);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(guard.breaker().check(TOOL), None);
    }

    #[tokio::test]
    async fn unavailable_store_rejects_when_fail_closed() {
        let mut cfg = config(10);
        cfg.idempotency_fail_mode = IdempotencyFailMode::Closed;
        let guard = WriteGuard::new(
            &cfg,
            Arc::new(BreakerRegistry::new(cfg.breaker)),
            Arc::new(UnavailableStore),
        );
        let calls = AtomicU32::new(0);
        let env = run(&guard, &control("k1"), 1.0, &calls).await;
        assert_eq!(env.status(), Status::Error);
        assert_eq!(env.error_code(), Some(ErrorCode::UpstreamError));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}

//! # Basic Exchange Scenarios
//!
//! 1. A response delivered well inside the budget completes the call
//! 2. A second request on the same key supersedes the first
//! 3. A response that never arrives times out and leaves nothing behind

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;
    use fx_exchange::{CorrelationKey, ExchangeConfig, ExchangeError};
    use tokio::time::Instant;

    use crate::integration::fixtures::{wait_for_registration, DeviceHarness};

    const SEND_TIMEOUT: Duration = Duration::from_millis(50);

    /// Key A answered after 10ms, 50ms budget: the caller gets the payload.
    #[tokio::test(start_paused = true)]
    async fn test_response_within_budget_returns_payload() {
        let harness = DeviceHarness::start(ExchangeConfig::default());

        let call = harness.spawn_exchange("A", SEND_TIMEOUT, Duration::from_millis(50));
        harness.answer_after("A", b"OK", Duration::from_millis(10));

        let result = call.await.unwrap();
        assert_eq!(result, Ok(Bytes::from_static(b"OK")));
        assert!(harness.registry().is_empty());

        harness.service.shutdown().await;
    }

    /// Two requests on key A: the first is superseded, the second gets the
    /// eventual payload.
    #[tokio::test(start_paused = true)]
    async fn test_second_request_supersedes_first() {
        let harness = DeviceHarness::start(ExchangeConfig::default());
        let registry = harness.registry();

        let first = harness.spawn_exchange("A", SEND_TIMEOUT, Duration::from_millis(50));
        let first_id = wait_for_registration(&registry, "A", None).await;

        let second = harness.spawn_exchange("A", SEND_TIMEOUT, Duration::from_millis(50));
        let second_id = wait_for_registration(&registry, "A", Some(first_id)).await;
        assert_ne!(first_id, second_id);

        harness.answer_after("A", b"fresh", Duration::from_millis(10));

        assert_eq!(
            first.await.unwrap(),
            Err(ExchangeError::Superseded {
                key: CorrelationKey::from("A")
            })
        );
        assert_eq!(second.await.unwrap(), Ok(Bytes::from_static(b"fresh")));
        assert!(registry.is_empty());

        let metrics = harness.service.metrics();
        assert_eq!(metrics.superseded, 1);
        assert_eq!(metrics.exchanges_completed, 1);

        harness.service.shutdown().await;
    }

    /// Key B with a 5ms budget and no answer: `ResponseTimeout` after ~5ms,
    /// and no residual entry for B.
    #[tokio::test(start_paused = true)]
    async fn test_missing_response_times_out_and_cleans_up() {
        let harness = DeviceHarness::start(ExchangeConfig::default());

        let started = Instant::now();
        let result = harness
            .spawn_exchange("B", SEND_TIMEOUT, Duration::from_millis(5))
            .await
            .unwrap();
        let elapsed = started.elapsed();

        assert_eq!(
            result,
            Err(ExchangeError::ResponseTimeout {
                key: CorrelationKey::from("B"),
                timeout: Duration::from_millis(5),
            })
        );
        assert!(elapsed >= Duration::from_millis(5));
        assert!(elapsed < Duration::from_millis(10));
        assert!(!harness.registry().contains(&CorrelationKey::from("B")));

        harness.service.shutdown().await;
    }

    /// A response arriving after the caller gave up is dropped silently.
    #[tokio::test(start_paused = true)]
    async fn test_late_response_is_dropped() {
        let harness = DeviceHarness::start(ExchangeConfig::default());

        let call = harness.spawn_exchange("C", SEND_TIMEOUT, Duration::from_millis(5));
        harness.answer_after("C", b"late", Duration::from_millis(20));

        assert!(matches!(
            call.await.unwrap(),
            Err(ExchangeError::ResponseTimeout { .. })
        ));

        tokio::time::sleep(Duration::from_millis(30)).await;
        let metrics = harness.service.metrics();
        assert_eq!(metrics.responses_unmatched, 1);
        assert_eq!(metrics.responses_delivered, 0);
        assert!(harness.registry().is_empty());

        harness.service.shutdown().await;
    }

    /// Different keys resolve independently, whatever order answers come in.
    #[tokio::test(start_paused = true)]
    async fn test_out_of_order_answers_across_keys() {
        let harness = DeviceHarness::start(ExchangeConfig::default());
        let budget = Duration::from_millis(100);

        let a = harness.spawn_exchange("A", SEND_TIMEOUT, budget);
        let b = harness.spawn_exchange("B", SEND_TIMEOUT, budget);
        let c = harness.spawn_exchange("C", SEND_TIMEOUT, budget);

        harness.answer_after("C", b"c", Duration::from_millis(5));
        harness.answer_after("A", b"a", Duration::from_millis(15));
        harness.answer_after("B", b"b", Duration::from_millis(25));

        assert_eq!(a.await.unwrap(), Ok(Bytes::from_static(b"a")));
        assert_eq!(b.await.unwrap(), Ok(Bytes::from_static(b"b")));
        assert_eq!(c.await.unwrap(), Ok(Bytes::from_static(b"c")));
        assert!(harness.registry().is_empty());

        harness.service.shutdown().await;
    }

    /// Garbage on the inbound stream does not disturb waiting callers.
    #[tokio::test(start_paused = true)]
    async fn test_unclassifiable_inbound_frames_are_ignored() {
        let harness = DeviceHarness::start(ExchangeConfig::default());

        let call = harness.spawn_exchange("A", SEND_TIMEOUT, Duration::from_millis(50));
        harness.inject_raw(b"no delimiter here");
        harness.inject_raw(b"|missing-key");
        harness.answer_after("A", b"OK", Duration::from_millis(10));

        assert_eq!(call.await.unwrap(), Ok(Bytes::from_static(b"OK")));
        harness.service.shutdown().await;
    }

    /// `exchange_default` uses the configured budgets.
    #[tokio::test(start_paused = true)]
    async fn test_configured_timeouts_apply() {
        let harness = DeviceHarness::start(ExchangeConfig {
            send_timeout_ms: 20,
            response_timeout_ms: 15,
            ..ExchangeConfig::default()
        });

        let coordinator = harness.service.coordinator();
        let result = coordinator
            .exchange_default(harness.frame("Z", b"ping"), CorrelationKey::from("Z"))
            .await;

        assert_eq!(
            result,
            Err(ExchangeError::ResponseTimeout {
                key: CorrelationKey::from("Z"),
                timeout: Duration::from_millis(15),
            })
        );
        harness.service.shutdown().await;
    }
}

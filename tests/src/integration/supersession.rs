//! # Same-Key Races and Cancellation
//!
//! Only the newest request on a key may ever succeed, and a caller that
//! walks away leaves no registry entry behind.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;
    use fx_exchange::{CorrelationKey, ExchangeConfig, ExchangeError};

    use crate::integration::fixtures::{wait_for_registration, DeviceHarness};

    const LONG: Duration = Duration::from_secs(1);

    fn superseded(key: &str) -> Result<Bytes, ExchangeError> {
        Err(ExchangeError::Superseded {
            key: CorrelationKey::from(key),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_supersession_chain_only_newest_succeeds() {
        let harness = DeviceHarness::start(ExchangeConfig::default());
        let registry = harness.registry();

        let mut calls = Vec::new();
        let mut previous = None;
        for _ in 0..4 {
            calls.push(harness.spawn_exchange("K", LONG, LONG));
            previous = Some(wait_for_registration(&registry, "K", previous).await);
        }

        harness.answer_after("K", b"final", Duration::from_millis(10));

        let newest = calls.pop().unwrap();
        for older in calls {
            assert_eq!(older.await.unwrap(), superseded("K"));
        }
        assert_eq!(newest.await.unwrap(), Ok(Bytes::from_static(b"final")));
        assert!(registry.is_empty());
        assert_eq!(harness.service.metrics().superseded, 3);

        harness.service.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_cleanup_keeps_newer_entry() {
        let harness = DeviceHarness::start(ExchangeConfig::default());
        let registry = harness.registry();
        let key = CorrelationKey::from("K");

        let first = harness.spawn_exchange("K", LONG, LONG);
        let first_id = wait_for_registration(&registry, "K", None).await;
        let second = harness.spawn_exchange("K", LONG, LONG);
        let second_id = wait_for_registration(&registry, "K", Some(first_id)).await;

        assert_eq!(first.await.unwrap(), superseded("K"));
        // The superseded call finished; the newer entry is untouched
        assert_eq!(registry.current(&key), Some(second_id));

        harness.answer_after("K", b"ok", Duration::from_millis(1));
        assert_eq!(second.await.unwrap(), Ok(Bytes::from_static(b"ok")));
        assert!(registry.is_empty());

        harness.service.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_aborted_caller_leaves_no_entry() {
        let harness = DeviceHarness::start(ExchangeConfig::default());
        let registry = harness.registry();

        let call = harness.spawn_exchange("A", LONG, LONG);
        wait_for_registration(&registry, "A", None).await;

        call.abort();
        assert!(call.await.unwrap_err().is_cancelled());
        assert!(registry.is_empty());
        assert_eq!(harness.service.metrics().abandoned, 1);

        // The device answers anyway; nobody is listening
        harness.answer_after("A", b"orphan", Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(harness.service.metrics().responses_unmatched, 1);

        harness.service.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_outer_timeout_cancels_exchange() {
        let harness = DeviceHarness::start(ExchangeConfig::default());
        let coordinator = harness.service.coordinator();

        let outer = tokio::time::timeout(
            Duration::from_millis(5),
            coordinator.exchange(harness.frame("A", b"x"), CorrelationKey::from("A"), LONG, LONG),
        )
        .await;

        assert!(outer.is_err());
        assert!(harness.registry().is_empty());
        let metrics = harness.service.metrics();
        assert_eq!(metrics.abandoned, 1);
        assert_eq!(metrics.exchanges_finished(), 1);

        harness.service.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_aborting_old_caller_does_not_disturb_new_one() {
        let harness = DeviceHarness::start(ExchangeConfig::default());
        let registry = harness.registry();
        let key = CorrelationKey::from("K");

        let old = harness.spawn_exchange("K", LONG, LONG);
        let old_id = wait_for_registration(&registry, "K", None).await;
        let new = harness.spawn_exchange("K", LONG, LONG);
        let new_id = wait_for_registration(&registry, "K", Some(old_id)).await;

        old.abort();
        let _ = old.await;
        assert_eq!(registry.current(&key), Some(new_id));

        harness.answer_after("K", b"ok", Duration::from_millis(1));
        assert_eq!(new.await.unwrap(), Ok(Bytes::from_static(b"ok")));

        harness.service.shutdown().await;
    }

    /// A response and a superseding request racing on real threads: the
    /// payload reaches at most one caller and the older caller never sees a
    /// payload meant for the newer one after being superseded.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_response_races_supersession() {
        let harness = DeviceHarness::start(ExchangeConfig::default());
        let registry = harness.registry();
        let router = harness.service.router();
        let key = CorrelationKey::from("R");

        for _ in 0..50 {
            let older = harness.spawn_exchange("R", LONG, LONG);
            let older_id = wait_for_registration(&registry, "R", None).await;

            let race_router = router.clone();
            let race_key = key.clone();
            let racer = tokio::spawn(async move {
                race_router.deliver(&race_key, Bytes::from_static(b"first"))
            });
            let newer = harness.spawn_exchange("R", LONG, LONG);
            wait_for_registration(&registry, "R", Some(older_id)).await;
            let first_delivery = racer.await.unwrap();

            router.deliver(&key, Bytes::from_static(b"second"));

            let older = older.await.unwrap();
            let newer = newer.await.unwrap();

            match older {
                Ok(payload) => {
                    assert_eq!(payload, Bytes::from_static(b"first"));
                    assert_eq!(newer, Ok(Bytes::from_static(b"second")));
                }
                Err(ExchangeError::Superseded { .. }) => {
                    let payload = newer.unwrap();
                    if first_delivery.is_delivered() {
                        assert_eq!(payload, Bytes::from_static(b"first"));
                    } else {
                        assert_eq!(payload, Bytes::from_static(b"second"));
                    }
                }
                Err(e) => panic!("unexpected outcome for older caller: {e}"),
            }
            assert!(registry.is_empty());
        }

        harness.service.shutdown().await;
    }
}

//! # Stress Runs
//!
//! Many senders on few keys with answers racing timeouts, supersession and
//! caller cancellation. Whatever the interleaving, every call ends exactly
//! once and the registry drains to empty.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;
    use fx_exchange::{CorrelationKey, ExchangeConfig};
    use fx_stress::{run_stress, StressConfig};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use crate::integration::fixtures::DeviceHarness;

    #[tokio::test(start_paused = true)]
    async fn test_stress_default_shape_is_clean() {
        let report = run_stress(&StressConfig {
            seed: Some(1),
            ..StressConfig::default()
        })
        .await
        .unwrap();

        assert!(report.is_clean(), "{report:?}");
        assert_eq!(report.metrics.exchanges_started, 40);
        assert_eq!(report.metrics.exchanges_finished(), 40);
        // With a 10ms frame gap and 50ms budget most senders miss the send stage
        assert!(report.send_timeouts > 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_stress_real_time_with_jitter() {
        for seed in 0..5 {
            let report = run_stress(&StressConfig {
                senders: 120,
                keys: 4,
                jitter: Duration::from_millis(15),
                frame_gap: Duration::from_millis(1),
                timeout: Duration::from_millis(80),
                seed: Some(seed),
                ..StressConfig::default()
            })
            .await
            .unwrap();

            assert!(report.is_clean(), "seed {seed}: {report:?}");
            assert_eq!(report.metrics.exchanges_finished(), 120);
        }
    }

    /// Random aborts mixed into the race: abandoned calls are counted and
    /// still leave nothing behind.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_random_cancellation_leaves_registry_empty() {
        let harness = DeviceHarness::start(ExchangeConfig {
            frame_gap_ms: 1,
            ..ExchangeConfig::default()
        });
        let router = harness.service.router();
        let mut rng = StdRng::seed_from_u64(42);

        let mut calls = Vec::new();
        for i in 0..200 {
            let key = format!("c{}", i % 5);
            let timeout = Duration::from_millis(rng.gen_range(5..60));
            let call = harness.spawn_exchange(&key, timeout, timeout);

            let answer_delay = Duration::from_millis(rng.gen_range(0..40));
            let router = router.clone();
            let answer_key = CorrelationKey::from(key.as_str());
            tokio::spawn(async move {
                tokio::time::sleep(answer_delay).await;
                router.deliver(&answer_key, Bytes::from_static(b"OK"));
            });

            if rng.gen_bool(0.2) {
                let abort_after = Duration::from_millis(rng.gen_range(0..20));
                let handle = call.abort_handle();
                tokio::spawn(async move {
                    tokio::time::sleep(abort_after).await;
                    handle.abort();
                });
            }
            calls.push(call);
        }

        let mut finished = 0;
        let mut cancelled = 0;
        for call in calls {
            match call.await {
                Ok(_) => finished += 1,
                Err(e) if e.is_cancelled() => cancelled += 1,
                Err(e) => panic!("exchange task panicked: {e}"),
            }
        }

        assert_eq!(finished + cancelled, 200);
        assert!(harness.registry().is_empty());

        let metrics = harness.service.metrics();
        assert_eq!(metrics.exchanges_finished(), metrics.exchanges_started);
        assert_eq!(metrics.abandoned as usize, cancelled);

        harness.service.shutdown().await;
    }
}

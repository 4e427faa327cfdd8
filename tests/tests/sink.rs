mod utils;
#[allow(unused)]
use utils::*;

mod tests {
    use super::*;

    use barrage::mock::{MockGun, MockGunConfig, MockInstance, MockInstanceConfig};
    use barrage::prelude::*;
    use barrage_core::{MockSink, SinkError, StopFuture};
    use serde_json::json;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use time::OffsetDateTime;

    fn mock_gun(call_sleep: Duration) -> MockGun {
        MockGun::new(MockGunConfig {
            call_sleep,
            ..Default::default()
        })
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ntest::timeout(5000)]
    async fn mock_sink_sees_every_response() {
        init();

        let sink = Arc::new(MockSink::new());
        let generator = Generator::new(
            GeneratorConfig::new(Schedule::rps(1))
                .test_name("mock_sink_sees_every_response")
                .duration(Duration::from_millis(1500))
                .stats_poll_interval(Duration::from_millis(500))
                .sink(sink.clone())
                .gun(mock_gun(Duration::from_millis(50))),
        )
        .unwrap();
        generator.run().unwrap();
        generator.wait().await;

        let responses = sink.responses().unwrap();
        assert_eq!(responses.len(), 2);
        assert!(responses.iter().all(|r| r.is_ok()
            && r.started_at.is_none()
            && r.finished_at.is_none()
            && r.duration >= Duration::from_millis(50)));

        let stats = sink.stats().unwrap();
        assert!(stats.len() >= 2);
        assert_eq!(stats.last().unwrap().success, 2);
        assert!(sink.is_stopped());
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ntest::timeout(5000)]
    async fn sink_payloads_match_collected_data() {
        init();

        let calls = Arc::new(AtomicU64::new(0));
        let gun = {
            let calls = calls.clone();
            move |_: &Generator| {
                let n = calls.fetch_add(1, Ordering::Relaxed);
                async move {
                    match n % 3 {
                        0 => CallResult::ok(()),
                        1 => CallResult::ok(json!({ "n": n, "tags": ["a", null] })),
                        _ => CallResult::ok(n),
                    }
                }
            }
        };

        let sink = Arc::new(MockSink::new());
        let generator = Generator::new(
            GeneratorConfig::new(Schedule::rps(10))
                .duration(Duration::from_millis(650))
                .sink(sink.clone())
                .gun(gun),
        )
        .unwrap();
        generator.run().unwrap();
        let (data, _) = generator.wait().await;

        let sent: Vec<_> = sink
            .responses()
            .unwrap()
            .into_iter()
            .map(|r| r.data)
            .collect();
        assert!(sent.len() >= 6, "{sent:?}");
        assert!(sent.iter().any(|d| d.is_null()));
        assert_eq!(sent, data.ok_data());
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ntest::timeout(5000)]
    async fn instance_results_reach_the_sink() {
        init();

        let sink = Arc::new(MockSink::new());
        let generator = Generator::new(
            GeneratorConfig::new(Schedule::instances(2))
                .duration(Duration::from_millis(500))
                .sink(sink.clone())
                .instance(MockInstance::new(MockInstanceConfig {
                    call_sleep: Duration::from_millis(20),
                    ..Default::default()
                })),
        )
        .unwrap();
        generator.run().unwrap();
        let (data, _) = generator.wait().await;

        assert!(data.ok_len() > 10);
        assert_eq!(sink.responses().unwrap().len(), data.ok_len());
    }

    /// Accepts entries slowly enough for the queue to overflow.
    #[derive(Default)]
    struct SlowSink {
        inner: MockSink,
    }

    impl Sink for SlowSink {
        fn handle(
            &self,
            labels: &Labels,
            ts: OffsetDateTime,
            line: String,
        ) -> Result<(), SinkError> {
            std::thread::sleep(Duration::from_millis(20));
            self.inner.handle(labels, ts, line)
        }

        fn stop(&self) -> StopFuture<'_> {
            self.inner.stop()
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ntest::timeout(10000)]
    async fn overflowing_sink_drops_newest() {
        init();

        let sink = Arc::new(SlowSink::default());
        let generator = Generator::new(
            GeneratorConfig::new(Schedule::rps(200))
                .duration(Duration::from_millis(300))
                .sink_queue_capacity(2)
                .sink(sink.clone())
                .gun(mock_gun(Duration::from_millis(1))),
        )
        .unwrap();
        generator.run().unwrap();
        generator.wait().await;

        let stats = generator.stats().snapshot();
        assert!(stats.sink_dropped > 0);
        let delivered = sink.inner.responses().unwrap().len() as u64;
        assert_eq!(delivered + stats.sink_dropped, stats.total());
    }

    #[cfg(feature = "integration")]
    #[tokio::test(flavor = "multi_thread")]
    #[ntest::timeout(10000)]
    async fn loki_receives_responses_and_stats() {
        use barrage_loki::{LokiClient, LokiConfig};

        let addr = init();
        let tenant = "loki_receives_responses_and_stats";

        let loki = LokiClient::new(
            LokiConfig::new(format!("http://{addr}"))
                .tenant_id(tenant)
                .token("test-token")
                .batch_wait(Duration::from_millis(100)),
        )
        .unwrap();
        let generator = Generator::new(
            GeneratorConfig::new(Schedule::rps(10))
                .name("loki")
                .label("branch", "main")
                .duration(Duration::from_secs(1))
                .stats_poll_interval(Duration::from_millis(300))
                .sink(Arc::new(loki))
                .gun(mock_gun(Duration::from_millis(5))),
        )
        .unwrap();
        generator.run().unwrap();
        generator.wait().await;

        let pushes: Vec<_> = mock_service::loki_pushes()
            .into_iter()
            .filter(|p| p.tenant.as_deref() == Some(tenant))
            .collect();
        assert!(!pushes.is_empty());
        assert!(pushes
            .iter()
            .all(|p| p.authorization.as_deref() == Some("Bearer test-token")));

        let count = |data_type: &str| -> usize {
            pushes
                .iter()
                .flat_map(|p| &p.body.streams)
                .filter(|s| s.stream["test_data_type"] == data_type)
                .inspect(|s| {
                    assert_eq!(s.stream["gen_name"], "loki");
                    assert_eq!(s.stream["branch"], "main");
                })
                .map(|s| s.values.len())
                .sum()
        };
        assert_eq!(
            count("responses") as u64,
            generator.stats().snapshot().success
        );
        assert!(count("stats") >= 2);
    }
}

mod utils;
#[allow(unused)]
use utils::*;

mod tests {
    use super::*;

    use barrage::mock::{MockGun, MockGunConfig};
    use barrage::prelude::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn mock_gun(call_sleep: Duration) -> MockGun {
        MockGun::new(MockGunConfig {
            call_sleep,
            ..Default::default()
        })
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ntest::timeout(5000)]
    async fn holds_1000_rps() {
        init();

        let generator = Generator::new(
            GeneratorConfig::new(Schedule::rps(1000))
                .duration(Duration::from_secs(1))
                .gun(mock_gun(Duration::from_millis(50))),
        )
        .unwrap();
        generator.run().unwrap();
        let (data, failed) = generator.wait().await;

        assert!(!failed);
        let stats = generator.stats().snapshot();
        assert_eq!(stats.current_rps, 1000);
        assert!(
            (990..=1010).contains(&stats.success),
            "success: {}",
            stats.success
        );
        assert_eq!(data.ok_len() as u64, stats.success);
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ntest::timeout(5000)]
    async fn slow_calls_do_not_block_dispatch() {
        init();

        let generator = Generator::new(
            GeneratorConfig::new(Schedule::rps(10))
                .duration(Duration::from_secs(1))
                .gun(mock_gun(Duration::from_secs(1))),
        )
        .unwrap();
        let start = Instant::now();
        generator.run().unwrap();
        let (_, failed) = generator.wait().await;
        let elapsed = start.elapsed();

        assert!(!failed);
        let success = generator.stats().snapshot().success;
        assert!((9..=11).contains(&success), "success: {success}");
        assert!(elapsed < Duration::from_millis(2500), "{elapsed:?}");
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ntest::timeout(5000)]
    async fn calls_drain_past_the_deadline() {
        init();

        let generator = Generator::new(
            GeneratorConfig::new(Schedule::rps(1))
                .duration(Duration::from_millis(40))
                .gun(mock_gun(Duration::from_millis(50))),
        )
        .unwrap();
        let start = Instant::now();
        generator.run().unwrap();
        let (data, failed) = generator.wait().await;

        assert!(!failed);
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert_eq!(generator.stats().snapshot().success, 1);
        assert!(data.ok_responses()[0].duration >= Duration::from_millis(50));
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ntest::timeout(5000)]
    async fn results_are_partitioned() {
        init();

        let calls = Arc::new(AtomicU64::new(0));
        let gun = {
            let calls = calls.clone();
            move |_: &Generator| {
                let n = calls.fetch_add(1, Ordering::Relaxed);
                async move {
                    match n % 5 {
                        0 => {
                            tokio::time::sleep(Duration::from_millis(200)).await;
                            CallResult::ok("slow")
                        }
                        1 => CallResult::error("boom"),
                        _ => CallResult::ok(n),
                    }
                }
            }
        };

        let generator = Generator::new(
            GeneratorConfig::new(Schedule::rps(100))
                .duration(Duration::from_millis(500))
                .call_timeout(Duration::from_millis(50))
                .gun(gun),
        )
        .unwrap();
        generator.run().unwrap();
        let (data, failed) = generator.wait().await;

        assert!(failed);
        let stats = generator.stats().snapshot();
        assert!(stats.success > 0);
        assert!(stats.failed > 0);
        assert!(stats.call_timeout > 0);
        assert_eq!(stats.total(), calls.load(Ordering::Relaxed));
        assert_eq!(data.ok_len() as u64, stats.success);
        assert_eq!(data.fail_len() as u64, stats.failed + stats.call_timeout);
        assert_eq!(
            generator.errors().len() as u64,
            stats.failed + stats.call_timeout
        );
        assert_eq!(
            data.fail_responses().iter().filter(|r| r.timeout).count() as u64,
            stats.call_timeout
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ntest::timeout(5000)]
    async fn stop_before_deadline() {
        init();

        let generator = Generator::new(
            GeneratorConfig::new(Schedule::rps(50))
                .duration(Duration::from_secs(30))
                .gun(mock_gun(Duration::from_millis(10))),
        )
        .unwrap();
        generator.run().unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        let start = Instant::now();
        let (_, failed) = generator.stop().await;
        assert!(!failed);
        assert!(start.elapsed() < Duration::from_millis(500));

        let stats = generator.stats().snapshot();
        assert!(stats.run_stopped);
        assert!(stats.success >= 10);
    }

    #[cfg(feature = "integration")]
    #[tokio::test(flavor = "multi_thread")]
    #[ntest::timeout(10000)]
    async fn http_gun_against_mock_service() {
        let addr = init();

        let http_gun = |path: String| {
            let client = reqwest::Client::new();
            let url = format!("http://{addr}{path}");
            move |_: &Generator| {
                let client = client.clone();
                let url = url.clone();
                async move {
                    match client.get(&url).send().await.and_then(|r| r.error_for_status()) {
                        Ok(res) => CallResult::ok(res.status().as_u16()),
                        Err(err) => CallResult::error(err.to_string()),
                    }
                }
            }
        };

        let ok = Generator::new(
            GeneratorConfig::new(Schedule::rps(50))
                .name("delay")
                .duration(Duration::from_secs(1))
                .gun(http_gun("/delay/ms/5".to_string())),
        );
        let failing = Generator::new(
            GeneratorConfig::new(Schedule::rps(20))
                .name("fail")
                .duration(Duration::from_secs(1))
                .gun(http_gun("/fail/delay/ms/5".to_string())),
        );
        let profile = Profile::new().add(ok).add(failing);
        profile.run(true).await.unwrap();

        let ok = &profile.generators()[0];
        let stats = ok.stats().snapshot();
        assert!(!stats.run_failed);
        assert!(stats.success >= 45);
        assert!(ok
            .data()
            .ok_data()
            .iter()
            .all(|d| d == &serde_json::json!(200)));

        let failing = &profile.generators()[1];
        let stats = failing.stats().snapshot();
        assert!(stats.run_failed);
        assert_eq!(stats.success, 0);
        assert!(stats.failed >= 18);
        assert!(failing.errors()[0].contains("500"));
    }
}

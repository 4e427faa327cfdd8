mod utils;
#[allow(unused)]
use utils::*;

mod tests {
    use super::*;

    use barrage::mock::{MockGun, MockGunConfig, MockInstance, MockInstanceConfig};
    use barrage::prelude::*;
    use std::time::Duration;

    fn mock_instance(call_sleep: Duration, fail_ratio: u8) -> MockInstance {
        MockInstance::new(MockInstanceConfig {
            call_sleep,
            fail_ratio,
        })
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ntest::timeout(15000)]
    async fn escalates_to_ten_instances() {
        init();

        let generator = Generator::new(
            GeneratorConfig::new(Schedule::instances(1).escalate(1, Duration::from_secs(1), 10))
                .duration(Duration::from_secs(10))
                .instance(mock_instance(Duration::from_millis(50), 0)),
        )
        .unwrap();
        generator.run().unwrap();
        let (data, failed) = generator.wait().await;

        assert!(!failed);
        let stats = generator.stats().snapshot();
        assert_eq!(stats.current_instances, 10);
        assert!(data.ok_len() > 500, "ok: {}", data.ok_len());
        assert_eq!(data.ok_len() as u64, stats.success);
        assert!(data
            .ok_responses()
            .iter()
            .all(|r| r.duration >= Duration::from_millis(50) && r.finished_at.is_some()));
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ntest::timeout(5000)]
    async fn instance_failures_are_accounted() {
        init();

        let generator = Generator::new(
            GeneratorConfig::new(Schedule::instances(2))
                .duration(Duration::from_millis(500))
                .instance(mock_instance(Duration::from_millis(10), 50)),
        )
        .unwrap();
        generator.run().unwrap();
        let (data, failed) = generator.wait().await;

        assert!(failed);
        let stats = generator.stats().snapshot();
        assert!(stats.failed > 0);
        assert!(stats.success > 0);
        assert_eq!(stats.call_timeout, 0);
        assert_eq!(data.fail_len() as u64, stats.failed);
        assert_eq!(generator.errors().len() as u64, stats.failed);
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ntest::timeout(5000)]
    async fn paused_instances_produce_nothing() {
        init();

        let generator = Generator::new(
            GeneratorConfig::new(Schedule::instances(3))
                .instance(mock_instance(Duration::from_millis(10), 0)),
        )
        .unwrap();
        generator.run().unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        generator.pause();
        tokio::time::sleep(Duration::from_millis(50)).await;
        let paused_at = generator.stats().snapshot().total();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(generator.stats().snapshot().total(), paused_at);

        generator.resume();
        tokio::time::sleep(Duration::from_millis(200)).await;
        generator.stop().await;
        assert!(generator.stats().snapshot().total() > paused_at);
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ntest::timeout(5000)]
    async fn profile_mixes_load_models() {
        init();

        let rps = Generator::new(
            GeneratorConfig::new(Schedule::rps(20))
                .name("rps")
                .duration(Duration::from_millis(500))
                .gun(MockGun::new(MockGunConfig {
                    call_sleep: Duration::from_millis(10),
                    ..Default::default()
                })),
        );
        let instances = Generator::new(
            GeneratorConfig::new(Schedule::instances(2))
                .name("instances")
                .duration(Duration::from_millis(500))
                .instance(mock_instance(Duration::from_millis(20), 0)),
        );
        let profile = Profile::new().add(rps).add(instances);
        profile.run(true).await.unwrap();

        for generator in profile.generators() {
            let stats = generator.stats().snapshot();
            assert!(stats.success >= 5, "{}: {stats:?}", generator.name());
            assert!(!stats.run_failed);
        }
        assert_eq!(profile.generators()[1].stats().snapshot().current_instances, 2);
    }
}

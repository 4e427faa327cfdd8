use crate::{Generator, GeneratorError};
use tokio::task::JoinSet;
#[allow(unused)]
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

/// A group of generators run side by side.
///
/// Generators are added with the result of [`Generator::new`] so construction errors can be
/// collected while the profile is built and reported once on [`Profile::run`].
///
/// # Example
/// ```no_run
/// use barrage::prelude::*;
/// use barrage::mock::{MockGun, MockGunConfig};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<(), GeneratorError> {
///     let gun = |rps| {
///         Generator::new(
///             GeneratorConfig::new(Schedule::rps(rps))
///                 .duration(Duration::from_secs(5))
///                 .gun(MockGun::new(MockGunConfig::default())),
///         )
///     };
///     Profile::new().add(gun(10)).add(gun(20)).run(true).await?;
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Profile {
    id: String,
    generators: Vec<Generator>,
    bootstrap_error: Option<GeneratorError>,
}

impl Default for Profile {
    fn default() -> Self {
        Self::new()
    }
}

impl Profile {
    pub fn new() -> Self {
        let mut id = Uuid::new_v4().simple().to_string();
        id.truncate(8);
        Self {
            id,
            generators: vec![],
            bootstrap_error: None,
        }
    }

    pub fn add(mut self, generator: Result<Generator, GeneratorError>) -> Self {
        match generator {
            Ok(generator) => self.generators.push(generator),
            Err(err) => {
                error!(profile = %self.id, "Failed to create generator: {err}");
                self.bootstrap_error.get_or_insert(err);
            }
        }
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn generators(&self) -> &[Generator] {
        &self.generators
    }

    /// Starts every generator, and waits for all of them when `wait` is set.
    pub async fn run(&self, wait: bool) -> Result<(), GeneratorError> {
        if let Some(err) = &self.bootstrap_error {
            return Err(err.clone());
        }
        info!(profile = %self.id, generators = self.generators.len(), "Starting profile");
        for generator in &self.generators {
            generator.run()?;
        }
        if wait {
            self.wait().await;
        }
        Ok(())
    }

    pub async fn wait(&self) {
        let mut set = JoinSet::new();
        for generator in &self.generators {
            let generator = generator.clone();
            set.spawn(async move { generator.wait().await }.in_current_span());
        }
        while let Some(res) = set.join_next().await {
            if let Err(err) = res {
                error!(profile = %self.id, "Generator wait failed: {err}");
            }
        }
        info!(profile = %self.id, "Profile finished");
    }

    pub fn pause(&self) {
        for generator in &self.generators {
            generator.pause();
        }
    }

    pub fn resume(&self) {
        for generator in &self.generators {
            generator.resume();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockGun, MockGunConfig};
    use crate::GeneratorConfig;
    use barrage_core::Schedule;
    use std::time::Duration;

    fn generator(rps: i64) -> Result<Generator, GeneratorError> {
        Generator::new(
            GeneratorConfig::new(Schedule::rps(rps))
                .duration(Duration::from_millis(300))
                .gun(MockGun::new(MockGunConfig {
                    call_sleep: Duration::from_millis(10),
                    ..Default::default()
                })),
        )
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ntest::timeout(3000)]
    async fn runs_all_generators() {
        let profile = Profile::new().add(generator(10)).add(generator(20));
        assert_eq!(profile.id().len(), 8);
        profile.run(true).await.unwrap();
        for generator in profile.generators() {
            let stats = generator.stats().snapshot();
            assert!(stats.success >= 1);
            assert!(!stats.run_failed);
        }
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn bootstrap_error_is_reported() {
        let profile = Profile::new().add(generator(10)).add(generator(0));
        assert_eq!(profile.generators().len(), 1);
        assert!(matches!(
            profile.run(false).await,
            Err(GeneratorError::Schedule(_))
        ));
        assert!(!profile.generators()[0].stats().snapshot().run_stopped);
        assert!(logs_contain("Failed to create generator"));
    }
}

//! Cache garbage collection (edge mode only).
//!
//! Sweeps run on a jittered schedule: each wait is a random duration
//! between the configured frequency and three times it, so a fleet of edge
//! nodes does not sweep in lockstep. A sweep only runs while a remote
//! endpoint config is available; with the whole cloud unreachable, cached
//! entries are the only data the node has left and must not be collected.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::cache::CacheManager;
use crate::client::RestConfigManager;
use crate::config::GcConfig;
use crate::lifecycle::shutdown::Shutdown;

#[derive(Debug, Error)]
pub enum GcError {
    #[error("gc frequency must be at least one minute")]
    ZeroFrequency,
}

/// Background sweeper for expired cache entries.
pub struct GcManager {
    cache: Arc<CacheManager>,
    rest_config: Arc<RestConfigManager>,
    frequency: Duration,
    max_age: Duration,
}

impl std::fmt::Debug for GcManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcManager")
            .field("frequency", &self.frequency)
            .field("max_age", &self.max_age)
            .finish_non_exhaustive()
    }
}

impl GcManager {
    pub fn new(
        config: &GcConfig,
        cache: Arc<CacheManager>,
        rest_config: Arc<RestConfigManager>,
    ) -> Result<Self, GcError> {
        if config.frequency_mins == 0 {
            return Err(GcError::ZeroFrequency);
        }
        Ok(Self {
            cache,
            rest_config,
            frequency: Duration::from_secs(config.frequency_mins * 60),
            max_age: Duration::from_secs(config.max_age_mins * 60),
        })
    }

    /// Start sweeping in the background. Fire-and-forget; the loop exits on
    /// shutdown.
    pub fn run(self, shutdown: &Shutdown) {
        let base_mins = self.frequency.as_secs() / 60;
        tracing::info!(
            min_interval_mins = base_mins,
            max_interval_mins = 3 * base_mins,
            "gc manager starting, sweeps run at a random interval in this range"
        );
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            loop {
                let wait = self.jittered_interval();
                tokio::select! {
                    _ = tokio::time::sleep(wait) => self.sweep().await,
                    _ = shutdown.triggered() => {
                        tracing::info!("gc manager exiting");
                        break;
                    }
                }
            }
        });
    }

    fn jittered_interval(&self) -> Duration {
        let base = self.frequency.as_secs();
        Duration::from_secs(fastrand::u64(base..=3 * base))
    }

    pub(crate) async fn sweep(&self) {
        if self.rest_config.current_config().is_none() {
            tracing::debug!("skipping gc sweep, no remote endpoint available");
            return;
        }
        let stale = self.cache.keys_older_than(self.max_age);
        if stale.is_empty() {
            return;
        }
        let mut removed = 0usize;
        for key in stale {
            if self.cache.remove(&key).await {
                removed += 1;
            }
        }
        tracing::info!(removed, remaining = self.cache.len(), "gc sweep finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheManager;
    use crate::config::CacheConfig;
    use crate::health::FakeChecker;
    use crate::transport::test_support::test_transport;
    use url::Url;

    fn rest_config(healthy: bool) -> Arc<RestConfigManager> {
        let transport = test_transport();
        Arc::new(
            RestConfigManager::new(
                &transport,
                Arc::new(FakeChecker::new(healthy)),
                vec![Url::parse("http://10.0.0.1:6443").unwrap()],
                2,
            )
            .unwrap(),
        )
    }

    fn cache_in(dir: &std::path::Path) -> Arc<CacheManager> {
        Arc::new(
            CacheManager::open(&CacheConfig {
                root_dir: dir.join("cache"),
                max_entry_bytes: 1024,
            })
            .unwrap(),
        )
    }

    #[test]
    fn test_zero_frequency_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = GcConfig {
            frequency_mins: 0,
            max_age_mins: 1,
        };
        let err = GcManager::new(&config, cache_in(dir.path()), rest_config(true)).unwrap_err();
        assert!(matches!(err, GcError::ZeroFrequency));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let dir = tempfile::tempdir().unwrap();
        let config = GcConfig {
            frequency_mins: 2,
            max_age_mins: 1,
        };
        let gc = GcManager::new(&config, cache_in(dir.path()), rest_config(true)).unwrap();
        for _ in 0..32 {
            let interval = gc.jittered_interval();
            assert!(interval >= Duration::from_secs(120));
            assert!(interval <= Duration::from_secs(360));
        }
    }

    #[tokio::test]
    async fn test_sweep_removes_expired_entries() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path());
        cache.store("/api/v1/pods", b"x").await.unwrap();

        let config = GcConfig {
            frequency_mins: 1,
            max_age_mins: 0,
        };
        let gc = GcManager::new(&config, cache.clone(), rest_config(true)).unwrap();
        gc.sweep().await;
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_sweep_skipped_without_remote_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path());
        cache.store("/api/v1/pods", b"x").await.unwrap();

        let config = GcConfig {
            frequency_mins: 1,
            max_age_mins: 0,
        };
        let gc = GcManager::new(&config, cache.clone(), rest_config(false)).unwrap();
        gc.sweep().await;
        assert_eq!(cache.len(), 1, "offline node must keep its cache");
    }
}

//! Tenant/service-account resolution.
//!
//! The hub injects a tenant service-account token into proxied requests
//! that carry no credentials of their own. The token lives in a file that
//! is rotated externally; an informer keeps the in-memory copy fresh.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;

use crate::config::TenantConfig;
use crate::informers::SharedInformerFactory;
use crate::lifecycle::shutdown::Shutdown;

const TOKEN_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Resolves the tenant namespace and service-account token.
pub struct TenantManager {
    namespace: String,
    token: ArcSwapOption<String>,
}

impl TenantManager {
    /// Build the resolver and register its token informer.
    pub fn new(
        config: &TenantConfig,
        informers: &SharedInformerFactory,
        shutdown: &Shutdown,
    ) -> Arc<Self> {
        let manager = Arc::new(Self {
            namespace: config.namespace.clone(),
            token: ArcSwapOption::empty(),
        });

        match &config.token_file {
            Some(path) => {
                let watcher = manager.clone();
                let path = path.clone();
                let shutdown = shutdown.clone();
                informers.register("tenant-token", async move {
                    watcher.watch_token(path, shutdown).await;
                });
            }
            None if !config.namespace.is_empty() => {
                tracing::info!(
                    namespace = %config.namespace,
                    "tenant namespace set but no token file, requests pass through unmodified"
                );
            }
            None => {}
        }

        manager
    }

    async fn watch_token(&self, path: PathBuf, shutdown: Shutdown) {
        let mut ticker = tokio::time::interval(TOKEN_REFRESH_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => self.refresh_from(&path).await,
                _ = shutdown.triggered() => break,
            }
        }
    }

    async fn refresh_from(&self, path: &Path) {
        match tokio::fs::read_to_string(path).await {
            Ok(raw) => {
                let token = raw.trim();
                if token.is_empty() {
                    return;
                }
                let changed = self
                    .token
                    .load()
                    .as_deref()
                    .map(|current| current.as_str() != token)
                    .unwrap_or(true);
                if changed {
                    self.token.store(Some(Arc::new(token.to_string())));
                    tracing::info!(namespace = %self.namespace, "tenant token refreshed");
                }
            }
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "tenant token not readable");
            }
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The current service-account token, if one has been resolved.
    pub fn current_token(&self) -> Option<Arc<String>> {
        self.token.load_full()
    }
}

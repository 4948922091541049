//! Inert health checker with a caller-seeded answer.
//!
//! Two call sites use this, with opposite seeds: cloud nodes stand in for
//! the remote prober with `healthy = true` (a cloud node does not probe
//! itself), and disabled coordination stands in for the coordination
//! checker with `healthy = false` (the coordinator never becomes healthy).

use url::Url;

use crate::health::{BackendHealthChecker, HealthChecker};

/// A checker that always reports the seeded answer.
#[derive(Debug, Clone, Copy)]
pub struct FakeChecker {
    healthy: bool,
}

impl FakeChecker {
    pub fn new(healthy: bool) -> Self {
        Self { healthy }
    }
}

impl HealthChecker for FakeChecker {
    fn is_healthy(&self) -> bool {
        self.healthy
    }
}

impl BackendHealthChecker for FakeChecker {
    fn backend_is_healthy(&self, _server: &Url) -> bool {
        self.healthy
    }
}

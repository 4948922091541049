//! Caller-facing view of the coordination subsystem.
//!
//! The bootstrap runs in the background while request handling is already
//! live, so consumers cannot hold direct references to coordination
//! components that may not exist yet. They hold a [`CoordinatorHandle`]
//! instead and re-read it on every use; the background bootstrap publishes
//! into the same handle when it finishes. Publication and reads race by
//! design, so every cell is lock-guarded.

use std::sync::{Arc, RwLock};

use crate::coordinator::{Coordinator, FakeCoordinator};
use crate::health::{FakeChecker, HealthChecker};
use crate::transport::TransportManager;

/// Where the coordination bootstrap currently stands.
///
/// Written only by the single background bootstrap task; `Failed` is
/// terminal — there is no retry within a process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    /// Coordination is turned off in configuration.
    Disabled,
    /// The background bootstrap is constructing the certificate manager.
    Bootstrapping,
    /// Waiting for client certificate material.
    CertPending,
    /// All components constructed and published.
    Ready,
    /// A construction stage failed; the subsystem stays degraded.
    Failed,
}

/// A single published value, readable before, during, and after publication.
pub struct Latest<T: ?Sized> {
    cell: RwLock<Option<Arc<T>>>,
}

impl<T: ?Sized> Latest<T> {
    pub fn empty() -> Self {
        Self {
            cell: RwLock::new(None),
        }
    }

    pub fn seeded(value: Arc<T>) -> Self {
        Self {
            cell: RwLock::new(Some(value)),
        }
    }

    /// The current value, or `None` while unpublished.
    pub fn current(&self) -> Option<Arc<T>> {
        self.cell
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn publish(&self, value: Arc<T>) {
        *self.cell.write().unwrap_or_else(|e| e.into_inner()) = Some(value);
    }
}

struct HandleInner {
    state: RwLock<CoordinatorState>,
    health_checker: Latest<dyn HealthChecker>,
    transport: Latest<TransportManager>,
    coordinator: Latest<dyn Coordinator>,
}

/// Cloneable accessor for the coordination subsystem's current components.
#[derive(Clone)]
pub struct CoordinatorHandle {
    inner: Arc<HandleInner>,
}

impl CoordinatorHandle {
    /// Handle for a disabled subsystem: bound directly to the inert
    /// fallback implementations for the whole process lifetime. The
    /// transport stays absent — there is nothing to transport to.
    pub fn disabled() -> Self {
        Self {
            inner: Arc::new(HandleInner {
                state: RwLock::new(CoordinatorState::Disabled),
                health_checker: Latest::seeded(Arc::new(FakeChecker::new(false))),
                transport: Latest::empty(),
                coordinator: Latest::seeded(Arc::new(FakeCoordinator)),
            }),
        }
    }

    /// Handle for an enabled subsystem whose bootstrap has just started.
    pub(crate) fn bootstrapping() -> Self {
        Self {
            inner: Arc::new(HandleInner {
                state: RwLock::new(CoordinatorState::Bootstrapping),
                health_checker: Latest::empty(),
                transport: Latest::empty(),
                coordinator: Latest::empty(),
            }),
        }
    }

    pub fn state(&self) -> CoordinatorState {
        *self.inner.state.read().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn set_state(&self, state: CoordinatorState) {
        *self.inner.state.write().unwrap_or_else(|e| e.into_inner()) = state;
    }

    /// The coordination health checker, or `None` while unavailable.
    pub fn health_checker(&self) -> Option<Arc<dyn HealthChecker>> {
        self.inner.health_checker.current()
    }

    /// The coordination transport manager, or `None` while unavailable.
    pub fn transport(&self) -> Option<Arc<TransportManager>> {
        self.inner.transport.current()
    }

    /// The coordinator, or `None` while unavailable.
    pub fn coordinator(&self) -> Option<Arc<dyn Coordinator>> {
        self.inner.coordinator.current()
    }

    /// Publish the fully-constructed subsystem and mark it ready.
    pub(crate) fn publish_ready(
        &self,
        transport: Arc<TransportManager>,
        health_checker: Arc<dyn HealthChecker>,
        coordinator: Arc<dyn Coordinator>,
    ) {
        self.inner.transport.publish(transport);
        self.inner.health_checker.publish(health_checker);
        self.inner.coordinator.publish(coordinator);
        self.set_state(CoordinatorState::Ready);
    }
}

impl std::fmt::Debug for CoordinatorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordinatorHandle")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::test_support::test_transport;

    #[test]
    fn test_disabled_handle_yields_fallbacks_forever() {
        let handle = CoordinatorHandle::disabled();
        assert_eq!(handle.state(), CoordinatorState::Disabled);

        // Fallback checker is seeded unhealthy, fallback coordinator is
        // never a leader, and the transport is absent.
        let checker = handle.health_checker().expect("fallback checker present");
        assert!(!checker.is_healthy());
        let coordinator = handle.coordinator().expect("fallback coordinator present");
        assert!(!coordinator.is_leader());
        assert!(!coordinator.is_ready());
        assert!(handle.transport().is_none());
    }

    #[test]
    fn test_bootstrapping_handle_yields_nothing() {
        let handle = CoordinatorHandle::bootstrapping();
        assert_eq!(handle.state(), CoordinatorState::Bootstrapping);
        assert!(handle.health_checker().is_none());
        assert!(handle.transport().is_none());
        assert!(handle.coordinator().is_none());
    }

    #[test]
    fn test_publish_ready_flips_all_getters() {
        let handle = CoordinatorHandle::bootstrapping();
        handle.publish_ready(
            Arc::new(test_transport()),
            Arc::new(FakeChecker::new(true)),
            Arc::new(FakeCoordinator),
        );
        assert_eq!(handle.state(), CoordinatorState::Ready);
        assert!(handle.health_checker().is_some());
        assert!(handle.transport().is_some());
        assert!(handle.coordinator().is_some());
    }

    #[test]
    fn test_clones_observe_publication() {
        let handle = CoordinatorHandle::bootstrapping();
        let observer = handle.clone();
        handle.set_state(CoordinatorState::Failed);
        assert_eq!(observer.state(), CoordinatorState::Failed);
        assert!(observer.coordinator().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_reads_during_publication() {
        let handle = CoordinatorHandle::bootstrapping();
        let reader = handle.clone();
        let read_task = tokio::spawn(async move {
            for _ in 0..1000 {
                // Must never panic or observe a torn value.
                let _ = reader.health_checker();
                let _ = reader.state();
            }
        });
        handle.publish_ready(
            Arc::new(test_transport()),
            Arc::new(FakeChecker::new(true)),
            Arc::new(FakeCoordinator),
        );
        read_task.await.unwrap();
        assert_eq!(handle.state(), CoordinatorState::Ready);
    }
}

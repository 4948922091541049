//! Shared informer factory.
//!
//! Components that watch external state (the tenant token file, the
//! coordination PKI directory) register their watcher here during
//! construction. Nothing runs until the bootstrap sequence calls
//! [`SharedInformerFactory::start`] — which it does only after every
//! registration is in, including the coordination certificate manager's.
//! Starting earlier would let watchers miss registrations racing with the
//! first events.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

type InformerTask = Pin<Box<dyn Future<Output = ()> + Send>>;

struct Registration {
    name: String,
    task: InformerTask,
}

/// Registry of watcher tasks, started exactly once.
#[derive(Default)]
pub struct SharedInformerFactory {
    pending: Mutex<Vec<Registration>>,
    started: AtomicBool,
}

impl SharedInformerFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named watcher task.
    ///
    /// A registration arriving after `start` is spawned immediately; by then
    /// the registration barrier has passed and delaying it would help nobody.
    pub fn register(
        &self,
        name: &str,
        task: impl Future<Output = ()> + Send + 'static,
    ) {
        if self.started.load(Ordering::Acquire) {
            tracing::warn!(informer = name, "registered after factory start, running immediately");
            tokio::spawn(task);
            return;
        }
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Registration {
                name: name.to_string(),
                task: Box::pin(task),
            });
    }

    /// Spawn every registered watcher. Subsequent calls are no-ops.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::AcqRel) {
            return;
        }
        let pending = std::mem::take(
            &mut *self.pending.lock().unwrap_or_else(|e| e.into_inner()),
        );
        for registration in pending {
            tracing::info!(informer = %registration.name, "starting informer");
            tokio::spawn(registration.task);
        }
    }

    /// Number of registrations waiting for `start`.
    pub fn pending_count(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_registered_tasks_run_only_after_start() {
        let factory = SharedInformerFactory::new();
        let ran = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let ran = ran.clone();
            factory.register("watcher", async move {
                ran.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(factory.pending_count(), 2);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(ran.load(Ordering::SeqCst), 0, "nothing runs before start");

        factory.start();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(ran.load(Ordering::SeqCst), 2);
        assert_eq!(factory.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let factory = SharedInformerFactory::new();
        let ran = Arc::new(AtomicUsize::new(0));
        let counter = ran.clone();
        factory.register("watcher", async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        factory.start();
        factory.start();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_late_registration_runs_immediately() {
        let factory = SharedInformerFactory::new();
        factory.start();

        let ran = Arc::new(AtomicUsize::new(0));
        let counter = ran.clone();
        factory.register("latecomer", async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }
}

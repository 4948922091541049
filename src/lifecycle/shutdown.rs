//! Shutdown coordination for the hub.

use tokio_util::sync::CancellationToken;

/// Process-wide cancellation signal.
///
/// A single `Shutdown` is created at startup and a clone is handed to every
/// long-lived component. Triggering is sticky: tasks that start observing
/// after the signal has fired still see it immediately.
#[derive(Clone, Debug, Default)]
pub struct Shutdown {
    token: CancellationToken,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    /// Whether the signal has already fired.
    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolve once the signal fires. Resolves immediately if it already has.
    pub async fn triggered(&self) {
        self.token.cancelled().await;
    }
}

//! Auxiliary network management.
//!
//! Optional component that re-asserts the hub's local networking
//! assumptions on an interval: the listener address must stay resolvable
//! and bindable-shaped. Drift (an interface torn down underneath the hub,
//! an address that stopped resolving) is logged for the operator; the hub
//! itself keeps serving on whatever it already bound.

use std::net::ToSocketAddrs;
use std::time::Duration;

use crate::config::{ListenerConfig, NetworkConfig};
use crate::lifecycle::shutdown::Shutdown;

pub struct NetworkManager {
    bind_address: String,
    interval: Duration,
}

impl NetworkManager {
    pub fn new(config: &NetworkConfig, listener: &ListenerConfig) -> Self {
        Self {
            bind_address: listener.bind_address.clone(),
            interval: Duration::from_secs(config.check_interval_secs),
        }
    }

    /// Start the check loop. Fire-and-forget; exits on shutdown.
    pub fn run(self, shutdown: &Shutdown) {
        tracing::info!(
            address = %self.bind_address,
            interval_secs = self.interval.as_secs(),
            "network manager starting"
        );
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => self.check_once(),
                    _ = shutdown.triggered() => {
                        tracing::info!("network manager exiting");
                        break;
                    }
                }
            }
        });
    }

    fn check_once(&self) {
        match self.bind_address.to_socket_addrs() {
            Ok(mut addrs) => {
                if addrs.next().is_none() {
                    tracing::warn!(address = %self.bind_address, "listener address resolves to nothing");
                }
            }
            Err(e) => {
                tracing::warn!(address = %self.bind_address, error = %e, "listener address no longer resolves");
            }
        }
    }
}

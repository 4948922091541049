//! edgehub binary entrypoint.
//!
//! ```text
//!                        ┌──────────────────────────────────────────────┐
//!                        │                  EDGE HUB                    │
//!   Local Workloads ────▶│  proxy ──▶ healthy remote endpoint           │
//!                        │    │  (cloud down) ──▶ coordination endpoint │
//!                        │    │  (all down, GET) ──▶ local cache        │
//!                        │                                              │
//!                        │  health probes · gc · tenant · informers     │
//!                        └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use edgehub::config::load_config;
use edgehub::lifecycle::{bootstrap, signals};
use edgehub::observability::{logging, metrics};
use edgehub::Shutdown;

#[derive(Parser, Debug)]
#[command(
    name = "edgehub",
    version,
    about = "Edge-side proxy between local workloads and remote control-plane endpoints"
)]
struct Options {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "edgehub.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    let options = Options::parse();

    let cfg = match load_config(&options.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("failed to load configuration from {}: {e}", options.config.display());
            std::process::exit(1);
        }
    };

    logging::init(&cfg.observability.log_level);
    tracing::info!(
        config = %options.config.display(),
        node = %cfg.node_name,
        mode = %cfg.mode,
        remote_servers = cfg.remote_servers.len(),
        coordination = cfg.coordination.enabled,
        "edgehub starting"
    );

    if cfg.observability.metrics_enabled {
        match cfg.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %cfg.observability.metrics_address,
                "failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    signals::spawn_handlers(&shutdown);

    if let Err(e) = bootstrap::run(cfg, shutdown).await {
        tracing::error!(error = %e, "edgehub startup failed");
        std::process::exit(1);
    }

    tracing::info!("shutdown complete");
}

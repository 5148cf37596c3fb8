//! Onboard Hero API server.
//!
//! # Architecture Overview
//!
//! ```text
//!   client ──▶ request id / trace / security headers / metrics
//!                │
//!                ▼
//!           timeout + body limit ──▶ session (token → Identity) ──▶ rate limit
//!                                                                     │
//!            ┌──────────────┬──────────────┬───────────────┬──────────┘
//!            ▼              ▼              ▼               ▼
//!        /api/v1/*      /api/admin/*   /api/graphql   /api/webhooks/stripe
//!            │              │              │               │
//!            └──────┬───────┴──────────────┘               ▼
//!                   ▼                                 billing processor
//!          data access layer (PostgREST / memory)          │
//!                   │                                      ▼
//!          vendor clients (Stripe, BoldSign, Slack,   companies table
//!          Twilio, Resend/SES, Nylas)
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use onboard_hero::config::loader::{load_config, load_from_env};
use onboard_hero::config::watcher::ConfigWatcher;
use onboard_hero::lifecycle::signals::shutdown_signal;
use onboard_hero::observability::{logging, metrics};
use onboard_hero::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "onboard-hero", version, about = "Onboard Hero API server")]
struct Args {
    /// Path to the TOML configuration file. Optional; environment variables
    /// override its values.
    #[arg(short, long, env = "ONBOARD_CONFIG", default_value = "onboard-hero.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config_exists = args.config.exists();
    let config = if config_exists {
        load_config(&args.config)?
    } else {
        load_from_env()?
    };

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "onboard-hero starting");
    if config_exists {
        tracing::info!(path = %args.config.display(), "Configuration loaded");
    } else {
        tracing::info!(path = %args.config.display(), "No config file; using defaults and environment");
    }

    tracing::info!(
        environment = ?config.environment,
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        rate_limit_requests = config.rate_limit.requests,
        rate_limit_window_secs = config.rate_limit.window_secs,
        "Configuration summary"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // Hot reload; the watcher must outlive the server
    let (_watcher, config_updates) = if config_exists {
        let (watcher, updates) = ConfigWatcher::new(&args.config);
        match watcher.run() {
            Ok(handle) => (Some(handle), Some(updates)),
            Err(e) => {
                tracing::error!(error = %e, "Config watcher failed to start; hot reload disabled");
                (None, None)
            }
        }
    } else {
        (None, None)
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            shutdown.trigger("signal");
        }
    });

    let server = HttpServer::new(config)?;
    server.run(listener, config_updates, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

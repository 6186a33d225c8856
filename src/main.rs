//! linekv server binary
//!
//! Parses the command line, sets up logging, binds the listener and serves
//! until Ctrl+C or SIGTERM.

use clap::Parser;
use linekv::{Config, Server, DEFAULT_HOST, DEFAULT_PORT};
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// A small concurrent in-memory key-value server
#[derive(Parser, Debug)]
#[command(name = "linekv", version, about)]
struct Args {
    /// Port to listen on
    #[arg(default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,

    /// Close sessions idle for this many seconds (0 disables)
    #[arg(long, default_value_t = 300)]
    idle_timeout_secs: u64,

    /// Background expiry sweep interval in milliseconds (0 disables)
    #[arg(long, default_value_t = 100)]
    sweep_interval_ms: u64,

    /// Longest accepted request line in bytes
    #[arg(long, default_value_t = linekv::protocol::DEFAULT_MAX_LINE_LENGTH)]
    max_line_length: usize,
}

impl Args {
    fn into_config(self) -> Config {
        let non_zero = |d: Duration| (!d.is_zero()).then_some(d);

        Config::builder()
            .host(self.host)
            .port(self.port)
            .idle_timeout(non_zero(Duration::from_secs(self.idle_timeout_secs)))
            .sweep_interval(non_zero(Duration::from_millis(self.sweep_interval_ms)))
            .max_line_length(self.max_line_length)
            .build()
    }
}

fn print_banner(config: &Config) {
    println!(
        r#"
linekv v{} - in-memory key-value server
──────────────────────────────────────────
Listening on {}
Try:  printf 'SET greeting hello\nGET greeting\n' | nc {} {}

Use Ctrl+C to shutdown gracefully.
"#,
        linekv::VERSION,
        config.bind_address(),
        config.host,
        config.port,
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Args::parse().into_config();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let server = Server::bind(config.clone()).await?;
    print_banner(&config);
    info!(
        idle_timeout = ?config.idle_timeout,
        sweep_interval = ?config.sweep_interval,
        max_line_length = config.max_line_length,
        "linekv v{} ready",
        linekv::VERSION
    );

    server.run(shutdown_signal()).await;
    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}

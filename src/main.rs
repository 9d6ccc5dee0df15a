//! EnvDash - Headless Entry Point
//!
//! Runs the dashboard core without a GUI. Every snapshot is printed to stdout
//! as one JSON line; mode and connection changes go to the log.
//!
//! Usage: `envdash-rs [CONFIG]` (defaults to the app data directory).
//! While running, type `t` + Enter to toggle live/simulated and `q` + Enter
//! to quit.

use anyhow::Context;
use envdash_rs::{
    config::{default_config_path, DashboardConfig},
    dashboard::{Dashboard, DashboardEvent, DashboardHandle, DashboardRunner},
    transport::MqttTransport,
};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

fn main() -> anyhow::Result<()> {
    let config_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(default_config_path)
        .context("Could not determine config path")?;

    let config = DashboardConfig::load_or_default(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Keep the guard alive so buffered log lines are flushed on exit
    let _log_guard = init_logging(&config);

    tracing::info!("Starting EnvDash with config {:?}", config_path);

    let transport = MqttTransport::new(config.broker.clone().unwrap_or_default(), config.backoff);
    let dashboard = Dashboard::new(&config, Box::new(transport))
        .context("Invalid dashboard configuration")?;

    let (runner, handle) = DashboardRunner::new(dashboard);
    let runner_thread = runner.spawn().context("Failed to start dashboard")?;

    spawn_stdin_commands(handle.clone());

    let stdout = std::io::stdout();
    loop {
        let Some(event) = handle.recv_timeout(Duration::from_millis(500)) else {
            if runner_thread.is_finished() {
                break;
            }
            continue;
        };

        match event {
            DashboardEvent::Snapshot(snapshot) => {
                let line =
                    serde_json::to_string(&snapshot).context("Failed to serialize snapshot")?;
                let mut out = stdout.lock();
                writeln!(out, "{}", line)?;
                out.flush()?;
            }
            DashboardEvent::ModeChanged(change) => {
                tracing::info!("Mode: {} -> {} ({:?})", change.from, change.to, change.cause);
            }
            DashboardEvent::ConnectionChanged(state) => {
                tracing::info!("Connection: {}", state);
            }
            DashboardEvent::Shutdown => break,
        }
    }

    tracing::info!("Shutting down...");
    handle.shutdown();
    if runner_thread.join().is_err() {
        tracing::error!("Dashboard thread panicked");
    }

    Ok(())
}

/// Console logging plus an optional daily log file
fn init_logging(config: &DashboardConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = || {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,envdash_rs=debug"))
    };

    // Snapshots own stdout, so console logs go to stderr
    let console = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(filter());

    let (file_layer, guard) = match config.logging.file.then(|| config.log_directory()).flatten() {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "envdash.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(filter());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry().with(console).with(file_layer).init();
    guard
}

/// Read single-letter commands from stdin on a background thread
fn spawn_stdin_commands(handle: DashboardHandle) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            match line.trim() {
                "t" => handle.toggle_mode(),
                "q" => {
                    handle.shutdown();
                    break;
                }
                "" => {}
                other => tracing::warn!("Unknown command '{}' (t = toggle, q = quit)", other),
            }
        }
    });
}

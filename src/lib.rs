//! # EnvDash-RS: Campus Environmental Dashboard Core
//!
//! Ingestion and live-chart state machine for a campus environmental
//! monitoring dashboard. Sensor readings (temperature, humidity, AQI, TVOC,
//! eCO2, UV, noise, camera frames) arrive over MQTT or from a synthetic
//! generator, are routed to named channels, and are kept as bounded chart
//! histories plus a latest value per channel.
//!
//! ## Architecture
//!
//! - **Transport**: rumqttc event loop on its own thread, reconnecting with
//!   exponential backoff
//! - **Dashboard**: single-threaded apply step that drains the transport
//!   queue, runs mode transitions, and feeds the stores
//! - **Mode**: live broker data or simulated data, with automatic fallback
//!   after repeated connect failures
//! - **Scheduler**: value and chart refresh cadences producing snapshots
//! - **Communication**: Crossbeam channels between threads
//!
//! ## Configuration
//!
//! Configuration is a TOML file, by default in the platform data directory
//! under `envdash-rs`:
//!
//! - **Linux**: `~/.local/share/envdash-rs/envdash.toml`
//! - **macOS**: `~/Library/Application Support/envdash-rs/envdash.toml`
//! - **Windows**: `%APPDATA%\envdash-rs\envdash.toml`
//!
//! ## Example
//!
//! ```ignore
//! use envdash_rs::{
//!     config::DashboardConfig,
//!     dashboard::{Dashboard, DashboardEvent, DashboardRunner},
//!     transport::MqttTransport,
//! };
//!
//! let config = DashboardConfig::load_or_default("envdash.toml")?;
//! let broker = config.broker.clone().unwrap_or_default();
//! let transport = MqttTransport::new(broker, config.backoff);
//! let dashboard = Dashboard::new(&config, Box::new(transport))?;
//!
//! let (runner, handle) = DashboardRunner::new(dashboard);
//! let thread = runner.spawn()?;
//!
//! while let Some(event) = handle.recv_timeout(std::time::Duration::from_secs(1)) {
//!     if let DashboardEvent::Snapshot(snapshot) = event {
//!         println!("temp = {:?}", snapshot.value("temp"));
//!     }
//! }
//! ```

pub mod config;
pub mod dashboard;
pub mod error;
pub mod ingest;
pub mod mode;
pub mod registry;
pub mod scheduler;
pub mod simulator;
pub mod store;
pub mod transport;
pub mod types;

// Re-export commonly used types
pub use config::DashboardConfig;
pub use dashboard::{Dashboard, DashboardEvent, DashboardHandle, DashboardRunner};
pub use error::{EnvDashError, Result};
pub use registry::{Channel, ChannelRegistry};
pub use types::{DashboardSnapshot, ModeState, Sample, SampleValue};

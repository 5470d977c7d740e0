//! Logging setup shared by Teams bridge binaries.
//!
//! Installs a `tracing` subscriber whose filter comes from `RUST_LOG` and whose output format
//! comes from `LOG_FORMAT` (JSON unless `text`, `pretty` or `plain` is requested).

mod config;
mod tracing_init;

pub use config::{LogFormat, TelemetryConfig};
pub use tracing_init::{init_telemetry, telemetry_installed};

use anyhow::Result;

/// Installs the shared telemetry subscriber configured from the environment.
pub fn install(service_name: &str) -> Result<()> {
    init_telemetry(TelemetryConfig::from_env(service_name))
}

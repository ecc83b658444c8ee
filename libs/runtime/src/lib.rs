//! Shared application runtime: layered configuration, home-directory
//! resolution, and the logging subsystem used by `hyperspot-server`.

pub mod config;
pub mod logging;
pub mod paths;
pub mod provider;

pub use config::{AppConfig, CliArgs, DatabaseConfig, LoggingConfig, ServerConfig};
pub use provider::{AppConfigProvider, ConfigProvider};

//! Command-line arguments.
//!
//! Flags override values read from the config file; anything not given on the
//! command line keeps the file (or default) value.

use std::path::PathBuf;

use clap::Parser;

use crate::config::loader::{read_config, ConfigError};
use crate::config::schema::{AppConfig, LogFormat};
use crate::config::validation::validate_config;

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "catalog-api")]
#[command(about = "JSON API server for a catalog of movies", long_about = None)]
pub struct Args {
    /// Path to a TOML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Port to listen on (keeps the configured host)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Environment (development|staging|production)
    #[arg(short, long)]
    pub env: Option<String>,

    /// Rate limiter maximum requests per second
    #[arg(long)]
    pub limiter_rps: Option<f64>,

    /// Rate limiter maximum burst
    #[arg(long)]
    pub limiter_burst: Option<u32>,

    /// Enable rate limiter
    #[arg(long)]
    pub limiter_enabled: Option<bool>,

    /// Graceful shutdown deadline in seconds
    #[arg(long)]
    pub shutdown_timeout: Option<u64>,

    /// Log output format
    #[arg(long, value_enum)]
    pub log_format: Option<LogFormat>,
}

impl Args {
    /// Read the config file (if any), apply overrides, then validate.
    pub fn into_config(self) -> Result<AppConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => AppConfig::default(),
        };
        self.apply(&mut config);
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }

    fn apply(&self, config: &mut AppConfig) {
        if let Some(port) = self.port {
            let host = config
                .server
                .bind_address
                .rsplit_once(':')
                .map(|(host, _)| host.to_string())
                .unwrap_or_else(|| "0.0.0.0".to_string());
            config.server.bind_address = format!("{}:{}", host, port);
        }
        if let Some(env) = &self.env {
            config.server.env = env.clone();
        }
        if let Some(rps) = self.limiter_rps {
            config.rate_limit.requests_per_second = rps;
        }
        if let Some(burst) = self.limiter_burst {
            config.rate_limit.burst = burst;
        }
        if let Some(enabled) = self.limiter_enabled {
            config.rate_limit.enabled = enabled;
        }
        if let Some(secs) = self.shutdown_timeout {
            config.server.shutdown_timeout_secs = secs;
        }
        if let Some(format) = self.log_format {
            config.observability.log_format = format;
        }
    }
}

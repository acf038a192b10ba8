mod file_config;

pub use file_config::{FileConfig, PostServiceConfig};

use crate::bookmark_manager::DEFAULT_PER_PAGE;
use crate::server::RequestsLoggingLevel;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_path: Option<PathBuf>,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub post_service_url: Option<String>,
    pub post_service_timeout_sec: u64,
    pub per_page: usize,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub post_service_url: String,
    pub post_service_timeout_sec: u64,
    pub per_page: usize,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_path = file
            .db_path
            .map(PathBuf::from)
            .or_else(|| cli.db_path.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_path must be specified via --db-path or in config file")
            })?;

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                bail!("Database directory does not exist: {:?}", parent);
            }
        }

        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);
        if port == metrics_port {
            bail!("port and metrics_port must differ, both are {}", port);
        }

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let post_service = file.post_service.unwrap_or_default();
        let post_service_url = post_service
            .url
            .or_else(|| cli.post_service_url.clone())
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "post service url must be specified via --post-service-url or in config file"
                )
            })?;
        let post_service_timeout_sec = post_service
            .timeout_sec
            .unwrap_or(cli.post_service_timeout_sec);

        let per_page = match file.per_page.unwrap_or(cli.per_page) {
            0 => DEFAULT_PER_PAGE,
            n => n,
        };

        Ok(AppConfig {
            db_path,
            port,
            metrics_port,
            logging_level,
            post_service_url,
            post_service_timeout_sec,
            per_page,
        })
    }
}

fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}

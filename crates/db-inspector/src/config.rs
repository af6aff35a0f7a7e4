// db-inspector/crates/db-inspector/src/config.rs

use anyhow::{Context, Result};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{info, warn};

/// Upload ceiling used when `MAX_UPLOAD_BYTES` is not set.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 1_000_000_000;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_host: String,
    pub api_port: u16,
    pub data_dir: PathBuf,
    pub max_upload_bytes: u64,
    pub request_timeout_seconds: u64,
    pub pool_max_size: u32,
    pub pool_cache_capacity: u64,
    pub upload_field: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            warn!("Failed to load .env file: {}. Using system environment variables.", e);
        } else {
            info!("Loaded environment variables from .env file");
        }

        let upload_field = env::var("UPLOAD_FIELD").unwrap_or_else(|_| "file".into());
        if upload_field.is_empty()
            || !upload_field
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(anyhow::anyhow!(
                "UPLOAD_FIELD must be a non-empty identifier, got '{}'",
                upload_field
            ));
        }

        Ok(Self {
            api_host: env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".into()),
            api_port: env::var("API_PORT")
                .unwrap_or_else(|_| "8000".into())
                .parse()
                .context("API_PORT must be a port number")?,
            data_dir: PathBuf::from(env::var("DATA_DIR").unwrap_or_else(|_| "./uploads".into())),
            max_upload_bytes: env::var("MAX_UPLOAD_BYTES")
                .unwrap_or_else(|_| DEFAULT_MAX_UPLOAD_BYTES.to_string())
                .parse()
                .context("MAX_UPLOAD_BYTES must be a byte count")?,
            request_timeout_seconds: env::var("REQUEST_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "600".into())
                .parse()
                .context("REQUEST_TIMEOUT_SECONDS must be a number of seconds")?,
            pool_max_size: env::var("POOL_MAX_SIZE")
                .unwrap_or_else(|_| "4".into())
                .parse()
                .context("POOL_MAX_SIZE must be a positive integer")?,
            pool_cache_capacity: env::var("POOL_CACHE_CAPACITY")
                .unwrap_or_else(|_| "16".into())
                .parse()
                .context("POOL_CACHE_CAPACITY must be a positive integer")?,
            upload_field,
        })
    }

    pub fn print_config(&self) {
        info!("Current Configuration:");
        info!("- API: {}:{}", self.api_host, self.api_port);
        info!("- Data Directory: {}", self.data_dir.display());
        info!("- Max Upload: {} bytes", self.max_upload_bytes);
        info!("- Request Timeout: {}s", self.request_timeout_seconds);
        info!("- Pool Size: {} (cache capacity {})", self.pool_max_size, self.pool_cache_capacity);
        info!("- Upload Field: {}", self.upload_field);
    }

    pub fn api_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.api_host, self.api_port)
            .parse()
            .with_context(|| format!("invalid API address {}:{}", self.api_host, self.api_port))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_host: "127.0.0.1".to_string(),
            api_port: 8000,
            data_dir: PathBuf::from("./uploads"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            request_timeout_seconds: 600,
            pool_max_size: 4,
            pool_cache_capacity: 16,
            upload_field: "file".to_string(),
        }
    }
}

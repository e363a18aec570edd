//! Server configuration loaded from the environment

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{BYTES_PER_MB, MAX_FILES_PER_REQUEST};

/// Size in bytes of `mb` megabytes, saturating instead of wrapping
pub fn megabytes(mb: u64) -> u64 {
    mb.saturating_mul(BYTES_PER_MB)
}

#[derive(Clone, Debug)]
pub struct Config {
    pub server_port: u16,
    pub environment: String,
    pub cors_origins: Vec<String>,
    pub http_concurrency_limit: usize,

    // Storage
    pub storage_path: String,
    /// Prepended to download locations handed to clients; empty keeps them relative
    pub public_base_url: String,

    // Intake
    pub max_file_size_bytes: u64,
    pub strict_formats: bool,

    // Conversion
    pub ffmpeg_path: String,
    pub max_concurrent_conversions: usize,
    pub conversion_queue_size: usize,
    pub cache_max_entries: usize,
    pub cache_ttl_secs: u64,

    // Job retention
    pub job_retention_secs: u64,
    pub job_reap_interval_secs: u64,
}

const SERVER_PORT: u16 = 4000;
const HTTP_CONCURRENCY_LIMIT: usize = 512;
const MAX_FILE_SIZE_MB: u64 = 100;
const MAX_CONCURRENT_CONVERSIONS: usize = 2;
const CONVERSION_QUEUE_SIZE: usize = 1000;
const CACHE_MAX_ENTRIES: usize = 256;
const CACHE_TTL_SECS: u64 = 3600;
const JOB_RETENTION_SECS: u64 = 86_400;
const JOB_REAP_INTERVAL_SECS: u64 = 300;

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: SERVER_PORT,
            environment: "development".to_string(),
            cors_origins: vec!["*".to_string()],
            http_concurrency_limit: HTTP_CONCURRENCY_LIMIT,
            storage_path: "./storage".to_string(),
            public_base_url: String::new(),
            max_file_size_bytes: megabytes(MAX_FILE_SIZE_MB),
            strict_formats: false,
            ffmpeg_path: "ffmpeg".to_string(),
            max_concurrent_conversions: MAX_CONCURRENT_CONVERSIONS,
            conversion_queue_size: CONVERSION_QUEUE_SIZE,
            cache_max_entries: CACHE_MAX_ENTRIES,
            cache_ttl_secs: CACHE_TTL_SECS,
            job_retention_secs: JOB_RETENTION_SECS,
            job_reap_interval_secs: JOB_REAP_INTERVAL_SECS,
        }
    }
}

fn env_or<T: FromStr + ToString>(key: &str, default: T) -> T {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse::<T>()
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let defaults = Config::default();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| defaults.environment.clone());

        let cors_origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());
        if is_production_name(&environment) && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }
        let cors_origins: Vec<String> = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let max_file_size_mb = env_or("MAX_FILE_SIZE_MB", MAX_FILE_SIZE_MB);

        let config = Config {
            server_port: env_or("PORT", SERVER_PORT),
            environment,
            cors_origins,
            http_concurrency_limit: env_or("HTTP_CONCURRENCY_LIMIT", HTTP_CONCURRENCY_LIMIT),
            storage_path: env::var("STORAGE_PATH").unwrap_or(defaults.storage_path),
            public_base_url: env::var("PUBLIC_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_default(),
            max_file_size_bytes: megabytes(max_file_size_mb),
            strict_formats: env_or("STRICT_FORMATS", false),
            ffmpeg_path: env::var("FFMPEG_PATH").unwrap_or(defaults.ffmpeg_path),
            max_concurrent_conversions: env_or(
                "MAX_CONCURRENT_CONVERSIONS",
                MAX_CONCURRENT_CONVERSIONS,
            ),
            conversion_queue_size: env_or("CONVERSION_QUEUE_SIZE", CONVERSION_QUEUE_SIZE),
            cache_max_entries: env_or("CACHE_MAX_ENTRIES", CACHE_MAX_ENTRIES),
            cache_ttl_secs: env_or("CACHE_TTL_SECS", CACHE_TTL_SECS),
            job_retention_secs: env_or("JOB_RETENTION_SECS", JOB_RETENTION_SECS),
            job_reap_interval_secs: env_or("JOB_REAP_INTERVAL_SECS", JOB_REAP_INTERVAL_SECS),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.max_file_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_FILE_SIZE_MB must be greater than 0"));
        }
        if self.max_concurrent_conversions == 0 {
            return Err(anyhow::anyhow!(
                "MAX_CONCURRENT_CONVERSIONS must be greater than 0"
            ));
        }
        if self.conversion_queue_size == 0 {
            return Err(anyhow::anyhow!("CONVERSION_QUEUE_SIZE must be greater than 0"));
        }
        if self.http_concurrency_limit == 0 {
            return Err(anyhow::anyhow!("HTTP_CONCURRENCY_LIMIT must be greater than 0"));
        }
        if self.storage_path.trim().is_empty() {
            return Err(anyhow::anyhow!("STORAGE_PATH must not be empty"));
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        is_production_name(&self.environment)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn job_retention(&self) -> Duration {
        Duration::from_secs(self.job_retention_secs)
    }

    /// Largest request body accepted: room for a full multi-file upload
    pub fn max_request_body_bytes(&self) -> usize {
        let bytes = self
            .max_file_size_bytes
            .saturating_mul(MAX_FILES_PER_REQUEST);
        usize::try_from(bytes).unwrap_or(usize::MAX)
    }

    pub fn job_reap_interval(&self) -> Duration {
        Duration::from_secs(self.job_reap_interval_secs.max(1))
    }
}

fn is_production_name(environment: &str) -> bool {
    let env = environment.to_lowercase();
    env == "production" || env == "prod"
}

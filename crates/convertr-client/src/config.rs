//! Client configuration loaded from the environment

use convertr_core::megabytes;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Where status updates for a job come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusMode {
    /// Upload to the server and poll its job endpoint
    Remote,
    /// Advance progress on a local timer and convert in-process
    Simulated,
}

impl FromStr for StatusMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "remote" => Ok(StatusMode::Remote),
            "simulated" | "local" => Ok(StatusMode::Simulated),
            other => Err(anyhow::anyhow!("Invalid status mode: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub mode: StatusMode,
    pub request_timeout: Duration,
    pub poll_interval: Duration,
    /// Pause between successive downloads in a bulk download
    pub download_stagger: Duration,
    pub simulated_step: u8,
    pub simulated_interval: Duration,
    pub max_file_size_bytes: u64,
}

const API_URL: &str = "http://localhost:4000";
const REQUEST_TIMEOUT_SECS: u64 = 60;
const POLL_INTERVAL_MS: u64 = 500;
const DOWNLOAD_STAGGER_MS: u64 = 500;
const SIMULATED_STEP: u8 = 10;
const SIMULATED_INTERVAL_MS: u64 = 200;
const MAX_FILE_SIZE_MB: u64 = 100;

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: API_URL.to_string(),
            mode: StatusMode::Remote,
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            poll_interval: Duration::from_millis(POLL_INTERVAL_MS),
            download_stagger: Duration::from_millis(DOWNLOAD_STAGGER_MS),
            simulated_step: SIMULATED_STEP,
            simulated_interval: Duration::from_millis(SIMULATED_INTERVAL_MS),
            max_file_size_bytes: megabytes(MAX_FILE_SIZE_MB),
        }
    }
}

fn env_or<T: FromStr + ToString>(key: &str, default: T) -> T {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse::<T>()
        .unwrap_or(default)
}

impl ClientConfig {
    /// Reads `CONVERTR_*` variables. Without `CONVERTR_API_URL` and without an
    /// explicit `CONVERTR_MODE` the client runs simulated.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let api_url = env::var("CONVERTR_API_URL").ok();
        let mode = match env::var("CONVERTR_MODE") {
            Ok(mode) => mode.parse()?,
            Err(_) if api_url.is_some() => StatusMode::Remote,
            Err(_) => StatusMode::Simulated,
        };

        let config = ClientConfig {
            api_url: api_url
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| API_URL.to_string()),
            mode,
            request_timeout: Duration::from_secs(env_or(
                "CONVERTR_REQUEST_TIMEOUT_SECS",
                REQUEST_TIMEOUT_SECS,
            )),
            poll_interval: Duration::from_millis(env_or(
                "CONVERTR_POLL_INTERVAL_MS",
                POLL_INTERVAL_MS,
            )),
            download_stagger: Duration::from_millis(env_or(
                "CONVERTR_DOWNLOAD_STAGGER_MS",
                DOWNLOAD_STAGGER_MS,
            )),
            simulated_step: env_or("CONVERTR_SIMULATED_STEP", SIMULATED_STEP),
            simulated_interval: Duration::from_millis(env_or(
                "CONVERTR_SIMULATED_INTERVAL_MS",
                SIMULATED_INTERVAL_MS,
            )),
            max_file_size_bytes: megabytes(env_or(
                "CONVERTR_MAX_FILE_SIZE_MB",
                MAX_FILE_SIZE_MB,
            )),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.simulated_step == 0 || self.simulated_step > 100 {
            return Err(anyhow::anyhow!(
                "CONVERTR_SIMULATED_STEP must be between 1 and 100"
            ));
        }
        if self.poll_interval.is_zero() || self.simulated_interval.is_zero() {
            return Err(anyhow::anyhow!("Status intervals must be greater than 0"));
        }
        if self.max_file_size_bytes == 0 {
            return Err(anyhow::anyhow!(
                "CONVERTR_MAX_FILE_SIZE_MB must be greater than 0"
            ));
        }
        if self.mode == StatusMode::Remote && !self.api_url.starts_with("http") {
            return Err(anyhow::anyhow!(
                "CONVERTR_API_URL must be an http(s) URL, got '{}'",
                self.api_url
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.download_stagger, Duration::from_millis(500));
        assert_eq!(config.simulated_step, 10);
        assert_eq!(config.simulated_interval, Duration::from_millis(200));
    }

    #[test]
    fn test_huge_file_size_limit_saturates() {
        let config = ClientConfig {
            max_file_size_bytes: megabytes(u64::MAX),
            ..ClientConfig::default()
        };
        assert_eq!(config.max_file_size_bytes, u64::MAX);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_status_mode_parses() {
        assert_eq!("Remote".parse::<StatusMode>().unwrap(), StatusMode::Remote);
        assert_eq!("local".parse::<StatusMode>().unwrap(), StatusMode::Simulated);
        assert!("carrier-pigeon".parse::<StatusMode>().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_step() {
        let config = ClientConfig {
            simulated_step: 0,
            ..ClientConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_non_http_url_in_remote_mode() {
        let config = ClientConfig {
            api_url: "ftp://example.com".to_string(),
            ..ClientConfig::default()
        };
        assert!(config.validate().is_err());

        let simulated = ClientConfig {
            mode: StatusMode::Simulated,
            ..config
        };
        assert!(simulated.validate().is_ok());
    }
}

//! Server configuration loaded from the environment

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Top-level configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub janitor: JanitorConfig,
    pub processing: ProcessingConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,

    /// Request body limit for uploads, in megabytes
    pub max_upload_mb: usize,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root temp directory holding one directory per session
    pub temp_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct JanitorConfig {
    pub max_age: Duration,
    pub interval: Duration,
}

#[derive(Debug, Clone)]
pub struct ProcessingConfig {
    /// Bounded worker count for the batch transformer
    pub transform_workers: usize,

    /// Per-subscriber progress event buffer
    pub progress_buffer: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                max_upload_mb: 1024,
            },
            storage: StorageConfig {
                temp_dir: std::env::temp_dir().join("shrnk"),
            },
            janitor: JanitorConfig {
                max_age: Duration::from_secs(30 * 60),
                interval: Duration::from_secs(300),
            },
            processing: ProcessingConfig {
                transform_workers: default_workers(),
                progress_buffer: 64,
            },
        }
    }
}

impl Config {
    /// Load configuration from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let max_age_minutes: u64 = parse_or(&get, "SHRNK_MAX_AGE_MINUTES", 30)?;
        let interval_secs: u64 = parse_or(&get, "SHRNK_SWEEP_INTERVAL_SECS", 300)?;

        Ok(Self {
            server: ServerConfig {
                host: get("SERVER_HOST").unwrap_or(defaults.server.host),
                port: parse_or(&get, "SERVER_PORT", defaults.server.port)?,
                max_upload_mb: parse_or(&get, "SHRNK_MAX_UPLOAD_MB", defaults.server.max_upload_mb)?,
            },
            storage: StorageConfig {
                temp_dir: get("SHRNK_TEMP_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.storage.temp_dir),
            },
            janitor: JanitorConfig {
                max_age: Duration::from_secs(max_age_minutes.saturating_mul(60)),
                interval: Duration::from_secs(interval_secs.max(1)),
            },
            processing: ProcessingConfig {
                transform_workers: parse_or(
                    &get,
                    "SHRNK_TRANSFORM_WORKERS",
                    defaults.processing.transform_workers,
                )?
                .max(1),
                progress_buffer: parse_or(
                    &get,
                    "SHRNK_PROGRESS_BUFFER",
                    defaults.processing.progress_buffer,
                )?
                .max(1),
            },
        })
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key,
            value: raw,
        }),
        None => Ok(default),
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.janitor.max_age, Duration::from_secs(1800));
        assert_eq!(config.janitor.interval, Duration::from_secs(300));
        assert!(config.storage.temp_dir.ends_with("shrnk"));
        assert!(config.processing.transform_workers >= 1);
    }

    #[test]
    fn test_reads_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("SERVER_PORT", "9000"),
            ("SHRNK_TEMP_DIR", "/var/tmp/sessions"),
            ("SHRNK_MAX_AGE_MINUTES", "5"),
            ("SHRNK_SWEEP_INTERVAL_SECS", "60"),
            ("SHRNK_TRANSFORM_WORKERS", "0"),
        ]))
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.storage.temp_dir, PathBuf::from("/var/tmp/sessions"));
        assert_eq!(config.janitor.max_age, Duration::from_secs(300));
        assert_eq!(config.janitor.interval, Duration::from_secs(60));
        assert_eq!(config.processing.transform_workers, 1);
    }

    #[test]
    fn test_huge_max_age_saturates() {
        let max = u64::MAX.to_string();
        let config = Config::from_lookup(lookup(&[("SHRNK_MAX_AGE_MINUTES", max.as_str())])).unwrap();
        assert_eq!(config.janitor.max_age, Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_invalid_number_is_an_error() {
        let err = Config::from_lookup(lookup(&[("SHRNK_MAX_AGE_MINUTES", "soon")])).unwrap_err();
        assert!(err.to_string().contains("SHRNK_MAX_AGE_MINUTES"));
    }
}

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

const DEFAULT_BASE_URL: &str = "https://openapi.safie.link";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("transport.read_timeout_us must be positive")]
    ZeroReadTimeout,
    #[error("segment.max_overrun_secs must be positive")]
    InvalidOverrun,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    /// Playlist reload / reconnect attempts before a read fails for good.
    #[serde(default = "default_max_reload")]
    pub max_reload: u32,
    /// Socket read timeout handed to the demuxer, in microseconds.
    #[serde(default = "default_read_timeout_us")]
    pub read_timeout_us: u64,
}

fn default_max_reload() -> u32 {
    2
}

fn default_read_timeout_us() -> u64 {
    8_000_000
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_reload: default_max_reload(),
            read_timeout_us: default_read_timeout_us(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SegmentConfig {
    /// Hard bound on how far a segment may run past its target duration
    /// while waiting for a keyframe. Unset means unbounded.
    #[serde(default)]
    pub max_overrun_secs: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub segment: SegmentConfig,
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => toml::from_str::<Config>(&std::fs::read_to_string(path)?)?,
            None => Config::default(),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.transport.read_timeout_us == 0 {
            return Err(ConfigError::ZeroReadTimeout);
        }
        if let Some(overrun) = self.segment.max_overrun_secs {
            if overrun.is_nan() || overrun <= 0.0 {
                return Err(ConfigError::InvalidOverrun);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.api.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.transport.max_reload, 2);
        assert_eq!(config.transport.read_timeout_us, 8_000_000);
        assert_eq!(config.segment.max_overrun_secs, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [transport]
            max_reload = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.transport.max_reload, 5);
        assert_eq!(config.transport.read_timeout_us, 8_000_000);
        assert_eq!(config.api.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn full_file() {
        let config: Config = toml::from_str(
            r#"
            [api]
            base_url = "https://example.test"

            [transport]
            max_reload = 1
            read_timeout_us = 1000000

            [segment]
            max_overrun_secs = 30.0
            "#,
        )
        .unwrap();
        assert_eq!(config.api.base_url, "https://example.test");
        assert_eq!(config.segment.max_overrun_secs, Some(30.0));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_read_timeout() {
        let config: Config = toml::from_str(
            r#"
            [transport]
            read_timeout_us = 0
            "#,
        )
        .unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroReadTimeout)
        ));
    }

    #[test]
    fn rejects_non_positive_overrun() {
        let config: Config = toml::from_str(
            r#"
            [segment]
            max_overrun_secs = -1.0
            "#,
        )
        .unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidOverrun)));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("camrec.toml");
        std::fs::write(&path, "[transport]\nmax_reload = 3\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.transport.max_reload, 3);
    }

    #[test]
    fn load_without_file_uses_defaults() {
        let config = Config::load(None).unwrap();
        assert_eq!(config.transport.max_reload, 2);
    }
}

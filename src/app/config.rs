use anyhow::{Context, bail};
use config::{Config, Environment};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Listener settings for the ads http surface
#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// Actix worker count, zero lets actix pick one per core
    pub workers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8080,
            workers: 0,
        }
    }
}

/// Upstream advertisement api the cache fetches from
#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
pub struct SourceConfig {
    /// Base url of the advertisement routes, e.g. https://api.fitverse.app/api/advertisements/
    pub base_url: String,
    /// Value passed as `limit` to the bulk endpoint
    #[serde(default = "default_bulk_limit")]
    #[builder(default = "default_bulk_limit()")]
    pub bulk_limit: usize,
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    #[builder(default = "default_connect_timeout()")]
    pub connect_timeout: Duration,
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    #[builder(default = "default_request_timeout()")]
    pub request_timeout: Duration,
}

fn default_bulk_limit() -> usize {
    5
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(2)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

/// Rotation and throttling policy of the advertisement cache
#[derive(Debug, Clone, Serialize, Deserialize, Builder, PartialEq)]
#[serde(default)]
#[builder(default)]
pub struct CacheConfig {
    /// Hard bound on cached entries, oldest fetched are evicted first
    pub max_size: usize,
    /// How long an entry stays usable after it was fetched
    #[serde(with = "humantime_serde")]
    pub cache_duration: Duration,
    /// Selections an entry may serve before it is excluded
    pub max_usage_count: u32,
    /// Minimum gap between two throttled fetches
    #[serde(with = "humantime_serde")]
    pub min_fetch_interval: Duration,
    /// Number of least used entries a single selection picks from
    pub candidate_pool: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 10,
            cache_duration: Duration::from_secs(5 * 60),
            max_usage_count: 3,
            min_fetch_interval: Duration::from_secs(30),
            candidate_pool: 3,
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.max_size == 0 {
            bail!("cache.max_size must be greater than zero");
        }

        if self.max_usage_count == 0 {
            bail!("cache.max_usage_count must be greater than zero");
        }

        if self.candidate_pool == 0 {
            bail!("cache.candidate_pool must be greater than zero");
        }

        if self.cache_duration.is_zero() {
            bail!("cache.cache_duration cannot be zero, nothing would ever be served");
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
pub struct FitadsConfig {
    #[serde(default)]
    #[builder(default)]
    pub server: ServerConfig,
    pub source: SourceConfig,
    #[serde(default)]
    #[builder(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    #[builder(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OtelProto {
    Http,
    #[default]
    Grpc,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FileRotation {
    #[default]
    Daily,
    Hourly,
    Never,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LogSink {
    Stdout {
        #[serde(default = "default_true")]
        color: bool,
        #[serde(default)]
        json: bool,
        #[serde(default = "default_true")]
        spans: bool,
    },
    File {
        path: PathBuf,
        #[serde(default)]
        json: bool,
        #[serde(default)]
        rotation: FileRotation,
        /// Rotated files kept on disk, zero keeps everything
        #[serde(default)]
        max_files: usize,
        #[serde(default = "default_true")]
        spans: bool,
    },
    Otel {
        endpoint: String,
        #[serde(default)]
        proto: OtelProto,
        #[serde(default = "default_true")]
        metrics: bool,
        #[serde(default = "default_metrics_interval", with = "humantime_serde")]
        metrics_interval: Duration,
        #[serde(default)]
        headers: HashMap<String, String>,
    },
}

fn default_true() -> bool {
    true
}

fn default_metrics_interval() -> Duration {
    Duration::from_secs(5)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Share of request root spans that are recorded
    pub span_sample_rate: f32,
    pub sinks: Vec<LogSink>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            span_sample_rate: 0.01,
            sinks: vec![LogSink::Stdout {
                color: true,
                json: false,
                spans: false,
            }],
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.sinks.is_empty() {
            bail!("At least one logging sink must be configured");
        }

        self.level.parse::<tracing::Level>().map_err(|_| {
            anyhow::anyhow!(
                "Invalid log level: '{}'. Valid levels: trace, debug, info, warn, error",
                self.level
            )
        })?;

        if !(0.0..=1.0).contains(&self.span_sample_rate) {
            bail!(
                "span_sample_rate must be between 0.0 and 1.0, got {}",
                self.span_sample_rate
            );
        }

        Ok(())
    }
}

impl FitadsConfig {
    /// Loads the yaml file at `path`, then applies any `FITADS__`
    /// prefixed env overrides, e.g. `FITADS__CACHE__MAX_SIZE=20`
    pub fn load(path: &Path) -> Result<FitadsConfig, anyhow::Error> {
        let cfg = Config::builder()
            .add_source(config::File::from(path.to_path_buf()))
            .add_source(
                Environment::with_prefix("FITADS")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .with_context(|| format!("failed reading config {}", path.display()))?;

        let cfg: FitadsConfig = cfg.try_deserialize()?;
        cfg.validate()?;

        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.source.bulk_limit == 0 {
            bail!("source.bulk_limit must be greater than zero");
        }

        url::Url::parse(&self.source.base_url)
            .with_context(|| format!("source.base_url '{}' is not a url", self.source.base_url))?;

        self.cache.validate()?;
        self.logging.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".yaml")
            .tempfile()
            .unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let file = write_config(
            r#"
source:
  base_url: "http://localhost:5000/api/advertisements/"
"#,
        );

        let cfg = FitadsConfig::load(file.path()).unwrap();

        assert_eq!(cfg.source.bulk_limit, 5);
        assert_eq!(cfg.cache, CacheConfig::default());
        assert_eq!(cfg.cache.cache_duration, Duration::from_secs(300));
        assert_eq!(cfg.cache.min_fetch_interval, Duration::from_secs(30));
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn test_humantime_durations_parse() {
        let file = write_config(
            r#"
source:
  base_url: "http://localhost:5000/api/advertisements/"
  request_timeout: 3s
cache:
  max_size: 20
  cache_duration: 10m
  min_fetch_interval: 1m 30s
logging:
  level: debug
  sinks:
    - type: stdout
      json: true
    - type: file
      path: logs/fitads.log
      rotation: hourly
      max_files: 4
"#,
        );

        let cfg = FitadsConfig::load(file.path()).unwrap();

        assert_eq!(cfg.source.request_timeout, Duration::from_secs(3));
        assert_eq!(cfg.cache.max_size, 20);
        assert_eq!(cfg.cache.cache_duration, Duration::from_secs(600));
        assert_eq!(cfg.cache.min_fetch_interval, Duration::from_secs(90));
        assert_eq!(cfg.cache.max_usage_count, 3);
        assert_eq!(cfg.logging.sinks.len(), 2);
        assert!(matches!(
            cfg.logging.sinks[1],
            LogSink::File {
                rotation: FileRotation::Hourly,
                max_files: 4,
                ..
            }
        ));
    }

    #[test]
    fn test_env_overrides_file_values() {
        let file = write_config(
            r#"
source:
  base_url: "http://localhost:5000/api/advertisements/"
  connect_timeout: 1s
server:
  workers: 1
"#,
        );

        // keys no other test asserts on, tests share the process env
        unsafe {
            std::env::set_var("FITADS__SERVER__WORKERS", "3");
            std::env::set_var("FITADS__SOURCE__CONNECT_TIMEOUT", "7s");
        }

        let result = FitadsConfig::load(file.path());

        unsafe {
            std::env::remove_var("FITADS__SERVER__WORKERS");
            std::env::remove_var("FITADS__SOURCE__CONNECT_TIMEOUT");
        }

        let cfg = result.unwrap();
        assert_eq!(cfg.server.workers, 3);
        assert_eq!(cfg.source.connect_timeout, Duration::from_secs(7));
        assert_eq!(cfg.source.bulk_limit, 5);
    }

    #[test]
    fn test_rejects_zero_cache_size() {
        let file = write_config(
            r#"
source:
  base_url: "http://localhost:5000/api/advertisements/"
cache:
  max_size: 0
"#,
        );

        assert!(FitadsConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_rejects_bad_base_url() {
        let file = write_config(
            r#"
source:
  base_url: "not a url"
"#,
        );

        assert!(FitadsConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_logging_validation() {
        let mut logging = LoggingConfig::default();
        assert!(logging.validate().is_ok());

        logging.level = "loud".into();
        assert!(logging.validate().is_err());

        logging.level = "warn".into();
        logging.span_sample_rate = 1.5;
        assert!(logging.validate().is_err());

        logging.span_sample_rate = 0.5;
        logging.sinks.clear();
        assert!(logging.validate().is_err());
    }
}

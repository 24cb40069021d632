use crate::core::models::campaign::Campaign;
use crate::core::models::source::CampaignSource;
use crate::core::providers::SourcesConfig;
use config::Config;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Public base URL partners and exchanges reach us on; rendered
    /// into notice URLs and S2S tracking links.
    pub external_url: String,
    /// Auction deadline when the bid request carries no tmax.
    pub tmax_default_ms: u64,
    /// Deadline for S2S ad requests.
    pub s2s_deadline_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
            external_url: "http://localhost:8080".to_string(),
            tmax_default_ms: 200,
            s2s_deadline_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
#[serde(default)]
pub struct CacheConfig {
    pub geo_entries: u64,
    #[serde(with = "humantime_serde")]
    pub geo_ttl: Duration,
    pub device_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            geo_entries: 100_000,
            geo_ttl: Duration::from_secs(6 * 3600),
            device_entries: 250_000,
        }
    }
}

/// Which backing store the pacing engine runs on.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PacingBackend {
    #[default]
    Memory,
    Redis {
        url: String,
    },
}

/// Where click/impression/conversion records live. Memory suits a
/// single node and tests; redis survives restarts and is shared
/// across replicas, with retention enforced by key expiry.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EventsBackend {
    #[default]
    Memory,
    Redis {
        url: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
#[serde(default)]
pub struct OutboundConfig {
    /// Concurrent fire-and-forget calls before drops start.
    pub max_inflight: usize,
    #[serde(with = "humantime_serde")]
    pub view_ping_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub postback_timeout: Duration,
}

impl Default for OutboundConfig {
    fn default() -> Self {
        Self {
            max_inflight: 512,
            view_ping_timeout: Duration::from_secs(5),
            postback_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
#[serde(default)]
pub struct AttributionConfig {
    /// How long clicks stay reconcilable.
    #[serde(with = "humantime_serde")]
    pub click_retention: Duration,
    #[serde(with = "humantime_serde")]
    pub conversion_retention: Duration,
}

impl Default for AttributionConfig {
    fn default() -> Self {
        Self {
            click_retention: Duration::from_secs(30 * 86400),
            conversion_retention: Duration::from_secs(365 * 86400),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileRotation {
    Daily,
    Hourly,
    Never,
}

impl Default for FileRotation {
    fn default() -> Self {
        FileRotation::Daily
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LogSink {
    Stdout {
        #[serde(default)]
        json: bool,
    },
    File {
        path: PathBuf,
        #[serde(default)]
        json: bool,
        #[serde(default)]
        rotation: FileRotation,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub sinks: Vec<LogSink>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            sinks: vec![LogSink::Stdout { json: false }],
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.sinks.is_empty() {
            anyhow::bail!("at least one logging sink must be configured");
        }
        self.level.parse::<tracing::Level>().map_err(|_| {
            anyhow::anyhow!(
                "invalid log level '{}', valid: trace, debug, info, warn, error",
                self.level
            )
        })?;
        Ok(())
    }
}

/// Seed catalog for file-driven deployments: campaigns, supply sources
/// and the links binding them.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CatalogConfig {
    pub campaigns: Vec<Campaign>,
    pub sources: SourcesConfig,
    pub links: Vec<CampaignSource>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct KiteConfig {
    pub server: ServerConfig,
    pub caches: CacheConfig,
    pub pacing: PacingBackend,
    pub events: EventsBackend,
    pub outbound: OutboundConfig,
    pub attribution: AttributionConfig,
    pub logging: LoggingConfig,
    pub catalog: CatalogConfig,
}

impl KiteConfig {
    pub fn load(path: &PathBuf) -> Result<KiteConfig, anyhow::Error> {
        let cfg = Config::builder()
            .add_source(config::File::from(path.to_path_buf()))
            .build()?;

        Ok(cfg.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = KiteConfig::default();
        assert_eq!(cfg.server.bind, "0.0.0.0:8080");
        assert!(matches!(cfg.pacing, PacingBackend::Memory));
        assert!(cfg.logging.validate().is_ok());
    }

    #[test]
    fn bad_log_level_rejected() {
        let logging = LoggingConfig {
            level: "loud".into(),
            ..Default::default()
        };
        assert!(logging.validate().is_err());
    }

    #[test]
    fn pacing_backend_tagged_form() {
        let backend: PacingBackend =
            serde_json::from_str(r#"{"type":"redis","url":"redis://cache:6379"}"#).unwrap();
        assert!(matches!(backend, PacingBackend::Redis { .. }));
    }
}

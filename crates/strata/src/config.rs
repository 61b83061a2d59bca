use std::{env, path::PathBuf, str::FromStr, time::Duration};

use strata_core::{
    bus::{BusError, NameMapping},
    cache::{CacheKeys, DEFAULT_NAMESPACE},
    object_store::{ObjectLayout, DEFAULT_BUCKET, DEFAULT_FOLDER, DEFAULT_PREFIX},
};
use thiserror::Error;

use crate::bus::PubSubSettings;

/// Errors raised while reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var}: {source}")]
    InvalidMapping {
        var: &'static str,
        #[source]
        source: BusError,
    },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Forward dispatched events to the external bus (default: false)
    pub enable_publishing: bool,
    /// Run external subscriptions in `strata consume` (default: false)
    pub enable_consuming: bool,
    /// Event type name to topic overrides
    pub topic_mappings: NameMapping,
    /// Logical subscription name to transport subscription overrides
    pub subscription_mappings: NameMapping,
    /// Name reported in the `source` attribute of published events (default: "strata")
    pub service_name: String,
    /// Consumer name inside every Redis Streams group; keep it stable per
    /// replica so pending entries survive a restart (default: `service_name`)
    pub consumer_name: String,
    /// Snapshot cache TTL in seconds, absolute (default: 86,400)
    pub cache_ttl_seconds: u64,
    /// Maximum number of cache entries (default: 1,000)
    pub cache_max_entries: usize,
    /// Prefix of every cache key (default: "strata")
    pub cache_namespace: String,
    /// Object store bucket (default: "strata-snapshots")
    pub bucket_name: String,
    /// Folder inside the bucket (default: "snapshots")
    pub folder_path: String,
    /// Exported file name prefix (default: "snapshot")
    pub file_prefix: String,
    /// Root directory of the filesystem object store (default: "./local-storage")
    pub storage_root: PathBuf,
    /// Pending export jobs before new ones are dropped (default: 16)
    pub export_queue_capacity: usize,
    /// Upper bound for each shutdown step in seconds (default: 5)
    pub shutdown_timeout_seconds: u64,
    /// Deliveries of a rejected message before the bus transport dead-letters it,
    /// in memory or on Redis Streams (default: 5)
    pub max_delivery_attempts: u32,
    /// Path to SQLite database file (default: "strata.db")
    /// Note: Only used when the `sqlite` feature is enabled.
    #[allow(dead_code)]
    pub sqlite_path: String,
    /// Redis connection URL (default: "redis://localhost:6379")
    /// Note: Only used when the `redis` feature is enabled.
    #[allow(dead_code)]
    pub redis_url: String,
    /// Emit logs as JSON lines instead of human-readable text (default: false)
    pub log_json: bool,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `STRATA_ENABLE_PUBLISHING` / `STRATA_ENABLE_CONSUMING` - `true`/`1`/`yes` to enable
    /// - `STRATA_TOPIC_MAPPINGS` - `EventType=topic,...`
    /// - `STRATA_SUBSCRIPTION_MAPPINGS` - `name=subscription,...`
    /// - `STRATA_SERVICE_NAME` - event source name (default: "strata")
    /// - `STRATA_CACHE_TTL_SECONDS` - cache TTL (default: 86400)
    /// - `STRATA_CACHE_MAX_ENTRIES` - maximum cache entries (default: 1000)
    /// - `STRATA_CACHE_NAMESPACE` - cache key prefix (default: "strata")
    /// - `STRATA_BUCKET_NAME` / `STRATA_FOLDER_PATH` / `STRATA_FILE_PREFIX` - object layout
    /// - `STRATA_STORAGE_ROOT` - local object store root (default: "./local-storage")
    /// - `STRATA_EXPORT_QUEUE_CAPACITY` - export backlog (default: 16)
    /// - `STRATA_SHUTDOWN_TIMEOUT_SECONDS` - shutdown bound (default: 5)
    /// - `STRATA_CONSUMER_NAME` - Redis Streams consumer name (default: service name)
    /// - `STRATA_MAX_DELIVERY_ATTEMPTS` - deliveries before dead-lettering (default: 5)
    /// - `STRATA_SQLITE_PATH` - SQLite database path (default: "strata.db")
    /// - `REDIS_URL` - Redis connection URL (default: "redis://localhost:6379")
    /// - `STRATA_LOG_JSON` - JSON log output
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |key: &str| lookup(key).map(|v| parse_flag(&v)).unwrap_or(false);
        let string = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let mapping = |key: &'static str| {
            lookup(key)
                .map(|v| NameMapping::parse(&v))
                .transpose()
                .map(Option::unwrap_or_default)
                .map_err(|source| ConfigError::InvalidMapping { var: key, source })
        };

        let service_name = string("STRATA_SERVICE_NAME", "strata");
        Ok(Self {
            enable_publishing: flag("STRATA_ENABLE_PUBLISHING"),
            enable_consuming: flag("STRATA_ENABLE_CONSUMING"),
            topic_mappings: mapping("STRATA_TOPIC_MAPPINGS")?,
            subscription_mappings: mapping("STRATA_SUBSCRIPTION_MAPPINGS")?,
            consumer_name: string("STRATA_CONSUMER_NAME", &service_name),
            service_name,
            cache_ttl_seconds: parse_var(&lookup, "STRATA_CACHE_TTL_SECONDS").unwrap_or(86_400),
            cache_max_entries: parse_var(&lookup, "STRATA_CACHE_MAX_ENTRIES").unwrap_or(1_000),
            cache_namespace: string("STRATA_CACHE_NAMESPACE", DEFAULT_NAMESPACE),
            bucket_name: string("STRATA_BUCKET_NAME", DEFAULT_BUCKET),
            folder_path: string("STRATA_FOLDER_PATH", DEFAULT_FOLDER),
            file_prefix: string("STRATA_FILE_PREFIX", DEFAULT_PREFIX),
            storage_root: PathBuf::from(string("STRATA_STORAGE_ROOT", "./local-storage")),
            export_queue_capacity: parse_var(&lookup, "STRATA_EXPORT_QUEUE_CAPACITY")
                .filter(|c: &usize| *c > 0)
                .unwrap_or(16),
            shutdown_timeout_seconds: parse_var(&lookup, "STRATA_SHUTDOWN_TIMEOUT_SECONDS")
                .unwrap_or(5),
            max_delivery_attempts: parse_var(&lookup, "STRATA_MAX_DELIVERY_ATTEMPTS")
                .filter(|n: &u32| *n > 0)
                .unwrap_or(5),
            sqlite_path: string("STRATA_SQLITE_PATH", "strata.db"),
            redis_url: string("REDIS_URL", "redis://localhost:6379"),
            log_json: flag("STRATA_LOG_JSON"),
        })
    }

    /// Get cache TTL as a Duration.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }

    pub fn cache_keys(&self) -> CacheKeys {
        CacheKeys::new(&self.cache_namespace)
    }

    pub fn object_layout(&self) -> ObjectLayout {
        ObjectLayout::new(&self.bucket_name, &self.folder_path, &self.file_prefix)
    }

    pub fn pubsub_settings(&self) -> PubSubSettings {
        PubSubSettings {
            source: self.service_name.clone(),
            topic_mappings: self.topic_mappings.clone(),
            subscription_mappings: self.subscription_mappings.clone(),
            shutdown_timeout: self.shutdown_timeout(),
        }
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|v| v.trim().parse().ok())
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = config_from(&[]).unwrap();

        assert!(!config.enable_publishing);
        assert!(!config.enable_consuming);
        assert!(config.topic_mappings.is_empty());
        assert_eq!(config.service_name, "strata");
        assert_eq!(config.consumer_name, "strata");
        assert_eq!(config.cache_ttl(), Duration::from_secs(86_400));
        assert_eq!(config.cache_max_entries, 1_000);
        assert_eq!(config.bucket_name, "strata-snapshots");
        assert_eq!(config.folder_path, "snapshots");
        assert_eq!(config.file_prefix, "snapshot");
        assert_eq!(config.storage_root, PathBuf::from("./local-storage"));
        assert_eq!(config.export_queue_capacity, 16);
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(5));
        assert_eq!(config.max_delivery_attempts, 5);
        assert_eq!(config.sqlite_path, "strata.db");
        assert_eq!(config.redis_url, "redis://localhost:6379");
        assert!(!config.log_json);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("STRATA_ENABLE_PUBLISHING", "TRUE"),
            ("STRATA_ENABLE_CONSUMING", "1"),
            ("STRATA_TOPIC_MAPPINGS", "ObservationCreatedEvent=observations"),
            ("STRATA_CACHE_TTL_SECONDS", "60"),
            ("STRATA_CACHE_NAMESPACE", "tenant"),
            ("STRATA_FILE_PREFIX", "taxonomy"),
        ])
        .unwrap();

        assert!(config.enable_publishing);
        assert!(config.enable_consuming);
        assert_eq!(
            config.topic_mappings.topic_for("ObservationCreatedEvent"),
            "observations"
        );
        assert_eq!(config.cache_ttl(), Duration::from_secs(60));
        assert_eq!(config.cache_keys().namespace(), "tenant");
        assert_eq!(config.object_layout().prefix, "taxonomy");
    }

    #[test]
    fn test_pubsub_settings() {
        let config = config_from(&[
            ("STRATA_SERVICE_NAME", "observations-api"),
            ("STRATA_SUBSCRIPTION_MAPPINGS", "sync=observations-sync"),
            ("STRATA_SHUTDOWN_TIMEOUT_SECONDS", "2"),
        ])
        .unwrap();

        let settings = config.pubsub_settings();

        assert_eq!(settings.source, "observations-api");
        assert_eq!(
            settings.subscription_mappings.subscription_for("sync"),
            "observations-sync"
        );
        assert_eq!(settings.shutdown_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_consumer_name() {
        let config = config_from(&[("STRATA_SERVICE_NAME", "observations-api")]).unwrap();
        assert_eq!(config.consumer_name, "observations-api");

        let config = config_from(&[
            ("STRATA_SERVICE_NAME", "observations-api"),
            ("STRATA_CONSUMER_NAME", "observations-api-0"),
        ])
        .unwrap();
        assert_eq!(config.consumer_name, "observations-api-0");
    }

    #[test]
    fn test_unparseable_numbers_fall_back() {
        let config = config_from(&[
            ("STRATA_CACHE_TTL_SECONDS", "a day"),
            ("STRATA_EXPORT_QUEUE_CAPACITY", "0"),
        ])
        .unwrap();

        assert_eq!(config.cache_ttl_seconds, 86_400);
        assert_eq!(config.export_queue_capacity, 16);
    }

    #[test]
    fn test_flag_values() {
        for value in ["true", "1", "yes", "On"] {
            assert!(parse_flag(value), "{value} should enable");
        }
        for value in ["false", "0", "", "enabled"] {
            assert!(!parse_flag(value), "{value} should not enable");
        }
    }

    #[test]
    fn test_invalid_mapping_is_error() {
        let error = config_from(&[("STRATA_TOPIC_MAPPINGS", "missing-equals")]).unwrap_err();
        assert_eq!(
            error.to_string(),
            "STRATA_TOPIC_MAPPINGS: Invalid name mapping entry: missing-equals"
        );
    }
}

//! Mapsync configuration types and loading

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::transport::NodeHandle;
use crate::transport::frame::DEFAULT_MAX_FRAME_SIZE;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// This node's id, reported as the originating node of notifications
    #[serde(rename = "node-id")]
    pub node_id: String,

    /// Address the coordinator listens on
    #[serde(rename = "listen-addr")]
    pub listen_addr: String,

    /// Coordinator address for workers; absent means no coordinator is known
    #[serde(rename = "coordinator-addr")]
    pub coordinator_addr: Option<String>,

    /// Connect/read/write timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Largest accepted frame body in bytes
    #[serde(rename = "max-frame-size")]
    pub max_frame_size: usize,

    /// Pending reconciliation tasks the coordinator will hold
    #[serde(rename = "queue-capacity")]
    pub queue_capacity: usize,

    /// Resources the coordinator knows about, name → current instance id
    pub resources: BTreeMap<String, String>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            listen_addr: "127.0.0.1:9340".to_string(),
            coordinator_addr: None,
            timeout_ms: 5000,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            queue_capacity: 1024,
            resources: BTreeMap::new(),
            log_level: None,
        }
    }
}

fn default_node_id() -> String {
    format!("node-{}", uuid::Uuid::now_v7())
}

impl Config {
    /// Config files searched when no explicit path is given, most specific first:
    /// `./.mapsync.yml`, then `<config dir>/mapsync/mapsync.yml`
    pub fn search_paths() -> Vec<PathBuf> {
        [
            Some(PathBuf::from(".mapsync.yml")),
            dirs::config_dir().map(|d| d.join("mapsync").join("mapsync.yml")),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// Load configuration
    ///
    /// An explicit path must load. Otherwise the first search path that exists
    /// and parses wins; unreadable candidates are skipped with a warning.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let loaded = Self::search_paths()
            .into_iter()
            .filter(|path| path.exists())
            .find_map(|path| match Self::load_from_file(&path) {
                Ok(config) => Some(config),
                Err(e) => {
                    tracing::warn!("Skipping config {}: {:#}", path.display(), e);
                    None
                }
            });

        Ok(loaded.unwrap_or_else(|| {
            tracing::info!("No config file found, using defaults");
            Self::default()
        }))
    }

    /// Read only the log level, before logging is set up
    ///
    /// Errors are swallowed; full loading reports them once logging works.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let path = match config_path {
            Some(path) => path.clone(),
            None => Self::search_paths().into_iter().find(|p| p.exists())?,
        };
        let content = fs::read_to_string(path).ok()?;
        let config: Self = serde_yaml::from_str(&content).ok()?;
        config.log_level
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Coordinator from configuration; `override_addr` wins when given
    pub fn coordinator(&self, override_addr: Option<&str>) -> Option<NodeHandle> {
        let addr = override_addr.or(self.coordinator_addr.as_deref())?;
        debug!(%addr, "Config::coordinator: resolved");
        Some(NodeHandle::new(addr, addr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.node_id.starts_with("node-"));
        assert_eq!(config.listen_addr, "127.0.0.1:9340");
        assert!(config.coordinator_addr.is_none());
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.max_frame_size, 64 * 1024);
        assert_eq!(config.queue_capacity, 1024);
        assert!(config.resources.is_empty());
    }

    #[test]
    fn test_load_from_explicit_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("mapsync.yml");
        std::fs::write(
            &path,
            r#"
node-id: worker-3
coordinator-addr: 10.0.0.1:9340
timeout-ms: 250
log-level: DEBUG
resources:
  logs-2024: inst-42
"#,
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.node_id, "worker-3");
        assert_eq!(config.coordinator_addr.as_deref(), Some("10.0.0.1:9340"));
        assert_eq!(config.timeout(), Duration::from_millis(250));
        assert_eq!(config.resources.get("logs-2024").map(String::as_str), Some("inst-42"));
        // unspecified fields keep their defaults
        assert_eq!(config.queue_capacity, 1024);

        assert_eq!(Config::load_log_level(Some(&path)).as_deref(), Some("DEBUG"));
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("absent.yml");
        assert!(Config::load(Some(&path)).is_err());
        assert!(Config::load_log_level(Some(&path)).is_none());
    }

    #[test]
    fn test_search_paths_prefer_project_local() {
        let paths = Config::search_paths();
        assert_eq!(paths[0], PathBuf::from(".mapsync.yml"));
        assert!(paths.iter().skip(1).all(|p| p.ends_with("mapsync/mapsync.yml")));
    }

    #[test]
    fn test_explicit_file_with_bad_yaml_fails() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("mapsync.yml");
        std::fs::write(&path, "timeout-ms: [not, a, number]\n").unwrap();

        let err = Config::load(Some(&path)).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse config file"));
        assert!(Config::load_log_level(Some(&path)).is_none());
    }

    #[test]
    fn test_coordinator_resolution() {
        let mut config = Config::default();
        assert!(config.coordinator(None).is_none());

        config.coordinator_addr = Some("10.0.0.1:9340".to_string());
        assert_eq!(config.coordinator(None).unwrap().address(), "10.0.0.1:9340");
        assert_eq!(config.coordinator(Some("10.0.0.9:1")).unwrap().address(), "10.0.0.9:1");
    }
}

//! Backend selection and graph settings
//!
//! Configuration comes either from a flat settings map (as handed over by an
//! application's own config system) or from a YAML file:
//!
//! ```yaml
//! backend:
//!   type: rocksdb
//!   path: /var/lib/widegraph
//! default_count: 100
//! ```

use crate::backend::{AnyBackend, MemoryBackend, RocksBackend, StorageError, DEFAULT_COLUMN_COUNT};
use crate::graph::GraphStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Prefix used for settings keys when the caller has no namespace of its own
pub const DEFAULT_SETTINGS_PREFIX: &str = "widegraph.";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Required setting absent or unparsable
    #[error("Missing or invalid setting: {0}")]
    Missing(String),

    #[error("Unknown backend: {0}")]
    UnknownBackend(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Which storage substrate to open
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    Memory,
    #[serde(rename = "rocksdb")]
    RocksDb { path: PathBuf },
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Memory
    }
}

/// Graph store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub backend: BackendConfig,
    /// Relationship count used when callers have no limit of their own
    pub default_count: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::Memory,
            default_count: DEFAULT_COLUMN_COUNT,
        }
    }
}

impl GraphConfig {
    /// Read `<prefix>backend`, `<prefix>path` and `<prefix>default_count`.
    ///
    /// Without a `backend` key, a `keyspace` of `memory` still selects the
    /// in-memory backend.
    pub fn from_settings(settings: &HashMap<String, String>, prefix: &str) -> ConfigResult<Self> {
        let setting = |name: &str| settings.get(&format!("{}{}", prefix, name));

        let backend = match setting("backend").map(String::as_str) {
            Some("memory") => BackendConfig::Memory,
            Some("rocksdb") => {
                let path = setting("path")
                    .ok_or_else(|| ConfigError::Missing(format!("{}path", prefix)))?;
                BackendConfig::RocksDb { path: PathBuf::from(path) }
            }
            Some(other) => return Err(ConfigError::UnknownBackend(other.to_string())),
            None => match setting("keyspace").map(String::as_str) {
                Some("memory") => BackendConfig::Memory,
                _ => return Err(ConfigError::Missing(format!("{}backend", prefix))),
            },
        };

        let default_count = match setting("default_count") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::Missing(format!("{}default_count", prefix)))?,
            None => DEFAULT_COLUMN_COUNT,
        };

        Ok(Self { backend, default_count })
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&raw)?)
    }

    /// Open the configured backend and wrap it in a graph store
    pub fn open(self) -> ConfigResult<GraphStore<AnyBackend>> {
        let backend = match &self.backend {
            BackendConfig::Memory => {
                info!("Opening in-memory graph backend");
                AnyBackend::Memory(MemoryBackend::new())
            }
            BackendConfig::RocksDb { path } => AnyBackend::Rocks(RocksBackend::open(path)?),
        };
        Ok(GraphStore::with_config(backend, self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn settings(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_default_config() {
        let config = GraphConfig::default();
        assert_eq!(config.backend, BackendConfig::Memory);
        assert_eq!(config.default_count, 100);
    }

    #[test]
    fn test_from_settings() {
        let config = GraphConfig::from_settings(
            &settings(&[
                ("graph.backend", "rocksdb"),
                ("graph.path", "/tmp/g"),
                ("graph.default_count", "25"),
            ]),
            "graph.",
        )
        .unwrap();
        assert_eq!(config.backend, BackendConfig::RocksDb { path: PathBuf::from("/tmp/g") });
        assert_eq!(config.default_count, 25);

        let legacy = GraphConfig::from_settings(
            &settings(&[("widegraph.keyspace", "memory")]),
            DEFAULT_SETTINGS_PREFIX,
        )
        .unwrap();
        assert_eq!(legacy.backend, BackendConfig::Memory);
    }

    #[test]
    fn test_from_settings_errors() {
        let missing_path =
            GraphConfig::from_settings(&settings(&[("x.backend", "rocksdb")]), "x.");
        assert!(matches!(missing_path, Err(ConfigError::Missing(_))));

        let unknown = GraphConfig::from_settings(&settings(&[("x.backend", "cassandra")]), "x.");
        assert!(matches!(unknown, Err(ConfigError::UnknownBackend(_))));

        let bad_count = GraphConfig::from_settings(
            &settings(&[("x.backend", "memory"), ("x.default_count", "lots")]),
            "x.",
        );
        assert!(matches!(bad_count, Err(ConfigError::Missing(_))));

        assert!(GraphConfig::from_settings(&HashMap::new(), "x.").is_err());
    }

    #[test]
    fn test_from_yaml_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("graph.yaml");
        std::fs::write(
            &file,
            "backend:\n  type: rocksdb\n  path: /data/graph\ndefault_count: 10\n",
        )
        .unwrap();
        let config = GraphConfig::from_yaml_file(&file).unwrap();
        assert_eq!(config.backend, BackendConfig::RocksDb { path: PathBuf::from("/data/graph") });
        assert_eq!(config.default_count, 10);

        std::fs::write(&file, "backend:\n  type: memory\n").unwrap();
        let config = GraphConfig::from_yaml_file(&file).unwrap();
        assert_eq!(config, GraphConfig::default());
    }

    #[test]
    fn test_open_rocksdb() {
        let dir = TempDir::new().unwrap();
        let config = GraphConfig {
            backend: BackendConfig::RocksDb { path: dir.path().join("db") },
            default_count: 5,
        };
        let store = config.open().unwrap();
        assert!(matches!(store.backend(), AnyBackend::Rocks(_)));
        assert_eq!(store.config().default_count, 5);
    }
}

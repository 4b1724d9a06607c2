use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SqlTxnError;
use crate::sqlite::config::{
    DEFAULT_BUSY_TIMEOUT, DEFAULT_CONNECTION_TIMEOUT, DEFAULT_MAX_SIZE, SqliteOptions,
};

/// One named data source as written in a registry file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataSourceConfig {
    pub db_path: String,
    #[serde(default = "default_max_size")]
    pub max_size: u32,
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    #[serde(default = "default_wal")]
    pub wal: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_template: Option<String>,
}

fn default_max_size() -> u32 {
    DEFAULT_MAX_SIZE
}

fn default_connection_timeout_ms() -> u64 {
    u64::try_from(DEFAULT_CONNECTION_TIMEOUT.as_millis()).unwrap_or(u64::MAX)
}

fn default_busy_timeout_ms() -> u64 {
    u64::try_from(DEFAULT_BUSY_TIMEOUT.as_millis()).unwrap_or(u64::MAX)
}

fn default_wal() -> bool {
    true
}

impl From<DataSourceConfig> for SqliteOptions {
    fn from(cfg: DataSourceConfig) -> Self {
        let mut opts = SqliteOptions::new(cfg.db_path);
        opts.max_size = cfg.max_size;
        opts.connection_timeout = Duration::from_millis(cfg.connection_timeout_ms);
        opts.busy_timeout = Duration::from_millis(cfg.busy_timeout_ms);
        opts.wal = cfg.wal;
        if let Some(template) = cfg.sequence_template {
            opts.sequence_template = template;
        }
        opts
    }
}

/// Named data sources, resolved once when an executor is constructed.
///
/// ```rust
/// use sql_txn::DataSourceRegistry;
///
/// let registry = DataSourceRegistry::from_json(r#"{
///     "orders": { "db_path": "orders.db", "max_size": 4 }
/// }"#).unwrap();
/// assert_eq!(registry.resolve("orders").unwrap().max_size, 4);
/// assert!(registry.resolve("billing").is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataSourceRegistry {
    sources: BTreeMap<String, DataSourceConfig>,
}

impl DataSourceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a registry from a JSON object keyed by data source name.
    ///
    /// # Errors
    /// Returns `SqlTxnError::ConfigError` if the document is malformed.
    pub fn from_json(json: &str) -> Result<Self, SqlTxnError> {
        serde_json::from_str(json)
            .map_err(|e| SqlTxnError::ConfigError(format!("invalid data source registry: {e}")))
    }

    /// Read and parse a registry file.
    ///
    /// # Errors
    /// Returns `SqlTxnError::ConfigError` if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SqlTxnError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            SqlTxnError::ConfigError(format!("cannot read registry {}: {e}", path.display()))
        })?;
        Self::from_json(&raw)
    }

    /// Register or replace a data source.
    pub fn insert(&mut self, name: impl Into<String>, config: DataSourceConfig) {
        self.sources.insert(name.into(), config);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    /// Look up `name` and turn its entry into validated pool options.
    ///
    /// # Errors
    /// Returns `SqlTxnError::ResolutionError` if no source has that name, or
    /// `SqlTxnError::ConfigError` if its entry is invalid.
    pub fn resolve(&self, name: &str) -> Result<SqliteOptions, SqlTxnError> {
        let cfg = self.sources.get(name).ok_or_else(|| {
            SqlTxnError::ResolutionError(format!("no data source named {name:?}"))
        })?;
        let opts = SqliteOptions::from(cfg.clone());
        opts.validate()?;
        Ok(opts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_defaults_for_missing_fields() -> Result<(), SqlTxnError> {
        let registry = DataSourceRegistry::from_json(r#"{"main": {"db_path": "main.db"}}"#)?;
        let opts = registry.resolve("main")?;
        assert_eq!(opts.db_path, "main.db");
        assert_eq!(opts.max_size, DEFAULT_MAX_SIZE);
        assert_eq!(opts.busy_timeout, DEFAULT_BUSY_TIMEOUT);
        assert!(opts.wal);
        Ok(())
    }

    #[test]
    fn unknown_name_is_a_resolution_error() {
        let registry = DataSourceRegistry::new();
        assert!(matches!(
            registry.resolve("missing"),
            Err(SqlTxnError::ResolutionError(_))
        ));
    }

    #[test]
    fn rejects_unknown_fields_and_bad_entries() -> Result<(), SqlTxnError> {
        assert!(matches!(
            DataSourceRegistry::from_json(r#"{"a": {"db_path": "a.db", "pool": 3}}"#),
            Err(SqlTxnError::ConfigError(_))
        ));

        let registry =
            DataSourceRegistry::from_json(r#"{"a": {"db_path": "a.db", "max_size": 0}}"#)?;
        assert!(matches!(
            registry.resolve("a"),
            Err(SqlTxnError::ConfigError(_))
        ));
        Ok(())
    }

    #[test]
    fn round_trips_through_serde() -> Result<(), SqlTxnError> {
        let mut registry = DataSourceRegistry::new();
        registry.insert(
            "ledger",
            DataSourceConfig {
                db_path: "ledger.db".into(),
                max_size: 3,
                connection_timeout_ms: 1_000,
                busy_timeout_ms: 250,
                wal: false,
                sequence_template: Some("SELECT next_id FROM {name}".into()),
            },
        );
        let json = serde_json::to_string(&registry)
            .map_err(|e| SqlTxnError::ConfigError(e.to_string()))?;
        assert_eq!(DataSourceRegistry::from_json(&json)?, registry);
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["ledger"]);
        Ok(())
    }
}

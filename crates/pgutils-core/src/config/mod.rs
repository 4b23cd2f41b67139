//! Configuration types for pgutils.
//!
//! A single YAML file carries the connection settings and, optionally, the
//! relation map used to name schemas, tables and columns:
//!
//! ```yaml
//! connection:
//!   host: localhost
//!   port: 5432
//!   dbname: gis
//!   user: gis
//!   password_env: PGUTILS_PASSWORD
//!
//! relations:
//!   schema: tile_index
//!   table: bag_index_test
//!   fields:
//!     geometry: geom
//! ```

pub mod connection;

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::CoreError;
use crate::relation::RelationMap;

pub use connection::{ConnectionConfig, ConnectionParams, Dsn};

/// Complete pgutils configuration loaded from a file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PgUtilsConfig {
    /// Database connection settings.
    #[serde(default)]
    pub connection: Option<ConnectionConfig>,

    /// Named relations.
    #[serde(default)]
    pub relations: Option<RelationMap>,
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid DSN at position {position}: {message}")]
    InvalidDsn { position: usize, message: String },

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PgUtilsConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    /// The relation map, or an error naming the missing section.
    pub fn relations(&self) -> Result<&RelationMap, ConfigError> {
        self.relations
            .as_ref()
            .ok_or_else(|| ConfigError::Config("no 'relations' section in configuration".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CONFIG: &str = r#"
connection:
  host: localhost
  port: 5432
  dbname: gis
  user: gis
relations:
  schema: tile_index
  table: bag_index_test
  fields:
    geometry: geom
"#;

    #[test]
    fn test_from_yaml() {
        let config = PgUtilsConfig::from_yaml(CONFIG).unwrap();
        let Some(ConnectionConfig::Params(params)) = &config.connection else {
            panic!("expected discrete connection params");
        };
        assert_eq!(params.dbname.as_deref(), Some("gis"));

        let relations = config.relations().unwrap();
        let table = (relations.field("schema").unwrap() + relations.field("table").unwrap())
            .unwrap();
        assert_eq!(table.render(), "\"tile_index\".\"bag_index_test\"");
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CONFIG.as_bytes()).unwrap();
        let config = PgUtilsConfig::from_file(file.path()).unwrap();
        assert!(config.connection.is_some());
        assert!(config.relations.is_some());
    }

    #[test]
    fn test_empty_config() {
        let config = PgUtilsConfig::from_yaml("{}").unwrap();
        assert!(config.connection.is_none());
        assert!(matches!(config.relations(), Err(ConfigError::Config(_))));
    }

    #[test]
    fn test_invalid_relation_leaf_is_reported() {
        let err = PgUtilsConfig::from_yaml("relations:\n  table: ''\n").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
        assert!(err.to_string().contains("identifier cannot be empty"));
    }

    #[test]
    fn test_missing_file() {
        let err = PgUtilsConfig::from_file("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}

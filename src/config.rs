use serde::{Deserialize, Serialize};

use crate::affinity::Affinity;
use crate::column::ColumnType;
use crate::error::{Error, Result};

/// Engine-wide settings shared by a database and its tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Name of the primary key synthesized for tables that declare none.
    #[serde(default = "default_rowid_column")]
    pub rowid_column: String,

    /// First key issued by the autoincrement cursor of a fresh table.
    #[serde(default = "default_autoincrement_start")]
    pub autoincrement_start: i64,

    /// Strictness given to columns declared through [Config::column].
    #[serde(default)]
    pub strict_by_default: bool,
}

fn default_rowid_column() -> String {
    "rowid".to_string()
}

fn default_autoincrement_start() -> i64 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rowid_column: default_rowid_column(),
            autoincrement_start: default_autoincrement_start(),
            strict_by_default: false,
        }
    }
}

impl Config {
    /// Parses a JSON document. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.rowid_column.trim().is_empty() {
            return Err(Error::Config("rowid_column cannot be empty".into()));
        }
        Ok(())
    }

    /// Declares a column with this configuration's default strictness.
    pub fn column(&self, name: impl Into<String>, affinity: Affinity) -> ColumnType {
        ColumnType::new(name, affinity).strict(self.strict_by_default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.rowid_column, "rowid");
        assert_eq!(config.autoincrement_start, 1);
        assert!(!config.strict_by_default);
    }

    #[test]
    fn test_from_json_partial() {
        let config = Config::from_json(r#"{ "autoincrement_start": 100 }"#).unwrap();
        assert_eq!(config.autoincrement_start, 100);
        assert_eq!(config.rowid_column, "rowid");
    }

    #[test]
    fn test_from_json_invalid() {
        assert!(matches!(Config::from_json("{"), Err(Error::Config(_))));
        assert!(matches!(
            Config::from_json(r#"{ "rowid_column": " " }"#),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_column_strictness() {
        let config = Config {
            strict_by_default: true,
            ..Config::default()
        };
        assert!(config.column("a", Affinity::Text).is_strict());
        assert!(!Config::default().column("a", Affinity::Text).is_strict());
    }
}

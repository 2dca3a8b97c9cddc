use crate::constants::*;
use crate::error::{EtlError, Result};
use crate::types::TableSelector;
use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Run configuration. Every field falls back to its default when absent from the file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source_url: String,
    /// Local path or http(s) URL of the `Currency,Rate` file
    pub rate_source: String,
    pub csv_output_path: String,
    pub db_path: String,
    pub table_name: String,
    pub log_path: String,
    pub fetch_timeout_secs: u64,
    pub row_limit: usize,
    pub table_selector: TableSelector,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_url: DEFAULT_SOURCE_URL.to_string(),
            rate_source: DEFAULT_RATE_SOURCE.to_string(),
            csv_output_path: DEFAULT_CSV_OUTPUT_PATH.to_string(),
            db_path: DEFAULT_DB_PATH.to_string(),
            table_name: DEFAULT_TABLE_NAME.to_string(),
            log_path: DEFAULT_LOG_PATH.to_string(),
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            row_limit: DEFAULT_ROW_LIMIT,
            table_selector: TableSelector::default(),
        }
    }
}

impl Config {
    /// Loads the TOML file at `config_path` if it exists, then applies env overrides.
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        let config_path = config_path.as_ref();
        let mut config = if config_path.exists() {
            let config_content = fs::read_to_string(config_path).map_err(|e| {
                EtlError::Config(format!(
                    "Failed to read config file '{}': {}",
                    config_path.display(),
                    e
                ))
            })?;
            Self::from_toml(&config_content)?
        } else {
            debug!("No config file at {}, using defaults", config_path.display());
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn apply_env(&mut self) {
        let overrides = [
            ("BANKS_ETL_SOURCE_URL", &mut self.source_url),
            ("BANKS_ETL_RATE_SOURCE", &mut self.rate_source),
            ("BANKS_ETL_DB_PATH", &mut self.db_path),
        ];
        for (key, field) in overrides {
            if let Ok(v) = std::env::var(key) {
                if !v.trim().is_empty() {
                    *field = v;
                }
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let required = [
            ("source_url", &self.source_url),
            ("rate_source", &self.rate_source),
            ("csv_output_path", &self.csv_output_path),
            ("db_path", &self.db_path),
            ("log_path", &self.log_path),
            ("table_selector.tag", &self.table_selector.tag),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(EtlError::Config(format!("{} must not be empty", name)));
            }
        }
        if self.fetch_timeout_secs == 0 {
            return Err(EtlError::Config("fetch_timeout_secs must be positive".into()));
        }
        if self.row_limit == 0 {
            return Err(EtlError::Config("row_limit must be positive".into()));
        }
        if !is_sql_identifier(&self.table_name) {
            return Err(EtlError::Config(format!(
                "table_name '{}' is not a plain SQL identifier",
                self.table_name
            )));
        }
        Ok(())
    }
}

// SQLite keywords; an unquoted keyword cannot name a table in the fixed queries
const SQLITE_KEYWORDS: &[&str] = &[
    "ABORT", "ACTION", "ADD", "AFTER", "ALL", "ALTER", "ALWAYS", "ANALYZE", "AND", "AS", "ASC",
    "ATTACH", "AUTOINCREMENT", "BEFORE", "BEGIN", "BETWEEN", "BY", "CASCADE", "CASE", "CAST",
    "CHECK", "COLLATE", "COLUMN", "COMMIT", "CONFLICT", "CONSTRAINT", "CREATE", "CROSS",
    "CURRENT", "CURRENT_DATE", "CURRENT_TIME", "CURRENT_TIMESTAMP", "DATABASE", "DEFAULT",
    "DEFERRABLE", "DEFERRED", "DELETE", "DESC", "DETACH", "DISTINCT", "DO", "DROP", "EACH",
    "ELSE", "END", "ESCAPE", "EXCEPT", "EXCLUDE", "EXCLUSIVE", "EXISTS", "EXPLAIN", "FAIL",
    "FILTER", "FIRST", "FOLLOWING", "FOR", "FOREIGN", "FROM", "FULL", "GENERATED", "GLOB",
    "GROUP", "GROUPS", "HAVING", "IF", "IGNORE", "IMMEDIATE", "IN", "INDEX", "INDEXED",
    "INITIALLY", "INNER", "INSERT", "INSTEAD", "INTERSECT", "INTO", "IS", "ISNULL", "JOIN",
    "KEY", "LAST", "LEFT", "LIKE", "LIMIT", "MATCH", "MATERIALIZED", "NATURAL", "NO", "NOT",
    "NOTHING", "NOTNULL", "NULL", "NULLS", "OF", "OFFSET", "ON", "OR", "ORDER", "OTHERS",
    "OUTER", "OVER", "PARTITION", "PLAN", "PRAGMA", "PRECEDING", "PRIMARY", "QUERY", "RAISE",
    "RANGE", "RECURSIVE", "REFERENCES", "REGEXP", "REINDEX", "RELEASE", "RENAME", "REPLACE",
    "RESTRICT", "RETURNING", "RIGHT", "ROLLBACK", "ROW", "ROWS", "SAVEPOINT", "SELECT", "SET",
    "TABLE", "TEMP", "TEMPORARY", "THEN", "TIES", "TO", "TRANSACTION", "TRIGGER", "UNBOUNDED",
    "UNION", "UNIQUE", "UPDATE", "USING", "VACUUM", "VALUES", "VIEW", "VIRTUAL", "WHEN", "WHERE",
    "WINDOW", "WITH", "WITHOUT",
];

/// `[A-Za-z_][A-Za-z0-9_]*` and not an SQLite keyword, so it is usable unquoted.
pub fn is_sql_identifier(name: &str) -> bool {
    let plain = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$")
        .map(|re| re.is_match(name))
        .unwrap_or(false);
    plain
        && !SQLITE_KEYWORDS
            .iter()
            .any(|kw| kw.eq_ignore_ascii_case(name))
}

//! Bulk operation configuration.

use bulkmodel_core::{BulkError, ConfigError, Dialect, Error, IsolationLevel, Result};
use bulkmodel_mapping::NamingConvention;
use serde::{Deserialize, Serialize};

/// Options for one bulk upsert call.
///
/// ```rust,ignore
/// let config = BulkConfig::default()
///     .update_columns(["FirstNested_FirstNestedProperty"])
///     .batch_size(500)
///     .calculate_stats(true);
/// ```
///
/// Loading from JSON works too; missing keys take their defaults:
///
/// ```rust,ignore
/// let config = BulkConfig::from_json(r#"{ "batch_size": 500, "use_native_copy": false }"#)?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BulkConfig {
    /// Columns matched on to decide insert vs. update. `None` uses the
    /// mapping's key.
    pub primary_key_columns: Option<Vec<String>>,
    /// Columns overwritten on a key match. `None` means every written
    /// non-key column; an empty list turns the upsert into insert-if-absent.
    pub update_columns: Option<Vec<String>>,
    /// Rows per batch. `None` picks the largest size the backend's
    /// parameter limit allows, capped at the dialect default.
    pub batch_size: Option<usize>,
    /// Write owned-entity columns. When off only root-level columns are
    /// written and the rest of the row is left untouched.
    pub enable_nested_owned: bool,
    /// Count inserted vs. updated rows (one extra query per batch).
    pub calculate_stats: bool,
    /// Try the driver's native bulk copy before multi-row inserts.
    pub use_native_copy: bool,
    pub isolation: IsolationLevel,
    pub naming: NamingConvention,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            primary_key_columns: None,
            update_columns: None,
            batch_size: None,
            enable_nested_owned: true,
            calculate_stats: false,
            use_native_copy: true,
            isolation: IsolationLevel::default(),
            naming: NamingConvention::default(),
        }
    }
}

impl BulkConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from JSON.
    #[allow(clippy::result_large_err)]
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            Error::Config(ConfigError {
                message: format!("invalid bulk configuration: {e}"),
            })
        })
    }

    pub fn primary_key_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key_columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn update_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.update_columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn batch_size(mut self, rows: usize) -> Self {
        self.batch_size = Some(rows);
        self
    }

    pub fn enable_nested_owned(mut self, enabled: bool) -> Self {
        self.enable_nested_owned = enabled;
        self
    }

    pub fn calculate_stats(mut self, enabled: bool) -> Self {
        self.calculate_stats = enabled;
        self
    }

    pub fn use_native_copy(mut self, enabled: bool) -> Self {
        self.use_native_copy = enabled;
        self
    }

    pub fn isolation(mut self, level: IsolationLevel) -> Self {
        self.isolation = level;
        self
    }

    pub fn naming(mut self, naming: NamingConvention) -> Self {
        self.naming = naming;
        self
    }

    /// Most rows one multi-row `INSERT` may carry for `columns` columns.
    pub fn max_rows_per_statement(dialect: Dialect, columns: usize) -> usize {
        let by_params = dialect.max_parameters() / columns.max(1);
        match dialect.max_rows_per_values() {
            Some(cap) => by_params.min(cap),
            None => by_params,
        }
    }

    /// Resolve the batch size for a table with `columns` written columns.
    ///
    /// An explicit size above the backend limit fails with `BatchTooLarge`
    /// so the caller can lower it and retry.
    #[allow(clippy::result_large_err)]
    pub fn effective_batch_size(&self, dialect: Dialect, columns: usize) -> Result<usize> {
        let limit = Self::max_rows_per_statement(dialect, columns);
        if limit == 0 {
            return Err(Error::Bulk(BulkError::batch_too_large(format!(
                "{columns} columns exceed the {} parameter limit of {dialect}",
                dialect.max_parameters()
            ))));
        }
        match self.batch_size {
            Some(0) => Err(Error::Config(ConfigError {
                message: "batch_size must be at least 1".to_string(),
            })),
            Some(rows) if rows > limit => Err(Error::Bulk(BulkError::batch_too_large(format!(
                "batch of {rows} rows x {columns} columns exceeds the {dialect} limit of {limit} rows per statement"
            )))),
            Some(rows) => Ok(rows),
            None => Ok(dialect.default_batch_size().min(limit)),
        }
    }
}

//! Backend selector.
//!
//! A `Dialect` decides placeholder syntax, identifier quoting, and the
//! parameter limits that bound a multi-row load into a staging table.

use crate::error::{ConfigError, Error};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported SQL backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Microsoft SQL Server (`@p1` placeholders, `[bracket]` quoting)
    #[serde(alias = "mssql")]
    SqlServer,
    /// PostgreSQL (`$1` placeholders, `"double"` quoting)
    #[serde(alias = "postgresql", alias = "pg")]
    Postgres,
    /// MySQL / MariaDB (`?` placeholders, `` `backtick` `` quoting)
    #[serde(alias = "mariadb")]
    MySql,
}

impl Dialect {
    /// All supported dialects, in a stable order.
    pub const ALL: [Dialect; 3] = [Dialect::SqlServer, Dialect::Postgres, Dialect::MySql];

    /// Stable lowercase name.
    pub const fn name(self) -> &'static str {
        match self {
            Dialect::SqlServer => "sqlserver",
            Dialect::Postgres => "postgres",
            Dialect::MySql => "mysql",
        }
    }

    /// Generate a placeholder for the given parameter index (1-based).
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::SqlServer => format!("@p{index}"),
            Dialect::Postgres => format!("${index}"),
            Dialect::MySql => "?".to_string(),
        }
    }

    /// Quote an identifier for this dialect.
    ///
    /// Embedded closing quote characters are escaped by doubling them.
    pub fn quote_identifier(self, name: &str) -> String {
        match self {
            Dialect::SqlServer => format!("[{}]", name.replace(']', "]]")),
            Dialect::Postgres => format!("\"{}\"", name.replace('"', "\"\"")),
            Dialect::MySql => format!("`{}`", name.replace('`', "``")),
        }
    }

    /// Quote a possibly schema-qualified table name.
    pub fn quote_table(self, schema: Option<&str>, table: &str) -> String {
        match schema {
            Some(schema) => format!(
                "{}.{}",
                self.quote_identifier(schema),
                self.quote_identifier(table)
            ),
            None => self.quote_identifier(table),
        }
    }

    /// Maximum number of bound parameters in one statement.
    ///
    /// SQL Server caps RPC parameters at 2100; PostgreSQL and MySQL encode
    /// the parameter count as an unsigned 16-bit integer.
    pub const fn max_parameters(self) -> usize {
        match self {
            Dialect::SqlServer => 2100,
            Dialect::Postgres | Dialect::MySql => 65_535,
        }
    }

    /// Maximum rows in one `VALUES` row constructor, if the backend caps it.
    pub const fn max_rows_per_values(self) -> Option<usize> {
        match self {
            Dialect::SqlServer => Some(1000),
            Dialect::Postgres | Dialect::MySql => None,
        }
    }

    /// Default rows per batch when the caller doesn't choose one.
    pub const fn default_batch_size(self) -> usize {
        match self {
            Dialect::SqlServer => 2000,
            Dialect::Postgres | Dialect::MySql => 5000,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlserver" | "mssql" => Ok(Dialect::SqlServer),
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            other => Err(Error::Config(ConfigError {
                message: format!("unknown SQL dialect '{other}'"),
            })),
        }
    }
}

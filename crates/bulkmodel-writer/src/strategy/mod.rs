//! Per-backend bulk upsert strategies.
//!
//! Every backend runs the same staged pipeline for a batch:
//!
//! 1. create an empty staging table shaped like the written columns
//! 2. load the batch into it (native bulk copy or multi-row `INSERT`)
//! 3. optionally count staged keys already present in the target
//! 4. merge staging into the target in one set-based statement
//! 5. drop the staging table
//!
//! A [`BulkStrategy`] only produces the SQL text for each step; the writer
//! owns execution, transactions and fallbacks.

mod mysql;
mod postgres;
mod sqlserver;

pub use mysql::MySqlStrategy;
pub use postgres::PostgresStrategy;
pub use sqlserver::SqlServerStrategy;

use bulkmodel_core::Dialect;

/// The table an upsert writes to and the columns it touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertTarget {
    pub schema_name: Option<String>,
    pub table: String,
    /// Written columns, in load order.
    pub columns: Vec<String>,
    pub key_columns: Vec<String>,
    /// Columns overwritten on a key match; empty means insert-if-absent.
    pub update_columns: Vec<String>,
}

impl UpsertTarget {
    /// The quoted, possibly schema-qualified target table.
    pub fn quoted_table(&self, dialect: Dialect) -> String {
        dialect.quote_table(self.schema_name.as_deref(), &self.table)
    }
}

/// SQL generation for one backend's staged upsert.
pub trait BulkStrategy: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Whether the backend has a native bulk-copy path worth trying.
    fn supports_native_copy(&self) -> bool;

    /// Unquoted name of the staging table for batch number `seq`.
    fn staging_name(&self, target: &UpsertTarget, seq: u64) -> String {
        format!("{}_staging_{seq}", target.table)
    }

    /// Create an empty staging table with the target's column types.
    fn create_staging(&self, target: &UpsertTarget, staging: &str) -> String;

    /// Multi-row `INSERT` of `rows` rows into the staging table.
    fn insert_staging(&self, target: &UpsertTarget, staging: &str, rows: usize) -> String {
        let dialect = self.dialect();
        let width = target.columns.len();
        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES ",
            dialect.quote_identifier(staging),
            column_list(dialect, &target.columns, None)
        );
        let mut param = 1;
        for row in 0..rows {
            if row > 0 {
                sql.push_str(", ");
            }
            sql.push('(');
            for col in 0..width {
                if col > 0 {
                    sql.push_str(", ");
                }
                sql.push_str(&dialect.placeholder(param));
                param += 1;
            }
            sql.push(')');
        }
        sql
    }

    /// Count staged rows whose key already exists in the target.
    fn count_existing(&self, target: &UpsertTarget, staging: &str) -> String {
        let dialect = self.dialect();
        format!(
            "SELECT COUNT(*) FROM {} AS S INNER JOIN {} AS T ON {}",
            dialect.quote_identifier(staging),
            target.quoted_table(dialect),
            key_join(dialect, &target.key_columns, "T", "S")
        )
    }

    /// Merge the staging table into the target.
    fn merge(&self, target: &UpsertTarget, staging: &str) -> String;

    fn drop_staging(&self, staging: &str) -> String;
}

/// Select the strategy for a dialect.
pub fn strategy_for_dialect(dialect: Dialect) -> Box<dyn BulkStrategy> {
    match dialect {
        Dialect::SqlServer => Box::new(SqlServerStrategy),
        Dialect::Postgres => Box::new(PostgresStrategy),
        Dialect::MySql => Box::new(MySqlStrategy),
    }
}

// ============================================================================
// Shared Helpers
// ============================================================================

/// Comma-separated quoted columns, optionally qualified with an alias.
pub(crate) fn column_list(dialect: Dialect, columns: &[String], alias: Option<&str>) -> String {
    columns
        .iter()
        .map(|c| match alias {
            Some(alias) => format!("{alias}.{}", dialect.quote_identifier(c)),
            None => dialect.quote_identifier(c),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// `L.k1 = R.k1 AND L.k2 = R.k2`
pub(crate) fn key_join(dialect: Dialect, keys: &[String], left: &str, right: &str) -> String {
    keys.iter()
        .map(|k| {
            let q = dialect.quote_identifier(k);
            format!("{left}.{q} = {right}.{q}")
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}

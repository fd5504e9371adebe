//! MySQL: `CREATE TEMPORARY TABLE ... SELECT` plus `ON DUPLICATE KEY UPDATE`.

use super::{BulkStrategy, UpsertTarget, column_list};
use bulkmodel_core::Dialect;

/// MySQL / MariaDB bulk strategy.
///
/// There is no client-side bulk copy over the plain protocol, so staging is
/// always loaded with multi-row inserts.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlStrategy;

impl BulkStrategy for MySqlStrategy {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    fn supports_native_copy(&self) -> bool {
        false
    }

    fn create_staging(&self, target: &UpsertTarget, staging: &str) -> String {
        let d = self.dialect();
        format!(
            "CREATE TEMPORARY TABLE {} SELECT {} FROM {} LIMIT 0",
            d.quote_identifier(staging),
            column_list(d, &target.columns, None),
            target.quoted_table(d)
        )
    }

    fn merge(&self, target: &UpsertTarget, staging: &str) -> String {
        let d = self.dialect();
        let table = target.quoted_table(d);
        let set = if target.update_columns.is_empty() {
            // Key-to-itself keeps existing rows untouched.
            target
                .key_columns
                .iter()
                .map(|k| {
                    let q = d.quote_identifier(k);
                    format!("{q} = {table}.{q}")
                })
                .collect::<Vec<_>>()
                .join(", ")
        } else {
            target
                .update_columns
                .iter()
                .map(|c| {
                    let q = d.quote_identifier(c);
                    format!("{q} = S.{q}")
                })
                .collect::<Vec<_>>()
                .join(", ")
        };
        format!(
            "INSERT INTO {table} ({}) SELECT {} FROM {} AS S ON DUPLICATE KEY UPDATE {set}",
            column_list(d, &target.columns, None),
            column_list(d, &target.columns, Some("S")),
            d.quote_identifier(staging)
        )
    }

    fn drop_staging(&self, staging: &str) -> String {
        format!(
            "DROP TEMPORARY TABLE IF EXISTS {}",
            self.dialect().quote_identifier(staging)
        )
    }
}

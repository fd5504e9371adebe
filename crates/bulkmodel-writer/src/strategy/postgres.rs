//! PostgreSQL: `ON COMMIT DROP` temp table plus `INSERT ... ON CONFLICT`.

use super::{BulkStrategy, UpsertTarget, column_list};
use bulkmodel_core::Dialect;

/// PostgreSQL bulk strategy.
///
/// The merge needs a unique index or primary key on the key columns for
/// `ON CONFLICT` to infer the arbiter.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresStrategy;

impl BulkStrategy for PostgresStrategy {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn supports_native_copy(&self) -> bool {
        true
    }

    fn create_staging(&self, target: &UpsertTarget, staging: &str) -> String {
        let d = self.dialect();
        format!(
            "CREATE TEMP TABLE {} ON COMMIT DROP AS SELECT {} FROM {} LIMIT 0",
            d.quote_identifier(staging),
            column_list(d, &target.columns, None),
            target.quoted_table(d)
        )
    }

    fn merge(&self, target: &UpsertTarget, staging: &str) -> String {
        let d = self.dialect();
        let columns = column_list(d, &target.columns, None);
        let action = if target.update_columns.is_empty() {
            "DO NOTHING".to_string()
        } else {
            let set = target
                .update_columns
                .iter()
                .map(|c| {
                    let q = d.quote_identifier(c);
                    format!("{q} = EXCLUDED.{q}")
                })
                .collect::<Vec<_>>()
                .join(", ");
            format!("DO UPDATE SET {set}")
        };
        format!(
            "INSERT INTO {} ({columns}) SELECT {columns} FROM {} ON CONFLICT ({}) {action}",
            target.quoted_table(d),
            d.quote_identifier(staging),
            column_list(d, &target.key_columns, None)
        )
    }

    fn drop_staging(&self, staging: &str) -> String {
        format!(
            "DROP TABLE IF EXISTS {}",
            self.dialect().quote_identifier(staging)
        )
    }
}

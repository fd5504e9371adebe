//! SQL Server: `SELECT TOP 0 ... INTO #staging` plus `MERGE ... WITH (HOLDLOCK)`.

use super::{BulkStrategy, UpsertTarget, column_list, key_join};
use bulkmodel_core::Dialect;

/// SQL Server bulk strategy.
///
/// Staging tables are session temp tables (`#` prefix). `HOLDLOCK` makes
/// the `MERGE` serializable on the key range so concurrent upserts of the
/// same key can't both take the insert branch.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServerStrategy;

impl BulkStrategy for SqlServerStrategy {
    fn dialect(&self) -> Dialect {
        Dialect::SqlServer
    }

    fn supports_native_copy(&self) -> bool {
        true
    }

    fn staging_name(&self, target: &UpsertTarget, seq: u64) -> String {
        format!("#{}_staging_{seq}", target.table)
    }

    fn create_staging(&self, target: &UpsertTarget, staging: &str) -> String {
        let d = self.dialect();
        format!(
            "SELECT TOP 0 {} INTO {} FROM {}",
            column_list(d, &target.columns, None),
            d.quote_identifier(staging),
            target.quoted_table(d)
        )
    }

    fn merge(&self, target: &UpsertTarget, staging: &str) -> String {
        let d = self.dialect();
        let mut sql = format!(
            "MERGE INTO {} WITH (HOLDLOCK) AS T USING {} AS S ON {}",
            target.quoted_table(d),
            d.quote_identifier(staging),
            key_join(d, &target.key_columns, "T", "S")
        );
        if !target.update_columns.is_empty() {
            let set = target
                .update_columns
                .iter()
                .map(|c| {
                    let q = d.quote_identifier(c);
                    format!("T.{q} = S.{q}")
                })
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(&format!(" WHEN MATCHED THEN UPDATE SET {set}"));
        }
        sql.push_str(&format!(
            " WHEN NOT MATCHED BY TARGET THEN INSERT ({}) VALUES ({});",
            column_list(d, &target.columns, None),
            column_list(d, &target.columns, Some("S"))
        ));
        sql
    }

    fn drop_staging(&self, staging: &str) -> String {
        format!("DROP TABLE {}", self.dialect().quote_identifier(staging))
    }
}

//! Upsert planning: everything decided before the first statement runs.
//!
//! Building a plan resolves the written, key and update columns, projects
//! flattened rows onto the written columns, collapses duplicate keys and
//! splits the rows into batches. Any failure here happens before I/O.

use crate::config::BulkConfig;
use crate::strategy::UpsertTarget;
use bulkmodel_core::{BulkError, Dialect, Error, Result, Row, Value};
use bulkmodel_mapping::TableMapping;
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A fully resolved upsert, ready to execute.
#[derive(Debug, Clone)]
pub struct UpsertPlan {
    pub dialect: Dialect,
    pub target: UpsertTarget,
    /// Row values in `target.columns` order, split into batches.
    pub batches: Vec<Vec<Vec<Value>>>,
    /// Rows submitted by the caller.
    pub submitted: usize,
    /// Identical duplicate rows dropped.
    pub collapsed: usize,
}

impl UpsertPlan {
    #[allow(clippy::result_large_err)]
    pub fn build(
        mapping: &TableMapping,
        rows: Vec<Row>,
        config: &BulkConfig,
        dialect: Dialect,
    ) -> Result<Self> {
        let table = mapping.table();
        let mismatch = |message: String| {
            Error::Bulk(BulkError::schema_mismatch(message).with_table(table))
        };

        let columns: Vec<String> = if config.enable_nested_owned {
            mapping.column_names().to_vec()
        } else {
            mapping.root_columns().iter().map(|c| c.name.clone()).collect()
        };

        let key_columns = match &config.primary_key_columns {
            Some(keys) => dedup(keys),
            None => mapping.key_columns().to_vec(),
        };
        if key_columns.is_empty() {
            return Err(mismatch("upsert needs at least one key column".to_string()));
        }
        for key in &key_columns {
            if !columns.contains(key) {
                return Err(mismatch(format!("key column '{key}' is not a written column")));
            }
        }

        let update_columns = match &config.update_columns {
            Some(update) => {
                let update = dedup(update);
                for column in &update {
                    if !columns.contains(column) {
                        return Err(mismatch(format!(
                            "update column '{column}' is not a written column"
                        )));
                    }
                    if key_columns.contains(column) {
                        return Err(mismatch(format!(
                            "key column '{column}' can't also be an update column"
                        )));
                    }
                }
                update
            }
            None => columns
                .iter()
                .filter(|c| !key_columns.contains(c))
                .cloned()
                .collect(),
        };

        let batch_size = config.effective_batch_size(dialect, columns.len())?;

        // Mapping column index for each written column.
        let mut projection = Vec::with_capacity(columns.len());
        for column in &columns {
            match mapping.column_index(column) {
                Some(i) => projection.push(i),
                None => return Err(mismatch(format!("column '{column}' is not mapped"))),
            }
        }
        let key_positions: Vec<usize> = key_columns
            .iter()
            .filter_map(|k| columns.iter().position(|c| c == k))
            .collect();

        let submitted = rows.len();
        let unique = collapse_duplicates(table, rows, &projection, &key_positions, mapping)?;
        let collapsed = submitted - unique.len();

        let mut batches = Vec::with_capacity(unique.len().div_ceil(batch_size));
        let mut iter = unique.into_iter().peekable();
        while iter.peek().is_some() {
            batches.push(iter.by_ref().take(batch_size).collect::<Vec<_>>());
        }

        tracing::debug!(
            table = table,
            rows = submitted,
            collapsed = collapsed,
            batches = batches.len(),
            batch_size = batch_size,
            columns = columns.len(),
            "Planned bulk upsert"
        );

        Ok(Self {
            dialect,
            target: UpsertTarget {
                schema_name: mapping.schema_name().map(str::to_string),
                table: table.to_string(),
                columns,
                key_columns,
                update_columns,
            },
            batches,
            submitted,
            collapsed,
        })
    }

    /// Rows that will be written.
    pub fn row_count(&self) -> usize {
        self.batches.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

fn dedup(columns: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(columns.len());
    for c in columns {
        if !out.contains(c) {
            out.push(c.clone());
        }
    }
    out
}

/// Project rows and drop identical duplicates; conflicting duplicates of
/// one key are rejected since their outcome would depend on row order.
#[allow(clippy::result_large_err)]
fn collapse_duplicates(
    table: &str,
    rows: Vec<Row>,
    projection: &[usize],
    key_positions: &[usize],
    mapping: &TableMapping,
) -> Result<Vec<Vec<Value>>> {
    let mut unique: Vec<Vec<Value>> = Vec::with_capacity(rows.len());
    let mut by_key: HashMap<u64, Vec<usize>> = HashMap::with_capacity(rows.len());

    for row in rows {
        let values = project(table, &row, projection, mapping)?;
        let key: Vec<&Value> = key_positions.iter().map(|&i| &values[i]).collect();
        if key.iter().any(|v| v.is_null()) {
            return Err(Error::Bulk(
                BulkError::constraint_violation("key column is NULL").with_table(table),
            ));
        }
        let hash = hash_values(key.iter().copied());
        let bucket = by_key.entry(hash).or_default();
        let existing = bucket.iter().copied().find(|&i| {
            key_positions
                .iter()
                .all(|&p| same_value(&unique[i][p], &values[p]))
        });
        match existing {
            Some(i) if same_row(&unique[i], &values) => {}
            Some(_) => {
                let shown: Vec<String> = key.iter().map(|v| format!("{v:?}")).collect();
                return Err(Error::Bulk(
                    BulkError::constraint_violation(format!(
                        "key ({}) appears more than once with different values",
                        shown.join(", ")
                    ))
                    .with_table(table),
                ));
            }
            None => {
                bucket.push(unique.len());
                unique.push(values);
            }
        }
    }
    Ok(unique)
}

#[allow(clippy::result_large_err)]
fn project(
    table: &str,
    row: &Row,
    projection: &[usize],
    mapping: &TableMapping,
) -> Result<Vec<Value>> {
    let info = row.column_info();
    let same_layout =
        Arc::ptr_eq(&info, &mapping.column_info()) || info.names() == mapping.column_names();
    projection
        .iter()
        .map(|&i| {
            let value = if same_layout {
                row.get(i)
            } else {
                row.get_by_name(&mapping.columns()[i].name)
            };
            value.cloned().ok_or_else(|| {
                Error::Bulk(
                    BulkError::schema_mismatch(format!(
                        "row is missing column '{}'",
                        mapping.columns()[i].name
                    ))
                    .with_table(table)
                    .with_column(mapping.columns()[i].name.clone()),
                )
            })
        })
        .collect()
}

/// Equality that ignores integer width, matching how the database compares
/// `Int(1)` against `BigInt(1)`.
fn same_value(a: &Value, b: &Value) -> bool {
    if is_integer(a) && is_integer(b) {
        a.as_i64() == b.as_i64()
    } else {
        a == b
    }
}

fn same_row(a: &[Value], b: &[Value]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| same_value(x, y))
}

fn is_integer(value: &Value) -> bool {
    matches!(
        value,
        Value::TinyInt(_) | Value::SmallInt(_) | Value::Int(_) | Value::BigInt(_)
    )
}

fn hash_values<'a>(values: impl Iterator<Item = &'a Value>) -> u64 {
    let mut hasher = DefaultHasher::new();
    for v in values {
        match v {
            Value::Null => 0u8.hash(&mut hasher),
            Value::Bool(b) => {
                1u8.hash(&mut hasher);
                b.hash(&mut hasher);
            }
            // Integer widths hash alike, see `same_value`.
            Value::TinyInt(_) | Value::SmallInt(_) | Value::Int(_) | Value::BigInt(_) => {
                2u8.hash(&mut hasher);
                v.as_i64().hash(&mut hasher);
            }
            Value::Double(f) => {
                3u8.hash(&mut hasher);
                f.to_bits().hash(&mut hasher);
            }
            Value::Decimal(s) | Value::Text(s) => {
                4u8.hash(&mut hasher);
                s.hash(&mut hasher);
            }
            Value::Bytes(b) => {
                5u8.hash(&mut hasher);
                b.hash(&mut hasher);
            }
            Value::Date(d) => {
                6u8.hash(&mut hasher);
                d.hash(&mut hasher);
            }
            Value::Time(t) | Value::Timestamp(t) => {
                7u8.hash(&mut hasher);
                t.hash(&mut hasher);
            }
            Value::Uuid(u) => {
                8u8.hash(&mut hasher);
                u.hash(&mut hasher);
            }
            Value::Json(j) => {
                9u8.hash(&mut hasher);
                j.to_string().hash(&mut hasher);
            }
        }
    }
    hasher.finish()
}

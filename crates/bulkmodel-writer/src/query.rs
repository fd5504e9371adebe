//! Reading nested entity graphs back from their table.

use asupersync::{Cx, Outcome};
use bulkmodel_core::{BulkError, ConfigError, Connection, Dialect, Error, Result, Row, Value};
use bulkmodel_mapping::{MappedColumn, RootEntity, TableMapping, reconstruct};
use std::marker::PhantomData;

/// Row selection for [`query`].
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Filter {
    /// Every row.
    #[default]
    All,
    /// Key columns equal to these values, in key order.
    KeyEq(Vec<Value>),
    /// The column for `(path, leaf)` equals `value`. NULL matches `IS NULL`.
    ColumnEq {
        path: Vec<String>,
        leaf: String,
        value: Value,
    },
    /// Every filter holds.
    And(Vec<Filter>),
}

impl Filter {
    pub fn all() -> Self {
        Filter::All
    }

    /// Match a single-column key.
    pub fn key_eq(value: impl Into<Value>) -> Self {
        Filter::KeyEq(vec![value.into()])
    }

    /// Match a composite key.
    pub fn key_values(values: Vec<Value>) -> Self {
        Filter::KeyEq(values)
    }

    /// Match a property reached through the owned navigations in `path`.
    ///
    /// ```rust,ignore
    /// Filter::column_eq(&["FirstNested", "SecondNested"], "SecondNestedProperty", "secondnested")
    /// ```
    pub fn column_eq(path: &[&str], leaf: &str, value: impl Into<Value>) -> Self {
        Filter::ColumnEq {
            path: path.iter().map(|s| (*s).to_string()).collect(),
            leaf: leaf.to_string(),
            value: value.into(),
        }
    }

    pub fn and(self, other: Filter) -> Self {
        match self {
            Filter::All => other,
            Filter::And(mut filters) => {
                filters.push(other);
                Filter::And(filters)
            }
            first => Filter::And(vec![first, other]),
        }
    }

    /// Render the `WHERE` predicate, pushing parameters in placeholder order.
    /// `None` means no restriction.
    #[allow(clippy::result_large_err)]
    pub fn to_sql(
        &self,
        mapping: &TableMapping,
        dialect: Dialect,
        params: &mut Vec<Value>,
    ) -> Result<Option<String>> {
        match self {
            Filter::All => Ok(None),
            Filter::KeyEq(values) => {
                let keys = mapping.key_columns();
                if values.len() != keys.len() {
                    return Err(Error::Bulk(
                        BulkError::schema_mismatch(format!(
                            "key filter has {} values but the key has {} columns",
                            values.len(),
                            keys.len()
                        ))
                        .with_table(mapping.table()),
                    ));
                }
                let mut parts = Vec::with_capacity(keys.len());
                for (key, value) in keys.iter().zip(values) {
                    let column = mapping.column(key).ok_or_else(|| {
                        Error::Bulk(
                            BulkError::schema_mismatch(format!("unknown key column '{key}'"))
                                .with_table(mapping.table()),
                        )
                    })?;
                    parts.push(equals(column, value.clone(), dialect, params)?);
                }
                Ok(Some(parts.join(" AND ")))
            }
            Filter::ColumnEq { path, leaf, value } => {
                let segments: Vec<&str> = path.iter().map(String::as_str).collect();
                let column = mapping.column_for(&segments, leaf).ok_or_else(|| {
                    let mut shown = segments.clone();
                    shown.push(leaf.as_str());
                    Error::Bulk(
                        BulkError::schema_mismatch(format!(
                            "no column mapped for '{}'",
                            shown.join(".")
                        ))
                        .with_table(mapping.table()),
                    )
                })?;
                equals(column, value.clone(), dialect, params).map(Some)
            }
            Filter::And(filters) => {
                let mut parts = Vec::new();
                for filter in filters {
                    if let Some(part) = filter.to_sql(mapping, dialect, params)? {
                        parts.push(part);
                    }
                }
                if parts.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(parts.join(" AND ")))
                }
            }
        }
    }
}

#[allow(clippy::result_large_err)]
fn equals(
    column: &MappedColumn,
    value: Value,
    dialect: Dialect,
    params: &mut Vec<Value>,
) -> Result<String> {
    let quoted = dialect.quote_identifier(&column.name);
    if value.is_null() {
        return Ok(format!("{quoted} IS NULL"));
    }
    let value = column.sql_type().normalize(value).map_err(|e| {
        Error::Bulk(BulkError::schema_mismatch(format!("filter value: {e}")).with_column(&column.name))
    })?;
    params.push(value);
    Ok(format!("{quoted} = {}", dialect.placeholder(params.len())))
}

/// `SELECT` for every mapped column of `T`'s table, ordered by key.
#[allow(clippy::result_large_err)]
pub fn select_sql(
    mapping: &TableMapping,
    dialect: Dialect,
    filter: &Filter,
) -> Result<(String, Vec<Value>)> {
    let columns = mapping
        .column_names()
        .iter()
        .map(|c| dialect.quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ");
    let mut sql = format!(
        "SELECT {columns} FROM {}",
        dialect.quote_table(mapping.schema_name(), mapping.table())
    );
    let mut params = Vec::new();
    if let Some(predicate) = filter.to_sql(mapping, dialect, &mut params)? {
        sql.push_str(" WHERE ");
        sql.push_str(&predicate);
    }
    let order = mapping
        .key_columns()
        .iter()
        .map(|c| dialect.quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ");
    sql.push_str(" ORDER BY ");
    sql.push_str(&order);
    Ok((sql, params))
}

/// Fetch the rows matching `filter` and reconstruct them lazily as `T`.
pub async fn query<C, T>(
    cx: &Cx,
    conn: &C,
    dialect: Dialect,
    filter: &Filter,
) -> Outcome<OwnedRows<T>, Error>
where
    C: Connection,
    T: RootEntity,
{
    match TableMapping::of::<T>() {
        Ok(mapping) => query_mapped(cx, conn, dialect, mapping, filter).await,
        Err(e) => Outcome::Err(e),
    }
}

/// [`query`] with an explicit mapping, e.g. one built with a custom naming
/// convention.
#[tracing::instrument(level = "debug", skip_all, fields(table = %mapping.table(), dialect = %dialect))]
pub async fn query_mapped<C, T>(
    cx: &Cx,
    conn: &C,
    dialect: Dialect,
    mapping: TableMapping,
    filter: &Filter,
) -> Outcome<OwnedRows<T>, Error>
where
    C: Connection,
    T: RootEntity,
{
    if let Some(reason) = cx.cancel_reason() {
        return Outcome::Cancelled(reason);
    }
    if conn.dialect() != dialect {
        return Outcome::Err(Error::Config(ConfigError {
            message: format!(
                "query requested for {dialect} but the connection speaks {}",
                conn.dialect()
            ),
        }));
    }
    let (sql, params) = match select_sql(&mapping, dialect, filter) {
        Ok(built) => built,
        Err(e) => return Outcome::Err(e),
    };
    tracing::trace!(sql = %sql, params = params.len(), "Owned graph query");

    conn.query(cx, &sql, &params).await.map(|rows| {
        tracing::debug!(row_count = rows.len(), "Fetched owned graph rows");
        OwnedRows::new(mapping, rows)
    })
}

/// Single-pass iterator over fetched rows, reconstructing each entity as it
/// is reached.
#[derive(Debug)]
pub struct OwnedRows<T> {
    mapping: TableMapping,
    rows: std::vec::IntoIter<Row>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: RootEntity> OwnedRows<T> {
    pub fn new(mapping: TableMapping, rows: Vec<Row>) -> Self {
        Self {
            mapping,
            rows: rows.into_iter(),
            _marker: PhantomData,
        }
    }

    pub fn mapping(&self) -> &TableMapping {
        &self.mapping
    }

    /// Exactly one entity, or an error naming how many rows there were.
    #[allow(clippy::result_large_err)]
    pub fn single(mut self) -> Result<T> {
        match self.rows.len() {
            1 => match self.next() {
                Some(entity) => entity,
                None => Err(Error::Custom("Expected one row, found none".to_string())),
            },
            0 => Err(Error::Custom("Expected one row, found none".to_string())),
            n => Err(Error::Custom(format!("Expected one row, found {n}"))),
        }
    }
}

impl<T: RootEntity> Iterator for OwnedRows<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.rows.next()?;
        Some(reconstruct(&self.mapping, &row))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

impl<T: RootEntity> ExactSizeIterator for OwnedRows<T> {}

//! Graph reconstruction: one row back into a root entity.
//!
//! The inverse of [`flatten`](crate::flatten): an optional level whose
//! columns are all NULL comes back absent, every other level is rebuilt.
//! Rows are read by column name, so drivers may return columns in any order.

use crate::entity::RootEntity;
use crate::graph::{Node, NodeValue};
use crate::mapping::{MappedColumn, TableMapping};
use crate::schema::FieldKind;
use bulkmodel_core::{BulkError, Error, Result, Row, Value};

/// Rebuild a typed root entity from a row.
#[allow(clippy::result_large_err)]
pub fn reconstruct<T: RootEntity>(mapping: &TableMapping, row: &Row) -> Result<T> {
    T::from_node(reconstruct_node(mapping, row)?)
}

/// Rebuild an untyped root node from a row.
#[allow(clippy::result_large_err)]
pub fn reconstruct_node(mapping: &TableMapping, row: &Row) -> Result<Node> {
    let same_layout = row.column_info().names() == mapping.column_names();
    let mut values = Vec::with_capacity(mapping.columns().len());
    for (index, column) in mapping.columns().iter().enumerate() {
        let raw = if same_layout {
            row.get(index)
        } else {
            row.get_by_name(&column.name)
        };
        let Some(raw) = raw else {
            return Err(Error::Bulk(
                BulkError::schema_mismatch(format!(
                    "row has no column '{}' for property '{}'",
                    column.name,
                    column.qualified_name()
                ))
                .with_table(mapping.table())
                .with_column(column.name.clone()),
            ));
        };
        values.push(normalize(column, raw.clone())?);
    }
    build_level(mapping, 0, &values)
}

#[allow(clippy::result_large_err)]
fn normalize(column: &MappedColumn, raw: Value) -> Result<Value> {
    // Enum columns are decoded from any integer width later.
    if column.enum_type().is_some() {
        return Ok(raw);
    }
    column.sql_type().normalize(raw).map_err(|e| match e {
        Error::Type(mut te) => {
            te.column = Some(column.name.clone());
            Error::Type(te)
        }
        other => other,
    })
}

#[allow(clippy::result_large_err)]
fn build_level(mapping: &TableMapping, level_index: usize, values: &[Value]) -> Result<Node> {
    let level = &mapping.levels()[level_index];
    let mut node = Node::new();

    for index in level.own_columns.clone() {
        let column = &mapping.columns()[index];
        let value = &values[index];
        if value.is_null() && !column.field.nullable {
            return Err(Error::Bulk(
                BulkError::schema_mismatch(format!(
                    "non-nullable property '{}' is NULL in a stored row",
                    column.qualified_name()
                ))
                .with_table(mapping.table())
                .with_column(column.name.clone()),
            ));
        }
        let property = match column.field.kind {
            FieldKind::Enum(_) if value.is_null() => NodeValue::Scalar(Value::Null),
            FieldKind::Enum(ty) => {
                let member = ty.decode(value).map_err(|e| match e {
                    Error::Bulk(b) => Error::Bulk(
                        b.with_table(mapping.table())
                            .with_column(column.name.clone()),
                    ),
                    other => other,
                })?;
                NodeValue::Enum {
                    ty,
                    member: member.name,
                }
            }
            FieldKind::Scalar(_) => NodeValue::Scalar(value.clone()),
        };
        node = node.with_property(column.field.name, property);
    }

    for &child_index in &level.children {
        let child = &mapping.levels()[child_index];
        let Some(navigation) = child.navigation() else {
            continue;
        };
        let absent = !child.required
            && values[child.subtree_columns.clone()]
                .iter()
                .all(Value::is_null);
        let built = if absent {
            None
        } else {
            Some(build_level(mapping, child_index, values)?)
        };
        node = node.with_owned(navigation, built);
    }
    Ok(node)
}

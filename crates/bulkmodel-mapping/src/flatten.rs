//! Graph flattening: one root entity into one row.

use crate::entity::RootEntity;
use crate::graph::{Node, NodeValue};
use crate::mapping::{MappedColumn, TableMapping};
use crate::schema::FieldKind;
use bulkmodel_core::{BulkError, Error, Result, Row, ValidationError, Value};

/// Flatten a typed root entity.
#[allow(clippy::result_large_err)]
pub fn flatten<T: RootEntity>(mapping: &TableMapping, entity: &T) -> Result<Row> {
    flatten_node(mapping, &entity.to_node())
}

/// Flatten many root entities, stopping at the first failure.
#[allow(clippy::result_large_err)]
pub fn flatten_all<'a, T, I>(mapping: &TableMapping, entities: I) -> Result<Vec<Row>>
where
    T: RootEntity + 'a,
    I: IntoIterator<Item = &'a T>,
{
    entities
        .into_iter()
        .map(|entity| flatten(mapping, entity))
        .collect()
}

/// Flatten an untyped root node into a row laid out like `mapping`.
///
/// Structural problems (unknown or missing properties, wrong enum types)
/// fail immediately with `SchemaMismatch`; an absent required owned entity
/// fails with `MissingRequiredOwnedEntity`. Value problems (NULL in a
/// non-nullable column, a value that doesn't fit its column type) are
/// collected and reported together as a validation error.
#[allow(clippy::result_large_err)]
pub fn flatten_node(mapping: &TableMapping, node: &Node) -> Result<Row> {
    let mut values = vec![Value::Null; mapping.columns().len()];
    let mut validation = ValidationError::new();
    write_level(mapping, 0, node, &mut values, &mut validation)?;
    validation.into_result()?;
    Ok(Row::with_columns(mapping.column_info(), values))
}

#[allow(clippy::result_large_err)]
fn write_level(
    mapping: &TableMapping,
    level_index: usize,
    node: &Node,
    values: &mut [Value],
    validation: &mut ValidationError,
) -> Result<()> {
    let level = &mapping.levels()[level_index];
    let schema = level.schema;
    let mismatch = |message: String| {
        Error::Bulk(BulkError::schema_mismatch(message).with_table(mapping.table()))
    };

    for (name, _) in node.fields() {
        if schema.field(name).is_none() {
            return Err(mismatch(format!(
                "entity {} at '{}' has no property '{name}'",
                schema.name,
                level.display_path()
            )));
        }
    }
    for (name, _) in node.owned_entries() {
        if schema.navigation(name).is_none() {
            return Err(mismatch(format!(
                "entity {} at '{}' has no owned navigation '{name}'",
                schema.name,
                level.display_path()
            )));
        }
    }

    for index in level.own_columns.clone() {
        let column = &mapping.columns()[index];
        let Some(value) = node.value(column.field.name) else {
            return Err(mismatch(format!(
                "entity {} at '{}' is missing property '{}'",
                schema.name,
                level.display_path(),
                column.field.name
            )));
        };
        let encoded = encode(mapping, column, value, validation)?;
        if encoded.is_null() && !column.field.nullable {
            validation.add_required(column.name.clone());
        }
        values[index] = encoded;
    }

    for &child_index in &level.children {
        let child = &mapping.levels()[child_index];
        let Some(navigation) = child.navigation() else {
            continue;
        };
        match node.owned(navigation) {
            Some(Some(child_node)) => {
                write_level(mapping, child_index, child_node, values, validation)?;
            }
            Some(None) if child.required => {
                return Err(Error::Bulk(
                    BulkError::missing_owned(child.display_path()).with_table(mapping.table()),
                ));
            }
            // Absent optional level: its whole subtree stays NULL.
            Some(None) => {}
            None => {
                return Err(mismatch(format!(
                    "entity {} at '{}' doesn't list owned navigation '{navigation}'",
                    schema.name,
                    level.display_path()
                )));
            }
        }
    }
    Ok(())
}

#[allow(clippy::result_large_err)]
fn encode(
    mapping: &TableMapping,
    column: &MappedColumn,
    value: &NodeValue,
    validation: &mut ValidationError,
) -> Result<Value> {
    let mismatch = |message: String| {
        Error::Bulk(
            BulkError::schema_mismatch(message)
                .with_table(mapping.table())
                .with_column(column.name.clone()),
        )
    };
    match (column.field.kind, value) {
        (_, NodeValue::Scalar(Value::Null)) => Ok(Value::Null),
        (FieldKind::Scalar(sql_type), NodeValue::Scalar(v)) => {
            if !sql_type.accepts(v) {
                validation.add_type(column.name.clone(), &sql_type.sql_name(), v.type_name());
                return Ok(Value::Null);
            }
            if sql_type.is_integer() {
                // `accepts` already proved the value fits.
                return v.as_i64().map_or(Ok(Value::Null), |n| sql_type.integer_value(n));
            }
            Ok(v.clone())
        }
        (FieldKind::Enum(ty), NodeValue::Enum { ty: given, member }) => {
            if given.name != ty.name {
                return Err(mismatch(format!(
                    "property '{}' expects enum {}, got {}",
                    column.qualified_name(),
                    ty.name,
                    given.name
                )));
            }
            ty.encode(member).map_err(|e| match e {
                Error::Bulk(b) => Error::Bulk(
                    b.with_table(mapping.table())
                        .with_column(column.name.clone()),
                ),
                other => other,
            })
        }
        (FieldKind::Enum(ty), NodeValue::Scalar(v)) => Err(mismatch(format!(
            "property '{}' expects enum {}, got {}",
            column.qualified_name(),
            ty.name,
            v.type_name()
        ))),
        (FieldKind::Scalar(sql_type), NodeValue::Enum { ty, .. }) => Err(mismatch(format!(
            "property '{}' is {}, got enum {}",
            column.qualified_name(),
            sql_type.sql_name(),
            ty.name
        ))),
    }
}

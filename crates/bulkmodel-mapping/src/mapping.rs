//! Table mappings: the column layout of one flattened root entity.
//!
//! A [`TableMapping`] is built once per root schema and shared by the
//! flattener, the reconstructor, and the bulk writer. Building it checks the
//! rules that keep flattening reversible:
//!
//! - column names are a bijection with `(path, leaf)` pairs
//! - key columns are non-nullable root properties
//! - every optional level has a presence witness, a column that is never
//!   NULL while the level exists
//!
//! Levels are laid out depth-first, own fields before children, so the
//! columns of any subtree occupy one contiguous range.

use crate::entity::RootEntity;
use crate::enums::EnumType;
use crate::naming::NamingConvention;
use crate::schema::{EntitySchema, FieldDef, RootSchema};
use bulkmodel_core::{BulkError, ColumnInfo, Error, Result, SqlType};
use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::sync::Arc;

/// Deepest ownership chain accepted, counting the root as level zero.
pub const MAX_OWNED_DEPTH: usize = 32;

/// One flattened column.
#[derive(Debug, Clone)]
pub struct MappedColumn {
    pub name: String,
    /// Owned navigations from the root to the field's entity.
    pub path: Vec<&'static str>,
    pub field: &'static FieldDef,
    /// Index of the owning level in [`TableMapping::levels`].
    pub level: usize,
    pub is_key: bool,
    /// Whether the table column may hold NULL: the field is nullable or some
    /// level on its path is optional.
    pub nullable_in_table: bool,
}

impl MappedColumn {
    pub fn sql_type(&self) -> SqlType {
        self.field.storage_type()
    }

    pub fn enum_type(&self) -> Option<&'static EnumType> {
        self.field.enum_type()
    }

    /// Dotted `(path, leaf)` form, for messages.
    pub fn qualified_name(&self) -> String {
        let mut parts = self.path.clone();
        parts.push(self.field.name);
        parts.join(".")
    }
}

/// One entity level in the owned tree.
#[derive(Debug, Clone)]
pub struct LevelMapping {
    pub path: Vec<&'static str>,
    pub schema: &'static EntitySchema,
    /// The root level is always required.
    pub required: bool,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    /// Columns of this level's own fields.
    pub own_columns: Range<usize>,
    /// Columns of this level and everything below it.
    pub subtree_columns: Range<usize>,
}

impl LevelMapping {
    /// Name of the navigation leading to this level; `None` for the root.
    pub fn navigation(&self) -> Option<&'static str> {
        self.path.last().copied()
    }

    pub fn depth(&self) -> usize {
        self.path.len()
    }

    pub fn display_path(&self) -> String {
        if self.path.is_empty() {
            self.schema.name.to_string()
        } else {
            self.path.join(".")
        }
    }
}

/// Column layout of a root entity's table.
#[derive(Debug, Clone)]
pub struct TableMapping {
    table: String,
    schema_name: Option<String>,
    key_columns: Vec<String>,
    columns: Vec<MappedColumn>,
    levels: Vec<LevelMapping>,
    column_info: Arc<ColumnInfo>,
    naming: NamingConvention,
}

fn mismatch(table: &str, message: String) -> Error {
    Error::Bulk(BulkError::schema_mismatch(message).with_table(table))
}

impl TableMapping {
    /// Build the mapping of a root entity type with default naming.
    #[allow(clippy::result_large_err)]
    pub fn of<T: RootEntity>() -> Result<Self> {
        Self::build(T::ROOT, NamingConvention::default())
    }

    /// Build the mapping of a root entity type with custom naming.
    #[allow(clippy::result_large_err)]
    pub fn of_with<T: RootEntity>(naming: NamingConvention) -> Result<Self> {
        Self::build(T::ROOT, naming)
    }

    /// Build and validate a mapping from a root schema.
    #[allow(clippy::result_large_err)]
    pub fn build(root: &RootSchema, naming: NamingConvention) -> Result<Self> {
        let mut builder = Builder {
            table: root.table,
            naming: &naming,
            columns: Vec::new(),
            levels: Vec::new(),
            names: HashMap::new(),
            ancestors: Vec::new(),
        };
        builder.visit(root.entity, Vec::new(), true, None, false)?;
        let Builder {
            mut columns,
            levels,
            ..
        } = builder;

        if root.key.is_empty() {
            return Err(mismatch(
                root.table,
                format!("root entity {} declares no key", root.entity.name),
            ));
        }
        let mut key_columns = Vec::with_capacity(root.key.len());
        let root_range = levels[0].own_columns.clone();
        for key in root.key {
            let Some(idx) = root_range
                .clone()
                .find(|&i| columns[i].field.name == *key)
            else {
                return Err(mismatch(
                    root.table,
                    format!(
                        "key property '{key}' is not a root-level field of {}",
                        root.entity.name
                    ),
                ));
            };
            let column = &mut columns[idx];
            if column.field.nullable {
                return Err(Error::Bulk(
                    BulkError::schema_mismatch(format!("key property '{key}' is nullable"))
                        .with_table(root.table)
                        .with_column(column.name.clone()),
                ));
            }
            if column.is_key {
                return Err(mismatch(root.table, format!("key property '{key}' listed twice")));
            }
            column.is_key = true;
            key_columns.push(column.name.clone());
        }

        for level in levels.iter().skip(1) {
            if !level.required && !has_witness(&levels, &columns, level) {
                return Err(mismatch(
                    root.table,
                    format!(
                        "optional owned entity '{}' has no presence witness: \
                         give it a non-nullable property or a required owned child that has one",
                        level.display_path()
                    ),
                ));
            }
        }

        let column_info = Arc::new(ColumnInfo::new(
            columns.iter().map(|c| c.name.clone()).collect(),
        ));

        tracing::debug!(
            table = root.table,
            columns = columns.len(),
            levels = levels.len(),
            "Built table mapping"
        );

        Ok(Self {
            table: root.table.to_string(),
            schema_name: root.schema_name.map(str::to_string),
            key_columns,
            columns,
            levels,
            column_info,
            naming,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn schema_name(&self) -> Option<&str> {
        self.schema_name.as_deref()
    }

    pub fn key_columns(&self) -> &[String] {
        &self.key_columns
    }

    pub fn columns(&self) -> &[MappedColumn] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&MappedColumn> {
        self.column_info.index_of(name).map(|i| &self.columns[i])
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.column_info.index_of(name)
    }

    /// Column names in layout order.
    pub fn column_names(&self) -> &[String] {
        self.column_info.names()
    }

    /// Shared column metadata for rows produced from this mapping.
    pub fn column_info(&self) -> Arc<ColumnInfo> {
        Arc::clone(&self.column_info)
    }

    pub fn levels(&self) -> &[LevelMapping] {
        &self.levels
    }

    pub fn root(&self) -> &LevelMapping {
        &self.levels[0]
    }

    /// Columns of root-level properties only.
    pub fn root_columns(&self) -> &[MappedColumn] {
        &self.columns[self.levels[0].own_columns.clone()]
    }

    /// Deepest owned level, the root being zero.
    pub fn depth(&self) -> usize {
        self.levels.iter().map(LevelMapping::depth).max().unwrap_or(0)
    }

    pub fn naming(&self) -> &NamingConvention {
        &self.naming
    }

    /// Find a column by owned path and leaf property name.
    pub fn column_for(&self, path: &[&str], leaf: &str) -> Option<&MappedColumn> {
        self.columns
            .iter()
            .find(|c| c.field.name == leaf && c.path.as_slice() == path)
    }
}

fn has_witness(levels: &[LevelMapping], columns: &[MappedColumn], level: &LevelMapping) -> bool {
    columns[level.own_columns.clone()]
        .iter()
        .any(|c| !c.field.nullable)
        || level
            .children
            .iter()
            .map(|&i| &levels[i])
            .any(|child| child.required && has_witness(levels, columns, child))
}

struct Builder<'a> {
    table: &'static str,
    naming: &'a NamingConvention,
    columns: Vec<MappedColumn>,
    levels: Vec<LevelMapping>,
    /// Column name -> qualified `(path, leaf)` that claimed it.
    names: HashMap<String, String>,
    ancestors: Vec<&'static EntitySchema>,
}

impl Builder<'_> {
    #[allow(clippy::result_large_err)]
    fn visit(
        &mut self,
        schema: &'static EntitySchema,
        path: Vec<&'static str>,
        required: bool,
        parent: Option<usize>,
        optional_above: bool,
    ) -> Result<usize> {
        if path.len() > MAX_OWNED_DEPTH {
            return Err(mismatch(
                self.table,
                format!("owned chain deeper than {MAX_OWNED_DEPTH} levels"),
            ));
        }
        if self.ancestors.iter().any(|a| std::ptr::eq(*a, schema)) {
            return Err(mismatch(
                self.table,
                format!("entity {} owns itself through '{}'", schema.name, path.join(".")),
            ));
        }
        check_local_names(self.table, schema)?;

        let index = self.levels.len();
        let start = self.columns.len();
        let nullable_level = optional_above || !required;

        for field in schema.fields {
            if let Some(ty) = field.enum_type() {
                ty.validate().map_err(|e| match e {
                    Error::Bulk(b) => Error::Bulk(b.with_table(self.table)),
                    other => other,
                })?;
            }
            let name = self.naming.column_name(&path, field.column_segment());
            let mut qualified = path.clone();
            qualified.push(field.name);
            let qualified = qualified.join(".");
            if let Some(previous) = self.names.insert(name.clone(), qualified.clone()) {
                return Err(Error::Bulk(
                    BulkError::schema_mismatch(format!(
                        "'{previous}' and '{qualified}' both flatten to column '{name}'"
                    ))
                    .with_table(self.table)
                    .with_column(name),
                ));
            }
            self.columns.push(MappedColumn {
                name,
                path: path.clone(),
                field,
                level: index,
                is_key: false,
                nullable_in_table: nullable_level || field.nullable,
            });
        }
        let own_end = self.columns.len();

        self.levels.push(LevelMapping {
            path: path.clone(),
            schema,
            required,
            parent,
            children: Vec::new(),
            own_columns: start..own_end,
            subtree_columns: start..own_end,
        });

        self.ancestors.push(schema);
        for owned in schema.owned {
            let mut child_path = path.clone();
            child_path.push(owned.name);
            let child = self.visit(
                owned.schema,
                child_path,
                owned.required,
                Some(index),
                nullable_level,
            )?;
            self.levels[index].children.push(child);
        }
        self.ancestors.pop();

        self.levels[index].subtree_columns = start..self.columns.len();
        Ok(index)
    }
}

#[allow(clippy::result_large_err)]
fn check_local_names(table: &str, schema: &EntitySchema) -> Result<()> {
    let mut seen = HashSet::new();
    let names = schema
        .fields
        .iter()
        .map(|f| f.name)
        .chain(schema.owned.iter().map(|o| o.name));
    for name in names {
        if !seen.insert(name) {
            return Err(mismatch(
                table,
                format!("entity {} declares '{name}' more than once", schema.name),
            ));
        }
    }
    Ok(())
}

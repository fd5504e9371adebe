//! Static schema descriptors for owned entity graphs.
//!
//! Schemas are plain `const` data so an entity type can hand out a
//! `&'static EntitySchema` without any registration step:
//!
//! ```rust,ignore
//! const THIRD: EntitySchema = EntitySchema::new("ThirdNested")
//!     .fields(&[FieldDef::text("ThirdNestedProperty").nullable(true)]);
//!
//! const SECOND: EntitySchema = EntitySchema::new("SecondNested")
//!     .fields(&[FieldDef::text("SecondNestedProperty")])
//!     .owned(&[OwnedDef::optional("ThirdNested", &THIRD)]);
//! ```

use crate::enums::EnumType;
use bulkmodel_core::SqlType;

/// How a field is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// A plain scalar column.
    Scalar(SqlType),
    /// An enumerated property stored as its integer member value.
    Enum(&'static EnumType),
}

/// One scalar property of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    /// Property name, as used in [`Node`](crate::Node) entries.
    pub name: &'static str,
    /// Overrides the leaf segment of the flattened column name.
    pub column: Option<&'static str>,
    pub kind: FieldKind,
    pub nullable: bool,
}

impl FieldDef {
    /// Create a non-nullable field.
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            column: None,
            kind,
            nullable: false,
        }
    }

    /// Create a non-nullable scalar field.
    pub const fn scalar(name: &'static str, sql_type: SqlType) -> Self {
        Self::new(name, FieldKind::Scalar(sql_type))
    }

    /// Create a non-nullable text field.
    pub const fn text(name: &'static str) -> Self {
        Self::scalar(name, SqlType::Text)
    }

    /// Create a non-nullable enumerated field.
    pub const fn enumeration(name: &'static str, ty: &'static EnumType) -> Self {
        Self::new(name, FieldKind::Enum(ty))
    }

    /// Set whether the field accepts NULL.
    pub const fn nullable(mut self, value: bool) -> Self {
        self.nullable = value;
        self
    }

    /// Override the leaf segment of the column name.
    pub const fn column(mut self, name: &'static str) -> Self {
        self.column = Some(name);
        self
    }

    /// The leaf segment used when naming this field's column.
    pub fn column_segment(&self) -> &'static str {
        self.column.unwrap_or(self.name)
    }

    /// The SQL type of the stored column.
    pub fn storage_type(&self) -> SqlType {
        match self.kind {
            FieldKind::Scalar(sql_type) => sql_type,
            FieldKind::Enum(ty) => ty.storage,
        }
    }

    /// The enumeration this field is restricted to, if any.
    pub fn enum_type(&self) -> Option<&'static EnumType> {
        match self.kind {
            FieldKind::Enum(ty) => Some(ty),
            FieldKind::Scalar(_) => None,
        }
    }
}

/// An owned navigation from one entity to a nested entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnedDef {
    /// Navigation name; becomes a segment of every column below it.
    pub name: &'static str,
    pub schema: &'static EntitySchema,
    /// Required levels must always be present; optional levels flatten to
    /// all-NULL columns when absent.
    pub required: bool,
}

impl OwnedDef {
    pub const fn required(name: &'static str, schema: &'static EntitySchema) -> Self {
        Self {
            name,
            schema,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, schema: &'static EntitySchema) -> Self {
        Self {
            name,
            schema,
            required: false,
        }
    }
}

/// The shape of one entity: its scalar fields and owned navigations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntitySchema {
    pub name: &'static str,
    pub fields: &'static [FieldDef],
    pub owned: &'static [OwnedDef],
}

impl EntitySchema {
    /// Create an entity schema with no fields and no owned navigations.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            fields: &[],
            owned: &[],
        }
    }

    pub const fn fields(mut self, fields: &'static [FieldDef]) -> Self {
        self.fields = fields;
        self
    }

    pub const fn owned(mut self, owned: &'static [OwnedDef]) -> Self {
        self.owned = owned;
        self
    }

    /// Look up a scalar field by property name.
    pub fn field(&self, name: &str) -> Option<&'static FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Look up an owned navigation by name.
    pub fn navigation(&self, name: &str) -> Option<&'static OwnedDef> {
        self.owned.iter().find(|o| o.name == name)
    }
}

/// Table-level facts about a root entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootSchema {
    pub table: &'static str,
    pub schema_name: Option<&'static str>,
    /// Root-level property names forming the primary key.
    pub key: &'static [&'static str],
    pub entity: &'static EntitySchema,
}

impl RootSchema {
    pub const fn new(
        table: &'static str,
        key: &'static [&'static str],
        entity: &'static EntitySchema,
    ) -> Self {
        Self {
            table,
            schema_name: None,
            key,
            entity,
        }
    }

    /// Qualify the table with a database schema (e.g. `dbo`).
    pub const fn in_schema(mut self, schema_name: &'static str) -> Self {
        self.schema_name = Some(schema_name);
        self
    }
}

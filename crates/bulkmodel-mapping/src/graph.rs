//! Untyped entity graphs.
//!
//! A [`Node`] is the schema-agnostic form of one entity instance: named
//! scalar values plus named owned children, each child present or absent.
//! Typed entities convert to and from nodes through
//! [`OwnedEntity`](crate::OwnedEntity); the flattener and reconstructor only
//! ever see nodes.

use crate::OwnedEntity;
use crate::enums::{EnumType, SqlEnum};
use bulkmodel_core::{BulkError, Error, FromValue, Result, Value};

/// A property value inside a [`Node`].
#[derive(Debug, Clone, PartialEq)]
pub enum NodeValue {
    Scalar(Value),
    /// An enumerated property, carried symbolically until it is flattened.
    Enum {
        ty: &'static EnumType,
        member: &'static str,
    },
}

impl NodeValue {
    pub fn is_null(&self) -> bool {
        matches!(self, NodeValue::Scalar(Value::Null))
    }
}

impl From<Value> for NodeValue {
    fn from(value: Value) -> Self {
        NodeValue::Scalar(value)
    }
}

/// One entity instance with its owned subtree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Node {
    fields: Vec<(&'static str, NodeValue)>,
    owned: Vec<(&'static str, Option<Node>)>,
}

fn schema_mismatch(message: String) -> Error {
    Error::Bulk(BulkError::schema_mismatch(message))
}

impl Node {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Building
    // ------------------------------------------------------------------

    /// Set a property from an already built [`NodeValue`].
    pub fn with_property(mut self, name: &'static str, value: NodeValue) -> Self {
        self.set(name, value);
        self
    }

    /// Set a scalar property.
    pub fn with_value(self, name: &'static str, value: impl Into<Value>) -> Self {
        self.with_property(name, NodeValue::Scalar(value.into()))
    }

    /// Set an enumerated property.
    pub fn with_enum<E: SqlEnum>(self, name: &'static str, value: E) -> Self {
        self.with_property(
            name,
            NodeValue::Enum {
                ty: E::TYPE,
                member: value.member_name(),
            },
        )
    }

    /// Set a nullable enumerated property.
    pub fn with_enum_opt<E: SqlEnum>(self, name: &'static str, value: Option<E>) -> Self {
        match value {
            Some(value) => self.with_enum(name, value),
            None => self.with_value(name, Value::Null),
        }
    }

    /// Attach an owned child, or mark it absent with `None`.
    pub fn with_owned(mut self, name: &'static str, child: Option<Node>) -> Self {
        match self.owned.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = child,
            None => self.owned.push((name, child)),
        }
        self
    }

    /// Attach a typed owned child.
    pub fn with_entity<T: OwnedEntity>(self, name: &'static str, child: Option<&T>) -> Self {
        self.with_owned(name, child.map(OwnedEntity::to_node))
    }

    fn set(&mut self, name: &'static str, value: NodeValue) {
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    pub fn value(&self, name: &str) -> Option<&NodeValue> {
        self.fields.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    /// `None` when the navigation isn't listed, `Some(None)` when it is
    /// listed as absent.
    pub fn owned(&self, name: &str) -> Option<Option<&Node>> {
        self.owned
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, child)| child.as_ref())
    }

    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &NodeValue)> {
        self.fields.iter().map(|(n, v)| (*n, v))
    }

    pub fn owned_entries(&self) -> impl Iterator<Item = (&'static str, Option<&Node>)> {
        self.owned.iter().map(|(n, c)| (*n, c.as_ref()))
    }

    // ------------------------------------------------------------------
    // Consuming (used by `OwnedEntity::from_node`)
    // ------------------------------------------------------------------

    fn take(&mut self, name: &str) -> Result<NodeValue> {
        let pos = self
            .fields
            .iter()
            .position(|(n, _)| *n == name)
            .ok_or_else(|| schema_mismatch(format!("node has no property '{name}'")))?;
        Ok(self.fields.swap_remove(pos).1)
    }

    /// Remove a scalar property and convert it.
    #[allow(clippy::result_large_err)]
    pub fn take_value<T: FromValue>(&mut self, name: &str) -> Result<T> {
        match self.take(name)? {
            NodeValue::Scalar(value) => T::from_value(&value),
            NodeValue::Enum { ty, .. } => Err(schema_mismatch(format!(
                "property '{name}' holds enum {}, not a scalar",
                ty.name
            ))),
        }
    }

    /// Remove a non-nullable enumerated property.
    #[allow(clippy::result_large_err)]
    pub fn take_enum<E: SqlEnum>(&mut self, name: &str) -> Result<E> {
        self.take_enum_opt(name)?.ok_or_else(|| {
            schema_mismatch(format!(
                "property '{name}' of enum {} is NULL",
                E::TYPE.name
            ))
        })
    }

    /// Remove a nullable enumerated property.
    #[allow(clippy::result_large_err)]
    pub fn take_enum_opt<E: SqlEnum>(&mut self, name: &str) -> Result<Option<E>> {
        match self.take(name)? {
            NodeValue::Scalar(Value::Null) => Ok(None),
            NodeValue::Scalar(other) => Err(schema_mismatch(format!(
                "property '{name}' holds {}, expected enum {}",
                other.type_name(),
                E::TYPE.name
            ))),
            NodeValue::Enum { ty, member } => {
                if ty.name != E::TYPE.name {
                    return Err(schema_mismatch(format!(
                        "property '{name}' holds enum {}, expected {}",
                        ty.name,
                        E::TYPE.name
                    )));
                }
                E::from_member_name(member).map(Some).ok_or_else(|| {
                    schema_mismatch(format!(
                        "enum {} has no Rust variant for member '{member}'",
                        ty.name
                    ))
                })
            }
        }
    }

    /// Remove an owned child and convert it; absent children yield `None`.
    #[allow(clippy::result_large_err)]
    pub fn take_owned<T: OwnedEntity>(&mut self, name: &str) -> Result<Option<T>> {
        let pos = self
            .owned
            .iter()
            .position(|(n, _)| *n == name)
            .ok_or_else(|| schema_mismatch(format!("node has no owned navigation '{name}'")))?;
        self.owned.swap_remove(pos).1.map(T::from_node).transpose()
    }

    /// Remove an owned child that must be present.
    #[allow(clippy::result_large_err)]
    pub fn take_required<T: OwnedEntity>(&mut self, name: &str) -> Result<T> {
        self.take_owned(name)?
            .ok_or_else(|| Error::Bulk(BulkError::missing_owned(name)))
    }
}

//! Enumerated properties.
//!
//! An enumerated property is stored as the integer value of its member and
//! read back as the symbolic member. Rust enums opt in by implementing
//! [`SqlEnum`] against a const [`EnumType`] descriptor.

use bulkmodel_core::{BulkError, Error, Result, SqlType, Value};
use std::collections::HashSet;

/// One named member of an enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumMember {
    pub name: &'static str,
    pub value: i64,
}

impl EnumMember {
    pub const fn new(name: &'static str, value: i64) -> Self {
        Self { name, value }
    }
}

/// Descriptor of an integer-backed enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumType {
    pub name: &'static str,
    /// Integer column type the member values are stored in.
    pub storage: SqlType,
    pub members: &'static [EnumMember],
}

impl EnumType {
    /// Create an enumeration stored as `INTEGER`.
    pub const fn new(name: &'static str, members: &'static [EnumMember]) -> Self {
        Self {
            name,
            storage: SqlType::Integer,
            members,
        }
    }

    /// Store member values in a different integer type.
    pub const fn storage(mut self, storage: SqlType) -> Self {
        self.storage = storage;
        self
    }

    pub fn member_by_name(&self, name: &str) -> Option<&'static EnumMember> {
        self.members.iter().find(|m| m.name == name)
    }

    pub fn member_by_value(&self, value: i64) -> Option<&'static EnumMember> {
        self.members.iter().find(|m| m.value == value)
    }

    /// Encode a member name as its stored integer.
    #[allow(clippy::result_large_err)]
    pub fn encode(&self, member: &str) -> Result<Value> {
        let found = self.member_by_name(member).ok_or_else(|| {
            Error::Bulk(BulkError::schema_mismatch(format!(
                "'{member}' is not a member of enum {}",
                self.name
            )))
        })?;
        self.storage.integer_value(found.value)
    }

    /// Decode a stored value into its member.
    ///
    /// Integers that name no member fail with `InvalidEnumValue`.
    #[allow(clippy::result_large_err)]
    pub fn decode(&self, value: &Value) -> Result<&'static EnumMember> {
        let raw = match value {
            Value::Bool(_) | Value::Decimal(_) => None,
            other => other.as_i64(),
        };
        let Some(raw) = raw else {
            return Err(Error::Bulk(BulkError::schema_mismatch(format!(
                "enum {} expects an integer, got {}",
                self.name,
                value.type_name()
            ))));
        };
        self.member_by_value(raw)
            .ok_or_else(|| Error::Bulk(BulkError::invalid_enum(self.name, raw)))
    }

    /// Check that the descriptor is usable as a column mapping.
    #[allow(clippy::result_large_err)]
    pub(crate) fn validate(&self) -> Result<()> {
        let fail = |message: String| Err(Error::Bulk(BulkError::schema_mismatch(message)));
        if !self.storage.is_integer() {
            return fail(format!(
                "enum {} must be stored in an integer column, not {}",
                self.name,
                self.storage.sql_name()
            ));
        }
        if self.members.is_empty() {
            return fail(format!("enum {} has no members", self.name));
        }
        let mut names = HashSet::new();
        let mut values = HashSet::new();
        for member in self.members {
            if !names.insert(member.name) {
                return fail(format!(
                    "enum {} declares member '{}' twice",
                    self.name, member.name
                ));
            }
            if !values.insert(member.value) {
                return fail(format!(
                    "enum {} reuses value {} for member '{}'",
                    self.name, member.value, member.name
                ));
            }
            if self.storage.integer_value(member.value).is_err() {
                return fail(format!(
                    "enum {} member '{}' = {} does not fit {}",
                    self.name,
                    member.name,
                    member.value,
                    self.storage.sql_name()
                ));
            }
        }
        Ok(())
    }
}

/// A Rust enum mapped onto an [`EnumType`].
///
/// ```rust,ignore
/// #[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// enum Level { A, B }
///
/// const LEVEL: EnumType = EnumType::new(
///     "Level",
///     &[EnumMember::new("A", 1), EnumMember::new("B", 2)],
/// );
///
/// impl SqlEnum for Level {
///     const TYPE: &'static EnumType = &LEVEL;
///     fn member_name(self) -> &'static str {
///         match self { Level::A => "A", Level::B => "B" }
///     }
///     fn from_member_name(name: &str) -> Option<Self> {
///         match name { "A" => Some(Level::A), "B" => Some(Level::B), _ => None }
///     }
/// }
/// ```
pub trait SqlEnum: Sized + Copy + 'static {
    const TYPE: &'static EnumType;

    fn member_name(self) -> &'static str;

    fn from_member_name(name: &str) -> Option<Self>;
}

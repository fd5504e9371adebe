//! SQL column types.
//!
//! Owned-entity schemas are declared in `const` context, so this enum only
//! carries `Copy` payloads.

use crate::error::{Error, TypeError};
use crate::value::Value;

/// SQL data types a flattened column may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    // Integer types
    TinyInt,
    SmallInt,
    Integer,
    BigInt,

    // Floating point / fixed precision
    Double,
    Decimal { precision: u8, scale: u8 },

    Boolean,

    // String and binary
    Text,
    Blob,

    // Date/time
    Date,
    Time,
    Timestamp,

    Uuid,
    Json,
}

impl SqlType {
    /// Get the SQL type name for this type.
    pub fn sql_name(&self) -> String {
        match self {
            SqlType::TinyInt => "TINYINT".to_string(),
            SqlType::SmallInt => "SMALLINT".to_string(),
            SqlType::Integer => "INTEGER".to_string(),
            SqlType::BigInt => "BIGINT".to_string(),
            SqlType::Double => "DOUBLE PRECISION".to_string(),
            SqlType::Decimal { precision, scale } => format!("DECIMAL({}, {})", precision, scale),
            SqlType::Boolean => "BOOLEAN".to_string(),
            SqlType::Text => "TEXT".to_string(),
            SqlType::Blob => "BLOB".to_string(),
            SqlType::Date => "DATE".to_string(),
            SqlType::Time => "TIME".to_string(),
            SqlType::Timestamp => "TIMESTAMP".to_string(),
            SqlType::Uuid => "UUID".to_string(),
            SqlType::Json => "JSON".to_string(),
        }
    }

    /// Check if this type is an integer type.
    pub const fn is_integer(&self) -> bool {
        matches!(
            self,
            SqlType::TinyInt | SqlType::SmallInt | SqlType::Integer | SqlType::BigInt
        )
    }

    /// Does a value submitted for this column have an acceptable shape?
    ///
    /// NULL is always accepted here; nullability is checked separately.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (t, v) if t.is_integer() => {
                !matches!(v, Value::Bool(_) | Value::Decimal(_))
                    && v.as_i64().is_some_and(|n| t.integer_value(n).is_ok())
            }
            (SqlType::Double, Value::Double(_)) => true,
            (SqlType::Decimal { .. }, Value::Decimal(_) | Value::Double(_)) => true,
            (SqlType::Boolean, Value::Bool(_)) => true,
            (SqlType::Text, Value::Text(_)) => true,
            (SqlType::Blob, Value::Bytes(_)) => true,
            (SqlType::Date, Value::Date(_)) => true,
            (SqlType::Time, Value::Time(_)) => true,
            (SqlType::Timestamp, Value::Timestamp(_)) => true,
            (SqlType::Uuid, Value::Uuid(_)) => true,
            (SqlType::Json, Value::Json(_)) => true,
            _ => false,
        }
    }

    /// Encode an integer as the canonical value for this integer type.
    #[allow(clippy::result_large_err)]
    pub fn integer_value(&self, n: i64) -> Result<Value, Error> {
        let out_of_range = || {
            Error::Type(TypeError {
                expected: "integer within column range",
                actual: format!("{n} for {}", self.sql_name()),
                column: None,
            })
        };
        match self {
            SqlType::TinyInt => i8::try_from(n).map(Value::TinyInt).map_err(|_| out_of_range()),
            SqlType::SmallInt => i16::try_from(n).map(Value::SmallInt).map_err(|_| out_of_range()),
            SqlType::Integer => i32::try_from(n).map(Value::Int).map_err(|_| out_of_range()),
            SqlType::BigInt => Ok(Value::BigInt(n)),
            _ => Err(Error::Type(TypeError {
                expected: "integer column type",
                actual: self.sql_name(),
                column: None,
            })),
        }
    }

    /// Normalize a fetched value to the canonical variant for this type.
    ///
    /// Drivers disagree on widths and encodings (MySQL returns `BIGINT` for
    /// every integer and text as bytes; SQL Server returns `BIT` as an
    /// integer). Normalizing keeps reconstructed graphs structurally equal
    /// to what was flattened, whatever backend served the read.
    #[allow(clippy::result_large_err)]
    pub fn normalize(&self, value: Value) -> Result<Value, Error> {
        if value.is_null() {
            return Ok(value);
        }
        let mismatch = |v: &Value| {
            Error::Type(TypeError {
                expected: "value matching column type",
                actual: format!("{} for {}", v.type_name(), self.sql_name()),
                column: None,
            })
        };
        match self {
            t if t.is_integer() => match value.as_i64() {
                Some(n) if !matches!(value, Value::Bool(_)) => t.integer_value(n),
                _ => Err(mismatch(&value)),
            },
            SqlType::Boolean => value.as_bool().map(Value::Bool).ok_or_else(|| mismatch(&value)),
            SqlType::Double => value.as_f64().map(Value::Double).ok_or_else(|| mismatch(&value)),
            SqlType::Text => match value {
                Value::Text(_) => Ok(value),
                Value::Bytes(b) => String::from_utf8(b)
                    .map(Value::Text)
                    .map_err(|e| mismatch(&Value::Bytes(e.into_bytes()))),
                other => Err(mismatch(&other)),
            },
            _ if self.accepts(&value) => Ok(value),
            _ => Err(mismatch(&value)),
        }
    }
}

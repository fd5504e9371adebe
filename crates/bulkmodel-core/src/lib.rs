//! Core types and traits for bulkmodel.
//!
//! This crate provides the foundations every other bulkmodel crate builds on:
//!
//! - `Value` and `Row` for dynamically typed SQL data
//! - `Error` with the bulk-operation taxonomy (`BulkErrorKind`)
//! - `Connection` / `TransactionOps` traits that database drivers implement
//! - `Dialect`, the backend selector (SQL Server, PostgreSQL, MySQL)
//! - `Outcome` and `Cx` re-exported from asupersync for cancel-correct I/O

// Re-export asupersync primitives for structured concurrency
pub use asupersync::{Cx, Outcome};

pub mod connection;
pub mod dialect;
pub mod error;
pub mod row;
pub mod types;
pub mod value;

pub use connection::{Connection, IsolationLevel, TransactionOps};
pub use dialect::Dialect;
pub use error::{
    BulkError, BulkErrorKind, ConfigError, Error, FieldValidationError, QueryError,
    QueryErrorKind, Result, TransactionError, TypeError, ValidationError, ValidationErrorKind,
};
pub use row::{ColumnInfo, FromValue, Row};
pub use types::SqlType;
pub use value::Value;

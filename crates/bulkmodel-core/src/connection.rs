//! Database connection traits.
//!
//! Drivers implement [`Connection`] and [`TransactionOps`]; the bulk writer
//! only ever talks to a database through them. All operations take a `Cx`
//! so a bulk upsert can be cancelled between statements.

use crate::dialect::Dialect;
use crate::error::{BulkError, Error, Result};
use crate::row::Row;
use crate::value::Value;
use asupersync::{Cx, Outcome};
use std::future::Future;

/// Transaction isolation level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    /// Dirty reads, non-repeatable reads and phantoms possible.
    ReadUncommitted,
    /// Only committed changes are visible. Default on SQL Server and PostgreSQL.
    #[default]
    ReadCommitted,
    /// Consistent snapshot of rows already read. Default on MySQL/InnoDB.
    RepeatableRead,
    /// Transactions appear to execute sequentially.
    Serializable,
}

impl IsolationLevel {
    /// Get the SQL syntax for this isolation level.
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

/// A database connection capable of executing queries.
///
/// Implementations must be `Send + Sync` for use across async boundaries.
///
/// # Example
///
/// ```rust,ignore
/// let rows = conn.query(&cx, "SELECT [NestedRootId] FROM [NestedRoot]", &[]).await;
///
/// let tx = conn.begin(&cx).await?;
/// tx.execute(&cx, "DELETE FROM [NestedRoot] WHERE [NestedRootId] = @p1", &[key]).await?;
/// tx.commit(&cx).await?;
/// ```
pub trait Connection: Send + Sync {
    /// The transaction type returned by this connection.
    type Tx<'conn>: TransactionOps
    where
        Self: 'conn;

    /// The SQL dialect this connection speaks.
    fn dialect(&self) -> Dialect;

    /// Execute a query and return all rows.
    fn query(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send;

    /// Execute a statement and return rows affected.
    fn execute(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send;

    /// Begin a transaction with default isolation level (ReadCommitted).
    fn begin(&self, cx: &Cx) -> impl Future<Output = Outcome<Self::Tx<'_>, Error>> + Send {
        self.begin_with(cx, IsolationLevel::default())
    }

    /// Begin a transaction with a specific isolation level.
    fn begin_with(
        &self,
        cx: &Cx,
        isolation: IsolationLevel,
    ) -> impl Future<Output = Outcome<Self::Tx<'_>, Error>> + Send;

    /// Check if the connection is still valid by sending a ping.
    fn ping(&self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send;

    /// Close the connection gracefully.
    fn close(self, cx: &Cx) -> impl Future<Output = Result<()>> + Send;
}

/// Operations available inside a transaction.
///
/// Transactions must be explicitly committed or rolled back; the bulk writer
/// always does one or the other before returning.
pub trait TransactionOps: Send {
    /// Execute a query within this transaction.
    fn query(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send;

    /// Execute a statement within this transaction.
    fn execute(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send;

    /// Stream rows into `table` with the backend's native bulk-copy protocol
    /// (SQL Server TDS bulk load, PostgreSQL `COPY ... FROM STDIN`).
    ///
    /// `table` is already quoted for the connection's dialect. Drivers
    /// without a native protocol keep this default, which fails with
    /// `BackendUnsupportedOperation` without touching the server so callers
    /// can fall back to multi-row inserts inside the same transaction.
    fn copy_in(
        &self,
        _cx: &Cx,
        table: &str,
        _columns: &[String],
        _rows: &[Vec<Value>],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        let message = format!("native bulk copy into {table} is not supported by this driver");
        async move { Outcome::Err(Error::Bulk(BulkError::unsupported(message))) }
    }

    /// Commit the transaction, making all changes permanent.
    fn commit(self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send;

    /// Rollback the transaction, discarding all changes.
    ///
    /// Drivers may refuse to send anything once `cx` is cancelled, so the
    /// bulk writer rolls back a cancelled call under a fresh cleanup context.
    /// A driver must not report `Ok` unless the server acknowledged the
    /// rollback.
    fn rollback(self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send;
}

//! bulkmodel: set-based bulk upsert of nested owned entity graphs.
//!
//! A root entity owns a chain of nested entities that have no table of their
//! own. bulkmodel stores the whole chain as columns of the root's row:
//!
//! - **Flattening** turns each graph into one row, naming columns by owned
//!   path (`FirstNested_SecondNested_SecondNestedProperty`)
//! - **Bulk writing** loads rows into a staging table and merges them into
//!   the target in one transaction, on SQL Server, PostgreSQL or MySQL
//! - **Reconstruction** turns stored rows back into the same graphs,
//!   leaving absent optional levels absent and decoding enum members
//!
//! # Quick Start
//!
//! ```ignore
//! use bulkmodel::prelude::*;
//!
//! const SECOND: EntitySchema = EntitySchema::new("SecondNested")
//!     .fields(&[FieldDef::text("SecondNestedProperty")]);
//! const FIRST: EntitySchema = EntitySchema::new("FirstNested")
//!     .fields(&[FieldDef::text("FirstNestedProperty")])
//!     .owned(&[OwnedDef::required("SecondNested", &SECOND)]);
//! const ROOT: EntitySchema = EntitySchema::new("NestedRoot")
//!     .fields(&[FieldDef::text("NestedRootId")])
//!     .owned(&[OwnedDef::required("FirstNested", &FIRST)]);
//! const TABLE: RootSchema = RootSchema::new("NestedRoot", &["NestedRootId"], &ROOT);
//!
//! // impl OwnedEntity for each level, RootEntity for the root ...
//!
//! async fn save(cx: &Cx, conn: impl Connection, roots: &[NestedRoot]) -> Outcome<(), Error> {
//!     let ctx = BulkContext::new(conn);
//!     ctx.upsert(cx, roots).await.map(|_| ())
//! }
//! ```

mod context;

pub use context::BulkContext;

pub use bulkmodel_core::{
    BulkError, BulkErrorKind, ColumnInfo, ConfigError, Connection, Cx, Dialect, Error,
    FieldValidationError, FromValue, IsolationLevel, Outcome, QueryError, QueryErrorKind, Result,
    Row, SqlType, TransactionError, TransactionOps, TypeError, ValidationError,
    ValidationErrorKind, Value,
};
pub use bulkmodel_mapping::{
    EntitySchema, EnumMember, EnumType, FieldDef, FieldKind, LevelMapping, MAX_OWNED_DEPTH,
    MappedColumn, NamingConvention, Node, NodeValue, OwnedDef, OwnedEntity, RootEntity,
    RootSchema, SqlEnum, TableMapping, flatten, flatten_all, flatten_node, reconstruct,
    reconstruct_node,
};
pub use bulkmodel_writer::{
    BulkConfig, BulkStrategy, Filter, MySqlStrategy, OwnedRows, PostgresStrategy,
    SqlServerStrategy, UpsertPlan, UpsertSummary, UpsertTarget, bulk_upsert, execute_plan,
    query, query_mapped, select_sql, strategy_for_dialect, upsert_rows,
};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{
        BulkConfig, BulkContext, BulkError, BulkErrorKind, Connection, Cx, Dialect,
        EntitySchema, EnumMember, EnumType, Error, FieldDef, Filter, Node, OwnedDef, OwnedEntity,
        OwnedRows, Outcome, Result, RootEntity, RootSchema, SqlEnum, SqlType, UpsertSummary,
        Value, bulk_upsert, query,
    };
}

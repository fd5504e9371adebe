//! Set-based bulk upsert and query for owned entity graphs.
//!
//! `bulkmodel-writer` turns flattened rows into a staged, transactional
//! upsert per backend and reads stored rows back as nested graphs.
//!
//! # Overview
//!
//! - `BulkConfig` selects keys, update columns, batch size and load path
//! - `UpsertPlan` validates and batches rows before any I/O
//! - `BulkStrategy` renders each backend's staging and merge SQL
//! - `bulk_upsert` / `upsert_rows` run the plan in one transaction
//! - `query` fetches rows and reconstructs entities lazily via `OwnedRows`

pub mod config;
pub mod plan;
pub mod query;
pub mod strategy;
pub mod upsert;

pub use config::BulkConfig;
pub use plan::UpsertPlan;
pub use query::{Filter, OwnedRows, query, query_mapped, select_sql};
pub use strategy::{
    BulkStrategy, MySqlStrategy, PostgresStrategy, SqlServerStrategy, UpsertTarget,
    strategy_for_dialect,
};
pub use upsert::{UpsertSummary, bulk_upsert, execute_plan, upsert_rows};

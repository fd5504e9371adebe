//! Bulk upsert execution.
//!
//! One call runs in one transaction. Each batch goes through the staged
//! pipeline of its [`BulkStrategy`]; any failure or cancellation rolls the
//! whole call back, so the target table is either fully upserted or left
//! as it was.

use crate::config::BulkConfig;
use crate::plan::UpsertPlan;
use crate::strategy::{BulkStrategy, strategy_for_dialect};
use asupersync::{Cx, Outcome};
use bulkmodel_core::{
    BulkError, BulkErrorKind, ConfigError, Connection, Dialect, Error, Row, TransactionError,
    TransactionOps, TypeError, Value,
};
use bulkmodel_mapping::{RootEntity, TableMapping, flatten_all};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Staging table sequence, unique per process.
static STAGING_SEQ: AtomicU64 = AtomicU64::new(1);

/// What one upsert call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpsertSummary {
    /// Rows written after identical duplicates were collapsed.
    pub rows: usize,
    pub batches: usize,
    /// Only counted when `calculate_stats` is on.
    pub inserted: Option<u64>,
    /// Only counted when `calculate_stats` is on.
    pub updated: Option<u64>,
    /// Existing rows left untouched because no column is updated. Only
    /// counted when `calculate_stats` is on.
    pub skipped: Option<u64>,
}

/// Flatten `entities` and upsert them into their table.
pub async fn bulk_upsert<C, T>(
    cx: &Cx,
    conn: &C,
    dialect: Dialect,
    entities: &[T],
    config: &BulkConfig,
) -> Outcome<UpsertSummary, Error>
where
    C: Connection,
    T: RootEntity,
{
    let mapping = match TableMapping::of_with::<T>(config.naming.clone()) {
        Ok(mapping) => mapping,
        Err(e) => return Outcome::Err(e),
    };
    let rows = match flatten_all(&mapping, entities) {
        Ok(rows) => rows,
        Err(e) => return Outcome::Err(e),
    };
    upsert_rows(cx, conn, dialect, &mapping, rows, config).await
}

/// Upsert already flattened rows laid out by `mapping`.
#[tracing::instrument(
    level = "info",
    skip_all,
    fields(table = %mapping.table(), dialect = %dialect, rows = rows.len())
)]
pub async fn upsert_rows<C: Connection>(
    cx: &Cx,
    conn: &C,
    dialect: Dialect,
    mapping: &TableMapping,
    rows: Vec<Row>,
    config: &BulkConfig,
) -> Outcome<UpsertSummary, Error> {
    if conn.dialect() != dialect {
        return Outcome::Err(Error::Config(ConfigError {
            message: format!(
                "upsert requested for {dialect} but the connection speaks {}",
                conn.dialect()
            ),
        }));
    }
    let plan = match UpsertPlan::build(mapping, rows, config, dialect) {
        Ok(plan) => plan,
        Err(e) => return Outcome::Err(e),
    };
    execute_plan(cx, conn, &plan, config).await
}

/// Run a prepared plan inside one transaction.
pub async fn execute_plan<C: Connection>(
    cx: &Cx,
    conn: &C,
    plan: &UpsertPlan,
    config: &BulkConfig,
) -> Outcome<UpsertSummary, Error> {
    let stats = config.calculate_stats;
    if plan.is_empty() {
        tracing::info!(table = %plan.target.table, "Nothing to upsert");
        return Outcome::Ok(UpsertSummary {
            inserted: stats.then_some(0),
            updated: stats.then_some(0),
            skipped: stats.then_some(0),
            ..UpsertSummary::default()
        });
    }

    tracing::info!(
        table = %plan.target.table,
        rows = plan.row_count(),
        collapsed = plan.collapsed,
        batches = plan.batches.len(),
        "Executing bulk upsert"
    );
    let start = std::time::Instant::now();
    let strategy = strategy_for_dialect(plan.dialect);

    let tx = match conn.begin_with(cx, config.isolation).await {
        Outcome::Ok(tx) => tx,
        Outcome::Err(e) => return Outcome::Err(e),
        Outcome::Cancelled(r) => return Outcome::Cancelled(r),
        Outcome::Panicked(p) => return Outcome::Panicked(p),
    };

    let result = match run_batches(cx, &tx, strategy.as_ref(), plan, config).await {
        // Never commit once the caller has given up.
        Outcome::Ok(summary) => match cx.cancel_reason() {
            Some(reason) => Outcome::Cancelled(reason),
            None => Outcome::Ok(summary),
        },
        other => other,
    };
    match result {
        Outcome::Ok(summary) => match tx.commit(cx).await {
            Outcome::Ok(()) => {
                tracing::info!(
                    elapsed_ms = start.elapsed().as_millis(),
                    rows = summary.rows,
                    batches = summary.batches,
                    inserted = ?summary.inserted,
                    updated = ?summary.updated,
                    skipped = ?summary.skipped,
                    "Bulk upsert complete"
                );
                Outcome::Ok(summary)
            }
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        },
        failed => {
            tracing::warn!(table = %plan.target.table, "Bulk upsert failed, rolling back");
            roll_back(cx, tx, &plan.target.table, failed).await
        }
    }
}

/// Roll back after `failed`, returning `failed` once the rollback is
/// acknowledged.
///
/// A cancelled `cx` would stop most drivers before `ROLLBACK` is sent, so the
/// rollback then runs under its own context. A rollback that doesn't
/// complete is reported as a transaction error: the connection may still hold
/// the partial upsert open.
async fn roll_back<Tx: TransactionOps>(
    cx: &Cx,
    tx: Tx,
    table: &str,
    failed: Outcome<UpsertSummary, Error>,
) -> Outcome<UpsertSummary, Error> {
    let cleanup;
    let rollback_cx = if cx.cancel_reason().is_some() {
        cleanup = Cx::for_request();
        &cleanup
    } else {
        cx
    };

    let problem = match tx.rollback(rollback_cx).await {
        Outcome::Ok(()) => return failed,
        Outcome::Err(e) => e.to_string(),
        Outcome::Cancelled(r) => format!("rollback was cancelled ({:?})", r.kind),
        Outcome::Panicked(p) => return Outcome::Panicked(p),
    };
    let cause = match &failed {
        Outcome::Err(e) => e.to_string(),
        Outcome::Cancelled(r) => format!("cancelled ({:?})", r.kind),
        Outcome::Ok(_) | Outcome::Panicked(_) => "upsert failed".to_string(),
    };
    tracing::error!(
        table = table,
        cause = %cause,
        error = %problem,
        "Rollback after failed bulk upsert did not complete"
    );
    Outcome::Err(Error::Transaction(TransactionError {
        message: format!("rollback of bulk upsert into {table} failed: {problem} (after: {cause})"),
    }))
}

async fn run_batches<Tx: TransactionOps>(
    cx: &Cx,
    tx: &Tx,
    strategy: &dyn BulkStrategy,
    plan: &UpsertPlan,
    config: &BulkConfig,
) -> Outcome<UpsertSummary, Error> {
    let target = &plan.target;
    let table = target.table.as_str();
    let dialect = strategy.dialect();
    let mut native_copy = config.use_native_copy && strategy.supports_native_copy();
    if config.use_native_copy && !native_copy {
        tracing::debug!(dialect = %dialect, "No native bulk copy, loading with multi-row inserts");
    }

    let mut summary = UpsertSummary {
        inserted: config.calculate_stats.then_some(0),
        updated: config.calculate_stats.then_some(0),
        skipped: config.calculate_stats.then_some(0),
        ..UpsertSummary::default()
    };
    let insert_only = target.update_columns.is_empty();

    for (index, batch) in plan.batches.iter().enumerate() {
        let seq = STAGING_SEQ.fetch_add(1, Ordering::Relaxed);
        let staging = strategy.staging_name(target, seq);
        let quoted_staging = dialect.quote_identifier(&staging);
        tracing::debug!(batch = index, rows = batch.len(), staging = %staging, "Upserting batch");

        // 1. Staging table
        let sql = strategy.create_staging(target, &staging);
        match execute(cx, tx, table, &sql, &[]).await {
            Outcome::Ok(_) => {}
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        }

        // 2. Load
        let mut loaded = false;
        if native_copy {
            if let Some(reason) = cx.cancel_reason() {
                return Outcome::Cancelled(reason);
            }
            match tx.copy_in(cx, &quoted_staging, &target.columns, batch).await {
                Outcome::Ok(_) => loaded = true,
                Outcome::Err(e)
                    if e.bulk_kind() == Some(BulkErrorKind::BackendUnsupportedOperation) =>
                {
                    tracing::warn!(
                        dialect = %dialect,
                        error = %e,
                        "Native bulk copy unavailable, falling back to multi-row inserts"
                    );
                    native_copy = false;
                }
                Outcome::Err(e) => return Outcome::Err(classify(e, table)),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            }
        }
        if !loaded {
            let sql = strategy.insert_staging(target, &staging, batch.len());
            let params: Vec<Value> = batch.iter().flatten().cloned().collect();
            match execute(cx, tx, table, &sql, &params).await {
                Outcome::Ok(_) => {}
                Outcome::Err(e) => return Outcome::Err(e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            }
        }

        // 3. Stats
        if config.calculate_stats {
            let sql = strategy.count_existing(target, &staging);
            let existing = match query_count(cx, tx, table, &sql).await {
                Outcome::Ok(n) => n,
                Outcome::Err(e) => return Outcome::Err(e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            };
            let total = batch.len() as u64;
            let existing = existing.min(total);
            if insert_only {
                summary.skipped = summary.skipped.map(|n| n + existing);
            } else {
                summary.updated = summary.updated.map(|n| n + existing);
            }
            summary.inserted = summary.inserted.map(|n| n + (total - existing));
        }

        // 4. Merge
        let sql = strategy.merge(target, &staging);
        match execute(cx, tx, table, &sql, &[]).await {
            Outcome::Ok(affected) => {
                tracing::debug!(batch = index, affected = affected, "Merged batch");
            }
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        }

        // 5. Drop staging
        let sql = strategy.drop_staging(&staging);
        match execute(cx, tx, table, &sql, &[]).await {
            Outcome::Ok(_) => {}
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        }

        summary.rows += batch.len();
        summary.batches += 1;
    }

    Outcome::Ok(summary)
}

async fn execute<Tx: TransactionOps>(
    cx: &Cx,
    tx: &Tx,
    table: &str,
    sql: &str,
    params: &[Value],
) -> Outcome<u64, Error> {
    if let Some(reason) = cx.cancel_reason() {
        return Outcome::Cancelled(reason);
    }
    tracing::trace!(sql = %sql, params = params.len(), "Executing bulk statement");
    match tx.execute(cx, sql, params).await {
        Outcome::Err(e) => Outcome::Err(classify(e, table)),
        other => other,
    }
}

async fn query_count<Tx: TransactionOps>(
    cx: &Cx,
    tx: &Tx,
    table: &str,
    sql: &str,
) -> Outcome<u64, Error> {
    if let Some(reason) = cx.cancel_reason() {
        return Outcome::Cancelled(reason);
    }
    tracing::trace!(sql = %sql, "Counting existing keys");
    match tx.query(cx, sql, &[]).await {
        Outcome::Ok(rows) => {
            match rows.first().and_then(|row| row.get(0)).and_then(Value::as_i64) {
                Some(n) => Outcome::Ok(u64::try_from(n).unwrap_or(0)),
                None => Outcome::Err(Error::Type(TypeError {
                    expected: "integer row count",
                    actual: format!("{} rows without a count", rows.len()),
                    column: None,
                })),
            }
        }
        Outcome::Err(e) => Outcome::Err(classify(e, table)),
        Outcome::Cancelled(r) => Outcome::Cancelled(r),
        Outcome::Panicked(p) => Outcome::Panicked(p),
    }
}

/// Re-tag driver constraint failures as `ConstraintViolation`, keeping the
/// driver error as the source.
fn classify(error: Error, table: &str) -> Error {
    match error {
        Error::Query(q) if q.is_constraint_violation() => {
            let message = q.message.clone();
            Error::Bulk(
                BulkError::constraint_violation(message)
                    .with_table(table)
                    .with_source(q),
            )
        }
        other => other,
    }
}

//! In-memory `Connection` double for the bulk writer.
//!
//! It understands exactly the SQL the writer generates for each dialect
//! (staging DDL, multi-row inserts, merges, counts, selects) and applies it
//! to in-memory tables, so upsert semantics, rollback and driver quirks can
//! be checked without a database server.

#![allow(dead_code)]

pub mod fixture;

use asupersync::types::CancelKind;
use asupersync::{Cx, Outcome};
use bulkmodel::{
    BulkError, Connection, Dialect, Error, IsolationLevel, QueryError, QueryErrorKind, Row,
    TransactionOps, Value,
};
use regex::Regex;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

pub fn unwrap_outcome<T>(outcome: Outcome<T, Error>) -> T {
    match outcome {
        Outcome::Ok(v) => v,
        Outcome::Err(e) => panic!("unexpected error: {e}"),
        Outcome::Cancelled(r) => panic!("cancelled: {r:?}"),
        Outcome::Panicked(p) => panic!("panicked: {p:?}"),
    }
}

pub fn expect_err<T: std::fmt::Debug>(outcome: Outcome<T, Error>) -> Error {
    match outcome {
        Outcome::Err(e) => e,
        other => panic!("expected an error, got {other:?}"),
    }
}

// ============================================================================
// Tables
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct Table {
    pub columns: Vec<String>,
    pub key: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    fn index_of(&self, column: &str) -> Result<usize, Error> {
        self.columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| db_error(QueryErrorKind::Syntax, format!("Invalid column name '{column}'")))
    }

    fn find(&self, key_idx: &[usize], key: &[Value]) -> Option<usize> {
        self.rows
            .iter()
            .position(|row| key_idx.iter().zip(key).all(|(&i, v)| same(&row[i], v)))
    }
}

#[derive(Debug, Default)]
pub struct MemoryState {
    pub tables: HashMap<String, Table>,
    snapshot: Option<HashMap<String, Table>>,
    pub statements: Vec<String>,
    pub copy_attempts: usize,
    pub copied_rows: usize,
    pub begins: usize,
    pub commits: usize,
    pub rollbacks: usize,
    pub isolation: Option<IsolationLevel>,
    reject: Option<(String, Value)>,
    cancel_after: Option<(String, usize)>,
    fail_rollback: bool,
}

/// Shared-state fake connection; clones see the same tables.
#[derive(Debug, Clone)]
pub struct MemoryConnection {
    dialect: Dialect,
    native_copy: bool,
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryConnection {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            native_copy: false,
            state: Arc::new(Mutex::new(MemoryState::default())),
        }
    }

    /// Register a base table with its primary key.
    pub fn with_table(self, name: &str, columns: &[String], key: &[&str]) -> Self {
        self.lock().tables.insert(
            name.to_string(),
            Table {
                columns: columns.to_vec(),
                key: key.iter().map(|k| (*k).to_string()).collect(),
                rows: Vec::new(),
            },
        );
        self
    }

    /// Accept native bulk copy instead of reporting it unsupported.
    pub fn with_native_copy(mut self, enabled: bool) -> Self {
        self.native_copy = enabled;
        self
    }

    /// Fail any merge that would store `value` in `column`, like a CHECK
    /// constraint.
    pub fn reject_value(&self, column: &str, value: impl Into<Value>) {
        self.lock().reject = Some((column.to_string(), value.into()));
    }

    /// Cancel the caller's context once the `nth` statement containing
    /// `needle` has run.
    pub fn cancel_after(&self, needle: &str, nth: usize) {
        self.lock().cancel_after = Some((needle.to_string(), nth));
    }

    /// Make `ROLLBACK` fail and leave the transaction open.
    pub fn fail_rollback(&self) {
        self.lock().fail_rollback = true;
    }

    pub fn in_transaction(&self) -> bool {
        self.lock().snapshot.is_some()
    }

    pub fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().expect("lock poisoned")
    }

    /// Stored rows of `table`, ordered by key.
    pub fn rows(&self, table: &str) -> Vec<Vec<Value>> {
        let state = self.lock();
        let Some(t) = state.tables.get(table) else {
            return Vec::new();
        };
        let key_idx: Vec<usize> = t
            .key
            .iter()
            .filter_map(|k| t.columns.iter().position(|c| c == k))
            .collect();
        let mut rows = t.rows.clone();
        rows.sort_by(|a, b| compare_keys(a, b, &key_idx));
        rows
    }

    /// Stored value of `column` in the row whose first key column is `key`.
    pub fn value(&self, table: &str, key: &Value, column: &str) -> Option<Value> {
        let state = self.lock();
        let t = state.tables.get(table)?;
        let key_idx = t.columns.iter().position(|c| *c == t.key[0])?;
        let col_idx = t.columns.iter().position(|c| c == column)?;
        t.rows
            .iter()
            .find(|row| same(&row[key_idx], key))
            .map(|row| row[col_idx].clone())
    }

    /// Overwrite a stored value behind the writer's back.
    pub fn set_value(&self, table: &str, key: &Value, column: &str, value: Value) {
        let mut state = self.lock();
        let t = state.tables.get_mut(table).expect("table exists");
        let key_idx = t.columns.iter().position(|c| *c == t.key[0]).expect("key column");
        let col_idx = t.columns.iter().position(|c| c == column).expect("column");
        for row in &mut t.rows {
            if same(&row[key_idx], key) {
                row[col_idx] = value.clone();
            }
        }
    }

    pub fn statements(&self) -> Vec<String> {
        self.lock().statements.clone()
    }

    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().tables.keys().cloned().collect();
        names.sort();
        names
    }

    /// Run one statement the way a driver does: nothing is sent once `cx`
    /// is cancelled.
    fn statement(&self, cx: &Cx, sql: &str, params: &[Value]) -> Outcome<Vec<Row>, Error> {
        if let Some(reason) = cx.cancel_reason() {
            return Outcome::Cancelled(reason);
        }
        let result = self.run(sql, params);
        if result.is_ok() && self.trips_cancel(sql) {
            cx.cancel_with(CancelKind::User, Some("cancelled between statements"));
        }
        result.map_or_else(Outcome::Err, Outcome::Ok)
    }

    fn trips_cancel(&self, sql: &str) -> bool {
        let mut state = self.lock();
        let trip = match state.cancel_after.as_mut() {
            Some((needle, remaining)) if sql.contains(needle.as_str()) => {
                *remaining = remaining.saturating_sub(1);
                *remaining == 0
            }
            _ => false,
        };
        if trip {
            state.cancel_after = None;
        }
        trip
    }

    fn run(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, Error> {
        let mut state = self.lock();
        state.statements.push(sql.to_string());
        let p = patterns();

        if let Some(c) = p
            .create_sqlserver
            .captures(sql)
            .map(|c| (c[2].to_string(), c[1].to_string(), c[3].to_string()))
            .or_else(|| {
                p.create_postgres
                    .captures(sql)
                    .or_else(|| p.create_mysql.captures(sql))
                    .map(|c| (c[1].to_string(), c[2].to_string(), c[3].to_string()))
            })
        {
            let (staging, columns, source) = c;
            create_staging(&mut state, &ident(&staging), &idents(&columns), &ident(&source))?;
            return Ok(Vec::new());
        }
        if let Some(c) = p.count.captures(sql) {
            let n = count_existing(&state, &ident(&c[1]), &ident(&c[2]), &unique(idents(&c[3])))?;
            return Ok(vec![Row::new(
                vec!["count".to_string()],
                vec![self.quirk(Value::Int(n as i32))],
            )]);
        }
        if let Some(c) = p.merge_sqlserver.captures(sql) {
            let update = c.get(4).map(|m| unique(idents(m.as_str()))).unwrap_or_default();
            let affected = merge(
                &mut state,
                &ident(&c[1]),
                &ident(&c[2]),
                &idents(&c[5]),
                &unique(idents(&c[3])),
                &update,
            )?;
            return Ok(affected_row(affected));
        }
        if let Some(c) = p.merge_postgres.captures(sql) {
            let table = ident(&c[1]);
            let key = idents(&c[5]);
            let declared = state.tables.get(&table).map(|t| t.key.clone()).unwrap_or_default();
            if key != declared {
                return Err(db_error(
                    QueryErrorKind::Database,
                    "there is no unique or exclusion constraint matching the ON CONFLICT specification",
                ));
            }
            let update: Vec<String> = c.get(7).map(|m| idents(m.as_str())).unwrap_or_default();
            let update = unique(update);
            let affected = merge(&mut state, &table, &ident(&c[4]), &idents(&c[2]), &key, &update)?;
            return Ok(affected_row(affected));
        }
        if let Some(c) = p.merge_mysql.captures(sql) {
            let table = ident(&c[1]);
            let key = state.tables.get(&table).map(|t| t.key.clone()).unwrap_or_default();
            let update: Vec<String> = c[5]
                .split(", ")
                .filter(|assignment| assignment.contains(" = S."))
                .filter_map(|assignment| idents(assignment).into_iter().next())
                .collect();
            let affected = merge(&mut state, &table, &ident(&c[4]), &idents(&c[2]), &key, &update)?;
            return Ok(affected_row(affected));
        }
        if let Some(c) = p.insert_values.captures(sql) {
            let placeholders = p.placeholder.find_iter(&c[3]).count();
            if placeholders != params.len() {
                return Err(db_error(
                    QueryErrorKind::Syntax,
                    format!("{placeholders} placeholders but {} parameters", params.len()),
                ));
            }
            if params.len() > self.dialect.max_parameters() {
                return Err(db_error(
                    QueryErrorKind::Syntax,
                    format!("too many parameters: {}", params.len()),
                ));
            }
            let columns = idents(&c[2]);
            let rows: Vec<Vec<Value>> = params.chunks(columns.len()).map(<[Value]>::to_vec).collect();
            if let Some(cap) = self.dialect.max_rows_per_values() {
                if rows.len() > cap {
                    return Err(db_error(
                        QueryErrorKind::Syntax,
                        format!("{} row value expressions exceed {cap}", rows.len()),
                    ));
                }
            }
            let n = insert_rows(&mut state, &ident(&c[1]), &columns, rows)?;
            return Ok(affected_row(n));
        }
        if let Some(c) = p.drop.captures(sql) {
            let name = ident(&c[1]);
            if state.tables.remove(&name).is_none() && !sql.contains("IF EXISTS") {
                return Err(db_error(
                    QueryErrorKind::NotFound,
                    format!("Cannot drop the table '{name}'"),
                ));
            }
            return Ok(Vec::new());
        }
        if let Some(c) = p.select.captures(sql) {
            let columns = idents(&c[1]);
            let predicate = c.get(3).map_or("", |m| m.as_str()).to_string();
            let rows = select(&state, &ident(&c[2]), &columns, &predicate, &idents(&c[4]), params)?;
            return Ok(rows
                .into_iter()
                .map(|values| {
                    Row::new(
                        columns.clone(),
                        values.into_iter().map(|v| self.quirk(v)).collect(),
                    )
                })
                .collect());
        }
        Err(db_error(QueryErrorKind::Syntax, format!("unrecognized statement: {sql}")))
    }

    /// MySQL hands every integer back as BIGINT and text as bytes.
    fn quirk(&self, value: Value) -> Value {
        if self.dialect != Dialect::MySql {
            return value;
        }
        match value {
            Value::TinyInt(_) | Value::SmallInt(_) | Value::Int(_) => {
                Value::BigInt(value.as_i64().unwrap_or_default())
            }
            Value::Text(s) => Value::Bytes(s.into_bytes()),
            other => other,
        }
    }

    fn copy_sync(&self, table: &str, columns: &[String], rows: &[Vec<Value>]) -> Result<u64, Error> {
        let mut state = self.lock();
        state.copy_attempts += 1;
        if !self.native_copy {
            return Err(Error::Bulk(BulkError::unsupported(format!(
                "native bulk copy into {table} is not supported by this driver"
            ))));
        }
        state.statements.push(format!("COPY {table}"));
        let n = insert_rows(&mut state, &ident(table), columns, rows.to_vec())?;
        state.copied_rows += rows.len();
        Ok(n)
    }

    fn begin_sync(&self, isolation: IsolationLevel) -> Result<(), Error> {
        let mut state = self.lock();
        if state.snapshot.is_some() {
            return Err(db_error(QueryErrorKind::Database, "transaction already active"));
        }
        state.snapshot = Some(state.tables.clone());
        state.isolation = Some(isolation);
        state.begins += 1;
        Ok(())
    }

    fn commit_sync(&self) -> Result<(), Error> {
        let mut state = self.lock();
        state.snapshot = None;
        state.commits += 1;
        Ok(())
    }

    fn rollback_sync(&self) -> Result<(), Error> {
        let mut state = self.lock();
        if state.fail_rollback {
            return Err(db_error(QueryErrorKind::Database, "connection reset during ROLLBACK"));
        }
        if let Some(tables) = state.snapshot.take() {
            state.tables = tables;
        }
        state.rollbacks += 1;
        Ok(())
    }
}

impl Connection for MemoryConnection {
    type Tx<'conn>
        = MemoryTransaction<'conn>
    where
        Self: 'conn;

    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn query(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        let result = self.statement(cx, sql, params);
        async move { result }
    }

    fn execute(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        let result = self.statement(cx, sql, params).map(|rows| affected_count(&rows));
        async move { result }
    }

    fn begin_with(
        &self,
        cx: &Cx,
        isolation: IsolationLevel,
    ) -> impl Future<Output = Outcome<Self::Tx<'_>, Error>> + Send {
        let result = checked(cx, || {
            self.begin_sync(isolation)
                .map(|()| MemoryTransaction { conn: self })
        });
        async move { result }
    }

    fn ping(&self, _cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        async { Outcome::Ok(()) }
    }

    fn close(self, _cx: &Cx) -> impl Future<Output = bulkmodel::Result<()>> + Send {
        async { Ok(()) }
    }
}

pub struct MemoryTransaction<'conn> {
    conn: &'conn MemoryConnection,
}

impl TransactionOps for MemoryTransaction<'_> {
    fn query(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        let result = self.conn.statement(cx, sql, params);
        async move { result }
    }

    fn execute(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        let result = self.conn.statement(cx, sql, params).map(|rows| affected_count(&rows));
        async move { result }
    }

    fn copy_in(
        &self,
        cx: &Cx,
        table: &str,
        columns: &[String],
        rows: &[Vec<Value>],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        let result = checked(cx, || self.conn.copy_sync(table, columns, rows));
        async move { result }
    }

    fn commit(self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        let result = checked(cx, || self.conn.commit_sync());
        async move { result }
    }

    fn rollback(self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        let result = checked(cx, || self.conn.rollback_sync());
        async move { result }
    }
}

/// Run `f` unless `cx` is already cancelled, like a driver checking before
/// it writes to the socket.
fn checked<T>(cx: &Cx, f: impl FnOnce() -> Result<T, Error>) -> Outcome<T, Error> {
    match cx.cancel_reason() {
        Some(reason) => Outcome::Cancelled(reason),
        None => f().map_or_else(Outcome::Err, Outcome::Ok),
    }
}

// ============================================================================
// Statement semantics
// ============================================================================

fn create_staging(
    state: &mut MemoryState,
    staging: &str,
    columns: &[String],
    source: &str,
) -> Result<(), Error> {
    let Some(base) = state.tables.get(source) else {
        return Err(db_error(
            QueryErrorKind::NotFound,
            format!("Invalid object name '{source}'"),
        ));
    };
    for column in columns {
        base.index_of(column)?;
    }
    if state.tables.contains_key(staging) {
        return Err(db_error(
            QueryErrorKind::Database,
            format!("There is already an object named '{staging}'"),
        ));
    }
    state.tables.insert(
        staging.to_string(),
        Table {
            columns: columns.to_vec(),
            key: Vec::new(),
            rows: Vec::new(),
        },
    );
    Ok(())
}

fn insert_rows(
    state: &mut MemoryState,
    table: &str,
    columns: &[String],
    rows: Vec<Vec<Value>>,
) -> Result<u64, Error> {
    let t = state
        .tables
        .get_mut(table)
        .ok_or_else(|| db_error(QueryErrorKind::NotFound, format!("Invalid object name '{table}'")))?;
    let idx = columns
        .iter()
        .map(|c| t.index_of(c))
        .collect::<Result<Vec<_>, _>>()?;
    let n = rows.len() as u64;
    for values in rows {
        let mut row = vec![Value::Null; t.columns.len()];
        for (&i, v) in idx.iter().zip(values) {
            row[i] = v;
        }
        t.rows.push(row);
    }
    Ok(n)
}

fn count_existing(
    state: &MemoryState,
    staging: &str,
    target: &str,
    key: &[String],
) -> Result<u64, Error> {
    let (s, t) = tables_pair(state, staging, target)?;
    let s_idx = key.iter().map(|k| s.index_of(k)).collect::<Result<Vec<_>, _>>()?;
    let t_idx = key.iter().map(|k| t.index_of(k)).collect::<Result<Vec<_>, _>>()?;
    Ok(s.rows
        .iter()
        .filter(|row| {
            let k: Vec<Value> = s_idx.iter().map(|&i| row[i].clone()).collect();
            t.find(&t_idx, &k).is_some()
        })
        .count() as u64)
}

fn merge(
    state: &mut MemoryState,
    target: &str,
    staging: &str,
    insert_columns: &[String],
    key: &[String],
    update: &[String],
) -> Result<u64, Error> {
    let staged = {
        let (s, _) = tables_pair(state, staging, target)?;
        s.clone()
    };
    if let Some((column, value)) = &state.reject {
        if let Ok(i) = staged.index_of(column) {
            if staged.rows.iter().any(|row| same(&row[i], value)) {
                return Err(Error::Query(QueryError {
                    kind: QueryErrorKind::Constraint,
                    sql: None,
                    sqlstate: Some("23514".to_string()),
                    code: None,
                    message: format!("check constraint on '{column}' violated"),
                    source: None,
                }));
            }
        }
    }

    let t = state
        .tables
        .get_mut(target)
        .ok_or_else(|| db_error(QueryErrorKind::NotFound, format!("Invalid object name '{target}'")))?;
    let t_key = key.iter().map(|k| t.index_of(k)).collect::<Result<Vec<_>, _>>()?;
    let s_key = key.iter().map(|k| staged.index_of(k)).collect::<Result<Vec<_>, _>>()?;
    let inserts = insert_columns
        .iter()
        .map(|c| Ok((t.index_of(c)?, staged.index_of(c)?)))
        .collect::<Result<Vec<_>, Error>>()?;
    let updates = update
        .iter()
        .map(|c| Ok((t.index_of(c)?, staged.index_of(c)?)))
        .collect::<Result<Vec<_>, Error>>()?;

    let mut affected = 0;
    for row in &staged.rows {
        let k: Vec<Value> = s_key.iter().map(|&i| row[i].clone()).collect();
        match t.find(&t_key, &k) {
            Some(existing) => {
                for &(ti, si) in &updates {
                    t.rows[existing][ti] = row[si].clone();
                }
                if !updates.is_empty() {
                    affected += 1;
                }
            }
            None => {
                let mut stored = vec![Value::Null; t.columns.len()];
                for &(ti, si) in &inserts {
                    stored[ti] = row[si].clone();
                }
                t.rows.push(stored);
                affected += 1;
            }
        }
    }
    Ok(affected)
}

fn select(
    state: &MemoryState,
    table: &str,
    columns: &[String],
    predicate: &str,
    order: &[String],
    params: &[Value],
) -> Result<Vec<Vec<Value>>, Error> {
    let t = state
        .tables
        .get(table)
        .ok_or_else(|| db_error(QueryErrorKind::NotFound, format!("Invalid object name '{table}'")))?;

    let mut conditions = Vec::new();
    let mut next_param = params.iter();
    if !predicate.is_empty() {
        for part in predicate.split(" AND ") {
            let column = t.index_of(&ident(part))?;
            if part.ends_with(" IS NULL") {
                conditions.push((column, None));
            } else {
                let value = next_param
                    .next()
                    .ok_or_else(|| db_error(QueryErrorKind::Syntax, "missing parameter"))?;
                conditions.push((column, Some(value.clone())));
            }
        }
    }

    let col_idx = columns.iter().map(|c| t.index_of(c)).collect::<Result<Vec<_>, _>>()?;
    let order_idx = order.iter().map(|c| t.index_of(c)).collect::<Result<Vec<_>, _>>()?;
    let mut rows: Vec<&Vec<Value>> = t
        .rows
        .iter()
        .filter(|row| {
            conditions.iter().all(|(i, expected)| match expected {
                None => row[*i].is_null(),
                Some(v) => same(&row[*i], v),
            })
        })
        .collect();
    rows.sort_by(|a, b| compare_keys(a, b, &order_idx));
    Ok(rows
        .into_iter()
        .map(|row| col_idx.iter().map(|&i| row[i].clone()).collect())
        .collect())
}

// ============================================================================
// Helpers
// ============================================================================

struct Patterns {
    ident: Regex,
    placeholder: Regex,
    create_sqlserver: Regex,
    create_postgres: Regex,
    create_mysql: Regex,
    insert_values: Regex,
    count: Regex,
    merge_sqlserver: Regex,
    merge_postgres: Regex,
    merge_mysql: Regex,
    drop: Regex,
    select: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let re = |p: &str| Regex::new(p).expect("valid regex");
        Patterns {
            ident: re(r#"\[([^\]]+)\]|"([^"]+)"|`([^`]+)`"#),
            placeholder: re(r"\?|\$\d+|@p\d+"),
            create_sqlserver: re(r"^SELECT TOP 0 (.+) INTO (\S+) FROM (\S+)$"),
            create_postgres: re(
                r"^CREATE TEMP TABLE (\S+) ON COMMIT DROP AS SELECT (.+) FROM (\S+) LIMIT 0$",
            ),
            create_mysql: re(r"^CREATE TEMPORARY TABLE (\S+) SELECT (.+) FROM (\S+) LIMIT 0$"),
            insert_values: re(r"^INSERT INTO (\S+) \((.+?)\) VALUES (.+)$"),
            count: re(r"^SELECT COUNT\(\*\) FROM (\S+) AS S INNER JOIN (\S+) AS T ON (.+)$"),
            merge_sqlserver: re(
                r"^MERGE INTO (\S+) WITH \(HOLDLOCK\) AS T USING (\S+) AS S ON (.+?)(?: WHEN MATCHED THEN UPDATE SET (.+?))? WHEN NOT MATCHED BY TARGET THEN INSERT \((.+?)\) VALUES \((.+)\);$",
            ),
            merge_postgres: re(
                r"^INSERT INTO (\S+) \((.+?)\) SELECT (.+?) FROM (\S+) ON CONFLICT \((.+?)\) (DO NOTHING|DO UPDATE SET (.+))$",
            ),
            merge_mysql: re(
                r"^INSERT INTO (\S+) \((.+?)\) SELECT (.+?) FROM (\S+) AS S ON DUPLICATE KEY UPDATE (.+)$",
            ),
            drop: re(r"^DROP (?:TEMPORARY )?TABLE (?:IF EXISTS )?(\S+)$"),
            select: re(r"^SELECT (.+?) FROM (\S+)(?: WHERE (.+?))? ORDER BY (.+)$"),
        }
    })
}

/// Every quoted identifier in `text`, in order, for any dialect.
fn idents(text: &str) -> Vec<String> {
    patterns()
        .ident
        .captures_iter(text)
        .filter_map(|c| c.get(1).or_else(|| c.get(2)).or_else(|| c.get(3)))
        .map(|m| m.as_str().to_string())
        .collect()
}

fn ident(text: &str) -> String {
    idents(text)
        .into_iter()
        .next()
        .unwrap_or_else(|| text.to_string())
}

fn unique(names: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        if !out.contains(&name) {
            out.push(name);
        }
    }
    out
}

fn tables_pair<'a>(
    state: &'a MemoryState,
    first: &str,
    second: &str,
) -> Result<(&'a Table, &'a Table), Error> {
    let lookup = |name: &str| {
        state
            .tables
            .get(name)
            .ok_or_else(|| db_error(QueryErrorKind::NotFound, format!("Invalid object name '{name}'")))
    };
    Ok((lookup(first)?, lookup(second)?))
}

/// Value equality that ignores integer width, as SQL comparison does.
fn same(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, _) | (_, Value::Null) => false,
        _ => match (a.as_i64(), b.as_i64()) {
            (Some(x), Some(y)) if !matches!(a, Value::Bool(_) | Value::Decimal(_)) => x == y,
            _ => a == b,
        },
    }
}

fn compare_keys(a: &[Value], b: &[Value], idx: &[usize]) -> Ordering {
    for &i in idx {
        let ord = match (a[i].as_i64(), b[i].as_i64(), a[i].as_str(), b[i].as_str()) {
            (Some(x), Some(y), _, _) => x.cmp(&y),
            (_, _, Some(x), Some(y)) => x.cmp(y),
            _ => format!("{:?}", a[i]).cmp(&format!("{:?}", b[i])),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn affected_row(n: u64) -> Vec<Row> {
    vec![Row::new(vec!["affected".to_string()], vec![Value::BigInt(n as i64)])]
}

fn affected_count(rows: &[Row]) -> u64 {
    match rows {
        [row] if row.contains_column("affected") => row
            .get_by_name("affected")
            .and_then(Value::as_i64)
            .map_or(0, |n| n as u64),
        _ => rows.len() as u64,
    }
}

fn db_error(kind: QueryErrorKind, message: impl Into<String>) -> Error {
    Error::Query(QueryError {
        kind,
        sql: None,
        sqlstate: None,
        code: None,
        message: message.into(),
        source: None,
    })
}

//! Asynchronous query execution over the connection registry.
//!
//! Submissions return immediately with a task id. A bounded pool of blocking
//! workers runs statements against SQLite; results land in the `ResultStore`
//! and, for cacheable reads, in the `ResultCache`. Settled tasks are
//! reclaimed after a retention window.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rusqlite::types::Value as SqliteValue;
use rusqlite::ToSql;
use serde_json::{json, Value};
use tokio::sync::Semaphore;
use tracing::{debug, error, info};
use uuid::Uuid;

use sqlyard_common::models::{QueryRequest, Task};
use sqlyard_error::{Error, ErrorCode, Result};

use crate::cache::{fingerprint, CacheConfig, CacheStats, ResultCache};
use crate::registry::{validate_db_name, ConnectionRegistry};
use crate::row::{Row, SqlValue};
use crate::store::ResultStore;

/// Tuning knobs for the engine.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Maximum statements executing concurrently across all databases.
    pub max_workers: usize,
    /// How long settled task records stay retrievable.
    pub result_retention: Duration,
    pub cache: CacheConfig,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_workers: 30,
            result_retention: Duration::from_secs(300),
            cache: CacheConfig::default(),
        }
    }
}

/// Shared execution engine. Cloning is cheap; all clones share the cache,
/// registry, store and worker pool.
#[derive(Clone)]
pub struct QueryEngine {
    registry: Arc<ConnectionRegistry>,
    cache: Arc<ResultCache>,
    store: Arc<ResultStore>,
    workers: Arc<Semaphore>,
    retention: Duration,
}

impl QueryEngine {
    pub fn new(registry: Arc<ConnectionRegistry>, options: EngineOptions) -> Self {
        Self {
            registry,
            cache: Arc::new(ResultCache::new(options.cache)),
            store: Arc::new(ResultStore::new()),
            workers: Arc::new(Semaphore::new(options.max_workers.max(1))),
            retention: options.result_retention,
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    /// Validate and enqueue a query, returning the submission id. Execution
    /// happens on a blocking worker; poll `task` with the id for the outcome.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit(&self, req: QueryRequest) -> Result<String> {
        validate_db_name(&req.db_name)?;
        if req.query.trim().is_empty() {
            return Err(Error::validation(
                ErrorCode::EmptyQuery,
                "Query must not be empty",
            ));
        }

        let id = Uuid::new_v4().to_string();
        self.store.insert_pending(&id);
        debug!(target: "executor", id, db = %req.db_name, "Accepted submission");

        let engine = self.clone();
        let task_id = id.clone();
        tokio::spawn(async move {
            // Queue until a worker slot frees up. The semaphore is never
            // closed while the engine is alive, so acquire cannot fail.
            let permit = match engine.workers.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };

            let worker_engine = engine.clone();
            let worker_id = task_id.clone();
            let join = tokio::task::spawn_blocking(move || {
                worker_engine.run_on_worker(&worker_id, &req);
            })
            .await;
            drop(permit);

            if let Err(e) = join {
                error!(id = task_id, error = %e, "Worker panicked");
                engine
                    .store
                    .fail(&task_id, &Error::internal("Query worker failed"), 0.0);
            }

            engine.schedule_reclaim(task_id);
        });

        Ok(id)
    }

    /// Snapshot of the task record for `id`.
    pub fn task(&self, id: &str) -> Result<Task> {
        self.store.get(id)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
        info!("Cache cleared");
    }

    /// Runs on a blocking worker thread. Settles the task exactly once.
    fn run_on_worker(&self, id: &str, req: &QueryRequest) {
        let start = Instant::now();
        let key = fingerprint(&req.db_name, &req.query, req.params.as_ref());

        // Only read-only statements ever populate the cache, so a lookup on
        // a write's fingerprint is always a miss and the write still runs.
        if !req.force_refresh {
            if let Some(payload) = self.cache.get(&key) {
                debug!(target: "executor", id, key = %key, "Cache hit");
                self.store.complete(id, payload, true, 0.0);
                return;
            }
        }

        match self.execute_statement(req) {
            Ok(outcome) => {
                let elapsed = start.elapsed().as_secs_f64();
                if outcome.readonly && !is_introspection(&req.query) {
                    self.cache.set(key, outcome.payload.clone(), req.cache_ttl);
                }
                self.store.complete(id, outcome.payload, false, elapsed);
            }
            Err(e) => {
                let elapsed = start.elapsed().as_secs_f64();
                debug!(target: "executor", id, error = %e, "Query failed");
                self.store.fail(id, &e, elapsed);
            }
        }
    }

    fn execute_statement(&self, req: &QueryRequest) -> Result<StatementOutcome> {
        let handle = self.registry.handle(&req.db_name)?;
        let conn = handle.lock().unwrap_or_else(|e| e.into_inner());
        let bindings = bind_params(req.params.as_ref())?;

        let mut stmt = conn
            .prepare(&req.query)
            .map_err(|e| Error::execution(e.to_string()))?;

        // SQLite's own classification: true for any statement that cannot
        // modify the database, including CTE-wrapped selects; false for
        // CTE-wrapped DML, which a prefix check would misread.
        let readonly = stmt.readonly();
        let payload = if readonly {
            run_read(&mut stmt, &bindings)?
        } else {
            run_write(&mut stmt, &bindings)?
        };
        Ok(StatementOutcome { payload, readonly })
    }

    fn schedule_reclaim(&self, id: String) {
        let store = self.store.clone();
        let retention = self.retention;
        tokio::spawn(async move {
            tokio::time::sleep(retention).await;
            if store.remove(&id) {
                debug!(id, "Reclaimed task record past retention");
            }
        });
    }
}

struct StatementOutcome {
    payload: Value,
    readonly: bool,
}

/// Introspection reads against sqlite internals track schema and library
/// state, so their results are never cached.
fn is_introspection(query: &str) -> bool {
    let normalized = query.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    normalized.starts_with("select sqlite_") || normalized.starts_with("pragma")
}

fn run_read(stmt: &mut rusqlite::Statement<'_>, bindings: &[(String, SqliteValue)]) -> Result<Value> {
    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

    let params: Vec<(&str, &dyn ToSql)> = bindings
        .iter()
        .map(|(name, value)| (name.as_str(), value as &dyn ToSql))
        .collect();

    let mut rows = stmt
        .query(params.as_slice())
        .map_err(|e| Error::execution(e.to_string()))?;

    let mut out: Vec<Row> = Vec::new();
    loop {
        let row = match rows.next() {
            Ok(Some(row)) => row,
            Ok(None) => break,
            Err(e) => return Err(Error::execution(e.to_string())),
        };
        let mut values = Vec::with_capacity(columns.len());
        for (i, name) in columns.iter().enumerate() {
            let value = row
                .get_ref(i)
                .map(SqlValue::from)
                .map_err(|e| Error::execution(e.to_string()))?;
            values.push((name.clone(), value));
        }
        out.push(Row::new(values));
    }

    serde_json::to_value(out).map_err(|e| Error::internal(format!("Cannot encode rows: {e}")))
}

fn run_write(stmt: &mut rusqlite::Statement<'_>, bindings: &[(String, SqliteValue)]) -> Result<Value> {
    let params: Vec<(&str, &dyn ToSql)> = bindings
        .iter()
        .map(|(name, value)| (name.as_str(), value as &dyn ToSql))
        .collect();

    let affected = stmt
        .execute(params.as_slice())
        .map_err(|e| Error::execution(e.to_string()))?;

    Ok(json!([{ "rows_affected": affected }]))
}

/// Convert JSON parameter bindings into SQLite named parameters. Keys gain
/// the `:` prefix SQLite expects unless they already carry one; nested
/// structures are rejected.
fn bind_params(
    params: Option<&serde_json::Map<String, Value>>,
) -> Result<Vec<(String, SqliteValue)>> {
    let Some(params) = params else {
        return Ok(Vec::new());
    };

    let mut out = Vec::with_capacity(params.len());
    for (key, value) in params {
        let v = match value {
            Value::Null => SqliteValue::Null,
            Value::Bool(b) => SqliteValue::Integer(*b as i64),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    SqliteValue::Integer(i)
                } else if let Some(f) = n.as_f64() {
                    SqliteValue::Real(f)
                } else {
                    return Err(Error::validation(
                        ErrorCode::InvalidParameters,
                        format!("Parameter '{key}' is out of range"),
                    ));
                }
            }
            Value::String(s) => SqliteValue::Text(s.clone()),
            Value::Array(_) | Value::Object(_) => {
                return Err(Error::validation(
                    ErrorCode::InvalidParameters,
                    format!("Parameter '{key}' must be a scalar"),
                )
                .with_hint("Arrays and objects cannot bind to SQL parameters"));
            }
        };
        let name = if key.starts_with(':') {
            key.clone()
        } else {
            format!(":{key}")
        };
        out.push((name, v));
    }
    Ok(out)
}

//! End-to-end engine tests against real SQLite files in temp directories.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tempfile::TempDir;

use sqlyard_common::models::{QueryRequest, Task, TaskStatus};
use sqlyard_core::{CacheConfig, ConnectionRegistry, EngineOptions, QueryEngine};
use sqlyard_error::ErrorCode;

fn test_engine(dir: &TempDir) -> QueryEngine {
    test_engine_with(dir, EngineOptions::default())
}

fn test_engine_with(dir: &TempDir, options: EngineOptions) -> QueryEngine {
    let registry = Arc::new(ConnectionRegistry::new(
        dir.path().join("databases"),
        dir.path().join("extensions"),
    ));
    QueryEngine::new(registry, options)
}

fn query(sql: &str) -> QueryRequest {
    QueryRequest {
        query: sql.to_string(),
        params: None,
        db_name: "default".to_string(),
        cache_ttl: None,
        force_refresh: false,
    }
}

/// Poll until the task settles. Panics if it stays pending too long.
async fn settle(engine: &QueryEngine, id: &str) -> Task {
    for _ in 0..200 {
        let task = engine.task(id).expect("task should exist while polling");
        if task.status.is_terminal() {
            return task;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("task {id} never settled");
}

#[tokio::test]
async fn test_select_completes_with_rows() {
    let dir = tempfile::tempdir().unwrap();
    let engine = test_engine(&dir);

    let id = engine.submit(query("SELECT 1 AS one, 'x' AS label")).unwrap();
    let task = settle(&engine, &id).await;

    assert_eq!(task.status, TaskStatus::Completed);
    assert!(!task.cached);
    assert_eq!(task.result, Some(json!([{"one": 1, "label": "x"}])));
    assert!(task.execution_time.unwrap() >= 0.0);
}

#[tokio::test]
async fn test_repeat_select_served_from_cache() {
    let dir = tempfile::tempdir().unwrap();
    let engine = test_engine(&dir);

    let first = settle(&engine, &engine.submit(query("SELECT 42 AS n")).unwrap()).await;
    assert!(!first.cached);

    // Different formatting and case, same fingerprint.
    let second = settle(
        &engine,
        &engine.submit(query("select   42\n  as n")).unwrap(),
    )
    .await;
    assert_eq!(second.status, TaskStatus::Completed);
    assert!(second.cached);
    assert_eq!(second.result, first.result);
    assert_eq!(second.execution_time, Some(0.0));
}

#[tokio::test]
async fn test_force_refresh_bypasses_cache() {
    let dir = tempfile::tempdir().unwrap();
    let engine = test_engine(&dir);

    settle(&engine, &engine.submit(query("SELECT 7 AS n")).unwrap()).await;

    let mut req = query("SELECT 7 AS n");
    req.force_refresh = true;
    let task = settle(&engine, &engine.submit(req).unwrap()).await;

    assert_eq!(task.status, TaskStatus::Completed);
    assert!(!task.cached, "force_refresh must re-execute");
    // The refreshed result is cached again for later submissions.
    let again = settle(&engine, &engine.submit(query("SELECT 7 AS n")).unwrap()).await;
    assert!(again.cached);
}

#[tokio::test]
async fn test_writes_bypass_cache_and_report_rows_affected() {
    let dir = tempfile::tempdir().unwrap();
    let engine = test_engine(&dir);

    let create = settle(
        &engine,
        &engine
            .submit(query("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)"))
            .unwrap(),
    )
    .await;
    assert_eq!(create.status, TaskStatus::Completed);

    let insert = settle(
        &engine,
        &engine
            .submit(query("INSERT INTO t (name) VALUES ('a'), ('b')"))
            .unwrap(),
    )
    .await;
    assert_eq!(insert.result, Some(json!([{"rows_affected": 2}])));

    // Nothing writable landed in the cache.
    assert_eq!(engine.cache_stats().total_items, 0);
}

#[tokio::test]
async fn test_cached_read_sees_no_stale_rows_after_force_refresh() {
    let dir = tempfile::tempdir().unwrap();
    let engine = test_engine(&dir);

    settle(&engine, &engine.submit(query("CREATE TABLE t (n INTEGER)")).unwrap()).await;
    settle(&engine, &engine.submit(query("INSERT INTO t VALUES (1)")).unwrap()).await;

    let before = settle(&engine, &engine.submit(query("SELECT n FROM t")).unwrap()).await;
    assert_eq!(before.result, Some(json!([{"n": 1}])));

    settle(&engine, &engine.submit(query("INSERT INTO t VALUES (2)")).unwrap()).await;

    // Plain re-read is a stale cache hit; force_refresh sees the new row.
    let stale = settle(&engine, &engine.submit(query("SELECT n FROM t")).unwrap()).await;
    assert!(stale.cached);
    assert_eq!(stale.result, Some(json!([{"n": 1}])));

    let mut req = query("SELECT n FROM t");
    req.force_refresh = true;
    let fresh = settle(&engine, &engine.submit(req).unwrap()).await;
    assert_eq!(fresh.result, Some(json!([{"n": 1}, {"n": 2}])));
}

#[tokio::test]
async fn test_cte_wrapped_write_executes_every_time() {
    let dir = tempfile::tempdir().unwrap();
    let engine = test_engine(&dir);

    settle(&engine, &engine.submit(query("CREATE TABLE t (n INTEGER)")).unwrap()).await;
    settle(&engine, &engine.submit(query("INSERT INTO t VALUES (1)")).unwrap()).await;

    let delete = "WITH doomed AS (SELECT 1 AS x) \
                  DELETE FROM t WHERE n IN (SELECT x FROM doomed)";
    let first = settle(&engine, &engine.submit(query(delete)).unwrap()).await;
    assert_eq!(first.status, TaskStatus::Completed);
    assert!(!first.cached);
    assert_eq!(first.result, Some(json!([{"rows_affected": 1}])));
    assert_eq!(engine.cache_stats().total_items, 0);

    // Re-insert, then resubmit the identical statement: it must hit the
    // database again instead of being answered from the cache.
    settle(&engine, &engine.submit(query("INSERT INTO t VALUES (1)")).unwrap()).await;
    let second = settle(&engine, &engine.submit(query(delete)).unwrap()).await;
    assert!(!second.cached);
    assert_eq!(second.result, Some(json!([{"rows_affected": 1}])));

    let mut count = query("SELECT count(*) AS c FROM t");
    count.force_refresh = true;
    let task = settle(&engine, &engine.submit(count).unwrap()).await;
    assert_eq!(task.result, Some(json!([{"c": 0}])));
}

#[tokio::test]
async fn test_cte_wrapped_select_is_cached() {
    let dir = tempfile::tempdir().unwrap();
    let engine = test_engine(&dir);

    let cte = "WITH x AS (SELECT 5 AS n) SELECT * FROM x";
    let first = settle(&engine, &engine.submit(query(cte)).unwrap()).await;
    assert!(!first.cached);
    assert_eq!(first.result, Some(json!([{"n": 5}])));

    let second = settle(&engine, &engine.submit(query(cte)).unwrap()).await;
    assert!(second.cached);
    assert_eq!(second.result, first.result);
}

#[tokio::test]
async fn test_named_parameters() {
    let dir = tempfile::tempdir().unwrap();
    let engine = test_engine(&dir);

    let mut params = serde_json::Map::new();
    params.insert("a".into(), json!(5));
    params.insert("b".into(), json!("hello"));
    // A key already carrying the prefix binds the same way.
    params.insert(":c".into(), json!(2));

    let mut req = query("SELECT :a AS a, :b AS b, :c AS c");
    req.params = Some(params);

    let task = settle(&engine, &engine.submit(req).unwrap()).await;
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.result, Some(json!([{"a": 5, "b": "hello", "c": 2}])));
}

#[tokio::test]
async fn test_bad_sql_settles_as_error() {
    let dir = tempfile::tempdir().unwrap();
    let engine = test_engine(&dir);

    let id = engine.submit(query("SELECT * FROM no_such_table")).unwrap();
    let task = settle(&engine, &id).await;

    assert_eq!(task.status, TaskStatus::Error);
    assert!(task.error.as_deref().unwrap().contains("no_such_table"));
    assert!(task.result.is_none());
    assert!(task.execution_time.is_some());
}

#[tokio::test]
async fn test_invalid_submissions_rejected_synchronously() {
    let dir = tempfile::tempdir().unwrap();
    let engine = test_engine(&dir);

    let err = engine.submit(query("   ")).unwrap_err();
    assert_eq!(err.code, ErrorCode::EmptyQuery);

    let mut req = query("SELECT 1");
    req.db_name = "../escape".to_string();
    let err = engine.submit(req).unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidDatabaseName);
}

#[tokio::test]
async fn test_unknown_task_id_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let engine = test_engine(&dir);

    let err = engine.task("no-such-id").unwrap_err();
    assert_eq!(err.code, ErrorCode::SubmissionNotFound);
}

#[tokio::test]
async fn test_settled_tasks_reclaimed_after_retention() {
    let dir = tempfile::tempdir().unwrap();
    let engine = test_engine_with(
        &dir,
        EngineOptions {
            max_workers: 4,
            result_retention: Duration::from_millis(100),
            cache: CacheConfig::default(),
        },
    );

    let id = engine.submit(query("SELECT 1 AS n")).unwrap();
    settle(&engine, &id).await;

    tokio::time::sleep(Duration::from_millis(300)).await;
    let err = engine.task(&id).unwrap_err();
    assert_eq!(err.code, ErrorCode::SubmissionNotFound);
}

#[tokio::test]
async fn test_concurrent_submissions_all_settle() {
    let dir = tempfile::tempdir().unwrap();
    let engine = test_engine_with(
        &dir,
        EngineOptions {
            max_workers: 2,
            ..EngineOptions::default()
        },
    );

    let ids: Vec<String> = (0..10)
        .map(|i| {
            engine
                .submit(query(&format!("SELECT {i} AS n")))
                .unwrap()
        })
        .collect();

    for (i, id) in ids.iter().enumerate() {
        let task = settle(&engine, id).await;
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.result, Some(json!([{"n": i}])));
    }
}

#[tokio::test]
async fn test_databases_are_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let engine = test_engine(&dir);

    let mut create = query("CREATE TABLE only_here (n INTEGER)");
    create.db_name = "alpha".to_string();
    settle(&engine, &engine.submit(create).unwrap()).await;

    let mut read_alpha = query("SELECT count(*) AS c FROM only_here");
    read_alpha.db_name = "alpha".to_string();
    let ok = settle(&engine, &engine.submit(read_alpha).unwrap()).await;
    assert_eq!(ok.status, TaskStatus::Completed);

    let mut read_beta = query("SELECT count(*) AS c FROM only_here");
    read_beta.db_name = "beta".to_string();
    let missing = settle(&engine, &engine.submit(read_beta).unwrap()).await;
    assert_eq!(missing.status, TaskStatus::Error);
}

#[tokio::test]
async fn test_cache_stats_reflect_hits() {
    let dir = tempfile::tempdir().unwrap();
    let engine = test_engine(&dir);

    settle(&engine, &engine.submit(query("SELECT 9 AS n")).unwrap()).await;
    settle(&engine, &engine.submit(query("SELECT 9 AS n")).unwrap()).await;
    settle(&engine, &engine.submit(query("SELECT 9 AS n")).unwrap()).await;

    let stats = engine.cache_stats();
    assert_eq!(stats.total_items, 1);
    let hits: u64 = stats.hits_by_key.values().sum();
    // One from the insert, two from cache hits.
    assert_eq!(hits, 3);

    engine.clear_cache();
    assert_eq!(engine.cache_stats().total_items, 0);
}

//! SQLite-backed analytics collaborator.
//!
//! A local implementation of [`AnalyticsClient`] for tests and single-host
//! deployments. rusqlite is not Send, so the connection sits behind a
//! parking_lot Mutex and queries run synchronously between awaits.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use tracing::info;

use crate::traits::{AnalyticsClient, ClientError};

pub struct SqliteAnalytics {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl SqliteAnalytics {
    /// Open or create a database at the given path.
    pub fn open(path: &Path) -> Result<Self, ClientError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ClientError::Unavailable(format!("create dir: {e}")))?;
        }

        let conn = Connection::open(path)
            .map_err(|e| ClientError::Unavailable(e.to_string()))?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")
            .map_err(|e| ClientError::Unavailable(format!("pragmas: {e}")))?;

        info!(path = %path.display(), "analytics database opened");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: path.to_owned(),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> Result<Self, ClientError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| ClientError::Unavailable(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: PathBuf::from(":memory:"),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run a statement that returns no rows (DDL, INSERT, ...).
    pub fn execute(&self, sql: &str, params: &[serde_json::Value]) -> Result<usize, ClientError> {
        let conn = self.conn.lock();
        let bound = bind_params(params);
        let refs: Vec<&dyn rusqlite::types::ToSql> = bound.iter().map(|p| p.as_ref()).collect();
        conn.execute(sql, refs.as_slice())
            .map_err(|e| ClientError::Query(e.to_string()))
    }
}

impl Clone for SqliteAnalytics {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
            path: self.path.clone(),
        }
    }
}

#[async_trait]
impl AnalyticsClient for SqliteAnalytics {
    async fn query(
        &self,
        sql: &str,
        params: &[serde_json::Value],
    ) -> Result<Vec<serde_json::Value>, ClientError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| ClientError::Query(e.to_string()))?;

        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

        let bound = bind_params(params);
        let refs: Vec<&dyn rusqlite::types::ToSql> = bound.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(refs.as_slice(), |row| {
                let mut object = serde_json::Map::new();
                for (idx, column) in columns.iter().enumerate() {
                    object.insert(column.clone(), column_to_json(row.get_ref(idx)?));
                }
                Ok(serde_json::Value::Object(object))
            })
            .map_err(|e| ClientError::Query(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ClientError::Query(e.to_string()))?;

        Ok(rows)
    }

    async fn health_check(&self) -> Result<(), ClientError> {
        let conn = self.conn.lock();
        conn.query_row("SELECT 1", [], |_| Ok(()))
            .map_err(|e| ClientError::Unavailable(e.to_string()))
    }
}

fn bind_params(params: &[serde_json::Value]) -> Vec<Box<dyn rusqlite::types::ToSql>> {
    params
        .iter()
        .map(|value| -> Box<dyn rusqlite::types::ToSql> {
            match value {
                serde_json::Value::Null => Box::new(None::<String>),
                serde_json::Value::Bool(b) => Box::new(*b),
                serde_json::Value::Number(n) => {
                    if let Some(i) = n.as_i64() {
                        Box::new(i)
                    } else {
                        Box::new(n.as_f64().unwrap_or(0.0))
                    }
                }
                serde_json::Value::String(s) => Box::new(s.clone()),
                // Arrays/objects are bound as their JSON text
                other => Box::new(other.to_string()),
            }
        })
        .collect()
}

fn column_to_json(value: ValueRef<'_>) -> serde_json::Value {
    match value {
        ValueRef::Null => serde_json::Value::Null,
        ValueRef::Integer(i) => serde_json::Value::Number(i.into()),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        ValueRef::Text(t) => serde_json::Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => serde_json::Value::String(format!("<blob {} bytes>", b.len())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> SqliteAnalytics {
        let db = SqliteAnalytics::in_memory().unwrap();
        db.execute(
            "CREATE TABLE sessions (id TEXT PRIMARY KEY, tokens INTEGER, cost REAL)",
            &[],
        )
        .unwrap();
        db.execute(
            "INSERT INTO sessions VALUES (?1, ?2, ?3)",
            &[
                serde_json::json!("sess_a"),
                serde_json::json!(1200),
                serde_json::json!(0.5),
            ],
        )
        .unwrap();
        db.execute(
            "INSERT INTO sessions VALUES (?1, ?2, ?3)",
            &[
                serde_json::json!("sess_b"),
                serde_json::json!(900),
                serde_json::json!(0.25),
            ],
        )
        .unwrap();
        db
    }

    #[tokio::test]
    async fn health_check_passes() {
        let db = SqliteAnalytics::in_memory().unwrap();
        db.health_check().await.unwrap();
    }

    #[tokio::test]
    async fn parameterized_query_returns_json_rows() {
        let db = seeded();
        let rows = db
            .query(
                "SELECT id, tokens, cost FROM sessions WHERE tokens > ?1 ORDER BY id",
                &[serde_json::json!(1000)],
            )
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], "sess_a");
        assert_eq!(rows[0]["tokens"], 1200);
    }

    #[tokio::test]
    async fn null_columns_map_to_json_null() {
        let db = SqliteAnalytics::in_memory().unwrap();
        db.execute("CREATE TABLE t (a TEXT)", &[]).unwrap();
        db.execute("INSERT INTO t VALUES (NULL)", &[]).unwrap();

        let rows = db.query("SELECT a FROM t", &[]).await.unwrap();
        assert!(rows[0]["a"].is_null());
    }

    #[tokio::test]
    async fn bad_sql_is_query_error() {
        let db = SqliteAnalytics::in_memory().unwrap();
        let err = db.query("SELECT * FROM missing_table", &[]).await.unwrap_err();
        assert!(matches!(err, ClientError::Query(_)));
    }
}

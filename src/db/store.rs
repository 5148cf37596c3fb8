//! Table access abstraction over the hosted database.
//!
//! Rows are JSON objects; typed views live in `models.rs`. The hosted
//! implementation speaks PostgREST (`postgrest.rs`); `MemoryStore` backs
//! local development and tests.

use std::cmp::Ordering;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use dashmap::DashMap;
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

/// Errors from the data access layer.
#[derive(Debug, Error)]
pub enum DbError {
    /// Network failure talking to the hosted database.
    #[error("database transport error: {0}")]
    Transport(String),

    /// The hosted database rejected the request.
    #[error("database returned {status}: {message}")]
    Api { status: u16, message: String },

    /// A row did not match the expected shape.
    #[error("failed to decode row: {0}")]
    Decode(String),

    /// A row with the same primary key already exists.
    #[error("duplicate row: {0}")]
    Conflict(String),

    /// The store is not configured (missing URL or key).
    #[error("database not configured: {0}")]
    NotConfigured(&'static str),
}

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    IsNull(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub descending: bool,
}

/// Row selection: equality filters, one ordering column and a limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(column.to_string(), value.into()));
        self
    }

    pub fn is_null(mut self, column: &str) -> Self {
        self.filters.push(Filter::IsNull(column.to_string()));
        self
    }

    pub fn order_desc(mut self, column: &str) -> Self {
        self.order = Some(Order { column: column.to_string(), descending: true });
        self
    }

    pub fn order_asc(mut self, column: &str) -> Self {
        self.order = Some(Order { column: column.to_string(), descending: false });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether a row satisfies every filter.
    pub fn matches(&self, row: &Value) -> bool {
        self.filters.iter().all(|f| match f {
            Filter::Eq(column, value) => row.get(column) == Some(value),
            Filter::IsNull(column) => row.get(column).map_or(true, Value::is_null),
        })
    }
}

/// Direct table operations against the hosted database.
#[async_trait]
pub trait DataStore: Send + Sync {
    async fn select(&self, table: &str, query: &Query) -> DbResult<Vec<Value>>;

    /// Number of rows matching the filters; ordering and limit are ignored.
    async fn count_matching(&self, table: &str, query: &Query) -> DbResult<usize>;

    /// Insert a row and return it as stored. Fails with `Conflict` when the `id` is taken.
    async fn insert(&self, table: &str, row: Value) -> DbResult<Value>;

    /// Merge `patch` into every matching row and return the updated rows.
    async fn update(&self, table: &str, query: &Query, patch: Value) -> DbResult<Vec<Value>>;

    /// Delete matching rows and return how many were removed.
    async fn delete(&self, table: &str, query: &Query) -> DbResult<usize>;
}

/// Timestamp format shared by both store implementations.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Process-local store. Fills `id` and `created_at` the way the hosted schema
/// defaults do and keeps `id` unique per table.
#[derive(Default)]
pub struct MemoryStore {
    tables: DashMap<String, Vec<Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows currently in `table`.
    pub fn count(&self, table: &str) -> usize {
        self.tables.get(table).map_or(0, |rows| rows.len())
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        // Nulls sort last, as in Postgres ascending order
        (None | Some(Value::Null), _) => Ordering::Greater,
        (_, None | Some(Value::Null)) => Ordering::Less,
        _ => Ordering::Equal,
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn select(&self, table: &str, query: &Query) -> DbResult<Vec<Value>> {
        let mut rows: Vec<Value> = self
            .tables
            .get(table)
            .map(|rows| rows.iter().filter(|r| query.matches(r)).cloned().collect())
            .unwrap_or_default();

        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let ord = compare_values(a.get(&order.column), b.get(&order.column));
                if order.descending { ord.reverse() } else { ord }
            });
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn count_matching(&self, table: &str, query: &Query) -> DbResult<usize> {
        Ok(self
            .tables
            .get(table)
            .map_or(0, |rows| rows.iter().filter(|r| query.matches(r)).count()))
    }

    async fn insert(&self, table: &str, row: Value) -> DbResult<Value> {
        let mut object = match row {
            Value::Object(map) => map,
            other => return Err(DbError::Decode(format!("expected object row, got {}", other))),
        };
        object
            .entry("id")
            .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
        object
            .entry("created_at")
            .or_insert_with(|| Value::String(now_timestamp()));

        let row = Value::Object(object);
        let mut rows = self.tables.entry(table.to_string()).or_default();
        if rows.iter().any(|existing| existing.get("id") == row.get("id")) {
            return Err(DbError::Conflict(format!("{}.id {}", table, row["id"])));
        }
        rows.push(row.clone());
        Ok(row)
    }

    async fn update(&self, table: &str, query: &Query, patch: Value) -> DbResult<Vec<Value>> {
        let patch: Map<String, Value> = match patch {
            Value::Object(map) => map,
            other => return Err(DbError::Decode(format!("expected object patch, got {}", other))),
        };

        let mut updated = Vec::new();
        if let Some(mut rows) = self.tables.get_mut(table) {
            for row in rows.iter_mut().filter(|r| query.matches(r)) {
                if let Value::Object(object) = row {
                    for (k, v) in &patch {
                        object.insert(k.clone(), v.clone());
                    }
                }
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }

    async fn delete(&self, table: &str, query: &Query) -> DbResult<usize> {
        let mut removed = 0;
        if let Some(mut rows) = self.tables.get_mut(table) {
            let before = rows.len();
            rows.retain(|r| !query.matches(r));
            removed = before - rows.len();
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_insert_fills_defaults() {
        let store = MemoryStore::new();
        let row = store.insert("kits", json!({"name": "Welcome"})).await.unwrap();
        assert!(row["id"].is_string());
        assert!(row["created_at"].is_string());
        assert_eq!(store.count("kits"), 1);

        let err = store.insert("kits", json!(["not", "an", "object"])).await;
        assert!(matches!(err, Err(DbError::Decode(_))));

        let err = store.insert("kits", json!({"id": row["id"].clone(), "name": "Again"})).await;
        assert!(matches!(err, Err(DbError::Conflict(_))));
        assert_eq!(store.count("kits"), 1);
    }

    #[tokio::test]
    async fn test_count_matching_ignores_limit() {
        let store = MemoryStore::new();
        for i in 0..5 {
            let org = if i % 2 == 0 { "a" } else { "b" };
            store.insert("kits", json!({"organization_id": org})).await.unwrap();
        }

        let q = Query::new().eq("organization_id", "a").limit(1);
        assert_eq!(store.count_matching("kits", &q).await.unwrap(), 3);
        assert_eq!(store.count_matching("missing", &Query::new()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_select_filters_orders_and_limits() {
        let store = MemoryStore::new();
        for (org, name, at) in [("a", "one", "1"), ("b", "two", "2"), ("a", "three", "3")] {
            store
                .insert("kits", json!({"organization_id": org, "name": name, "created_at": at}))
                .await
                .unwrap();
        }

        let q = Query::new().eq("organization_id", "a").order_desc("created_at");
        let rows = store.select("kits", &q).await.unwrap();
        let names: Vec<_> = rows.iter().map(|r| r["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["three", "one"]);

        let rows = store.select("kits", &q.clone().limit(1)).await.unwrap();
        assert_eq!(rows.len(), 1);

        assert!(store.select("missing", &Query::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let store = MemoryStore::new();
        store.insert("api_keys", json!({"id": "k1", "revoked_at": null})).await.unwrap();
        store.insert("api_keys", json!({"id": "k2"})).await.unwrap();

        let active = Query::new().is_null("revoked_at");
        assert_eq!(store.select("api_keys", &active).await.unwrap().len(), 2);

        let updated = store
            .update("api_keys", &Query::new().eq("id", "k1"), json!({"revoked_at": "now"}))
            .await
            .unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0]["revoked_at"], "now");
        assert_eq!(store.select("api_keys", &active).await.unwrap().len(), 1);

        let removed = store.delete("api_keys", &Query::new().eq("id", "k2")).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.count("api_keys"), 1);
    }
}

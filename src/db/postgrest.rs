//! Hosted database client (PostgREST over HTTPS).
//!
//! All queries run with the service-role key, which bypasses row-level
//! security; tenant scoping is applied by the callers in `repo.rs`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_RANGE, CONTENT_TYPE};
use reqwest::StatusCode;
use serde_json::Value;

use crate::db::store::{DataStore, DbError, DbResult, Filter, Query};

#[derive(Clone)]
pub struct PostgrestStore {
    http: reqwest::Client,
    base_url: String,
    service_key: String,
}

impl PostgrestStore {
    /// Create a client for the project at `project_url`.
    pub fn new(project_url: &str, service_key: String, timeout: Duration) -> DbResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DbError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: format!("{}/rest/v1", project_url.trim_end_matches('/')),
            service_key,
        })
    }

    fn headers(&self, prefer: &'static str) -> DbResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert("apikey", header_value(&self.service_key)?);
        headers.insert(AUTHORIZATION, header_value(&format!("Bearer {}", self.service_key))?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("Prefer", HeaderValue::from_static(prefer));
        Ok(headers)
    }

    fn url(&self, table: &str) -> String {
        format!("{}/{}", self.base_url, table)
    }

    async fn execute(&self, request: reqwest::RequestBuilder, prefer: &'static str) -> DbResult<reqwest::Response> {
        let response = request
            .headers(self.headers(prefer)?)
            .send()
            .await
            .map_err(|e| DbError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::CONFLICT => DbError::Conflict(message),
                _ => DbError::Api { status: status.as_u16(), message },
            });
        }
        Ok(response)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> DbResult<Value> {
        let response = self.execute(request, "return=representation").await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(Value::Array(Vec::new()));
        }
        response.json().await.map_err(|e| DbError::Decode(e.to_string()))
    }
}

fn header_value(v: &str) -> DbResult<HeaderValue> {
    HeaderValue::from_str(v).map_err(|_| DbError::NotConfigured("credential contains invalid characters"))
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Render a query as PostgREST URL parameters.
pub fn query_params(query: &Query) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = query
        .filters
        .iter()
        .map(|f| match f {
            Filter::Eq(column, value) => (column.clone(), format!("eq.{}", scalar(value))),
            Filter::IsNull(column) => (column.clone(), "is.null".to_string()),
        })
        .collect();

    if let Some(order) = &query.order {
        let dir = if order.descending { "desc" } else { "asc" };
        params.push(("order".to_string(), format!("{}.{}", order.column, dir)));
    }
    if let Some(limit) = query.limit {
        params.push(("limit".to_string(), limit.to_string()));
    }
    params
}

/// Total row count from a `Content-Range` header such as `0-24/250` or `*/0`.
pub fn content_range_total(range: &str) -> Option<usize> {
    range.rsplit_once('/').and_then(|(_, total)| total.trim().parse().ok())
}

fn into_rows(value: Value) -> DbResult<Vec<Value>> {
    match value {
        Value::Array(rows) => Ok(rows),
        other => Err(DbError::Decode(format!("expected array response, got {}", other))),
    }
}

#[async_trait]
impl DataStore for PostgrestStore {
    async fn select(&self, table: &str, query: &Query) -> DbResult<Vec<Value>> {
        let mut params = query_params(query);
        params.push(("select".to_string(), "*".to_string()));
        into_rows(self.send(self.http.get(self.url(table)).query(&params)).await?)
    }

    async fn count_matching(&self, table: &str, query: &Query) -> DbResult<usize> {
        let mut params = query_params(&Query { limit: None, order: None, ..query.clone() });
        params.push(("select".to_string(), "*".to_string()));
        let response = self
            .execute(self.http.head(self.url(table)).query(&params), "count=exact")
            .await?;

        let range = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| DbError::Decode("count response has no Content-Range".to_string()))?;
        content_range_total(range).ok_or_else(|| DbError::Decode(format!("unexpected Content-Range {}", range)))
    }

    async fn insert(&self, table: &str, row: Value) -> DbResult<Value> {
        let rows = into_rows(self.send(self.http.post(self.url(table)).json(&row)).await?)?;
        rows.into_iter()
            .next()
            .ok_or_else(|| DbError::Decode("insert returned no rows".to_string()))
    }

    async fn update(&self, table: &str, query: &Query, patch: Value) -> DbResult<Vec<Value>> {
        let params = query_params(query);
        into_rows(
            self.send(self.http.patch(self.url(table)).query(&params).json(&patch))
                .await?,
        )
    }

    async fn delete(&self, table: &str, query: &Query) -> DbResult<usize> {
        let params = query_params(query);
        let rows = into_rows(self.send(self.http.delete(self.url(table)).query(&params)).await?)?;
        Ok(rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_params() {
        let q = Query::new()
            .eq("organization_id", "org-1")
            .eq("active", true)
            .is_null("revoked_at")
            .order_desc("created_at")
            .limit(25);

        assert_eq!(
            query_params(&q),
            vec![
                ("organization_id".to_string(), "eq.org-1".to_string()),
                ("active".to_string(), "eq.true".to_string()),
                ("revoked_at".to_string(), "is.null".to_string()),
                ("order".to_string(), "created_at.desc".to_string()),
                ("limit".to_string(), "25".to_string()),
            ]
        );
    }

    #[test]
    fn test_service_credentials() {
        let store = PostgrestStore::new("https://demo.supabase.co/", "service".into(), Duration::from_secs(5)).unwrap();
        assert_eq!(store.url("kits"), "https://demo.supabase.co/rest/v1/kits");

        let headers = store.headers("count=exact").unwrap();
        assert_eq!(headers["apikey"], "service");
        assert_eq!(headers[AUTHORIZATION], "Bearer service");
        assert_eq!(headers["Prefer"], "count=exact");
    }

    #[test]
    fn test_content_range_total() {
        assert_eq!(content_range_total("0-24/250"), Some(250));
        assert_eq!(content_range_total("*/0"), Some(0));
        assert_eq!(content_range_total("0-9/*"), None);
        assert_eq!(content_range_total("garbage"), None);
    }
}

//! Object storage for uploaded files (avatars).

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::db::store::{DbError, DbResult};

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `bytes` under `bucket/path`, replacing any existing object, and
    /// return its public URL.
    async fn upload(&self, bucket: &str, path: &str, content_type: &str, bytes: Vec<u8>) -> DbResult<String>;
}

/// Hosted storage API (`/storage/v1/object/{bucket}/{path}`).
pub struct HostedStorage {
    http: reqwest::Client,
    project_url: String,
    service_key: String,
}

impl HostedStorage {
    pub fn new(project_url: &str, service_key: String, timeout: Duration) -> DbResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DbError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            project_url: project_url.trim_end_matches('/').to_string(),
            service_key,
        })
    }

    pub fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.project_url, bucket, path)
    }
}

#[async_trait]
impl ObjectStorage for HostedStorage {
    async fn upload(&self, bucket: &str, path: &str, content_type: &str, bytes: Vec<u8>) -> DbResult<String> {
        let url = format!("{}/storage/v1/object/{}/{}", self.project_url, bucket, path);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .header("x-upsert", "true")
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| DbError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(DbError::Api { status: status.as_u16(), message });
        }
        Ok(self.public_url(bucket, path))
    }
}

/// Process-local storage for development and tests.
#[derive(Default)]
pub struct MemoryStorage {
    objects: DashMap<String, (String, Vec<u8>)>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Content type and bytes of a stored object.
    pub fn get(&self, bucket: &str, path: &str) -> Option<(String, Vec<u8>)> {
        self.objects.get(&format!("{}/{}", bucket, path)).map(|r| r.value().clone())
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn upload(&self, bucket: &str, path: &str, content_type: &str, bytes: Vec<u8>) -> DbResult<String> {
        let key = format!("{}/{}", bucket, path);
        self.objects.insert(key.clone(), (content_type.to_string(), bytes));
        Ok(format!("memory://{}", key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_upload_replaces() {
        let storage = MemoryStorage::new();
        storage.upload("avatars", "u1/a.png", "image/png", vec![1]).await.unwrap();
        let url = storage.upload("avatars", "u1/a.png", "image/png", vec![2, 3]).await.unwrap();

        assert_eq!(url, "memory://avatars/u1/a.png");
        assert_eq!(storage.get("avatars", "u1/a.png").unwrap().1, vec![2, 3]);
    }

    #[test]
    fn test_public_url() {
        let storage = HostedStorage::new("https://demo.supabase.co/", "k".into(), Duration::from_secs(1)).unwrap();
        assert_eq!(
            storage.public_url("avatars", "u1/a.png"),
            "https://demo.supabase.co/storage/v1/object/public/avatars/u1/a.png"
        );
    }
}

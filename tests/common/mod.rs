//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tower::ServiceExt;

use onboard_hero::auth::session::{Claims, TOKEN_AUDIENCE};
use onboard_hero::config::Environment;
use onboard_hero::db::models::{COMPANIES, PROFILES};
use onboard_hero::db::{DataStore, MemoryStorage, MemoryStore};
use onboard_hero::http::build_router;
use onboard_hero::{AppConfig, AppState};

pub const JWT_SECRET: &str = "integration-test-jwt-secret";
pub const WEBHOOK_SECRET: &str = "whsec_integration";

/// Test configuration: local JWT verification, no vendors, no rate-limit store.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.environment = Environment::Test;
    config.supabase.jwt_secret = Some(JWT_SECRET.to_string());
    config.stripe.webhook_secret = Some(WEBHOOK_SECRET.to_string());
    config.retries.base_delay_ms = 1;
    config.retries.max_delay_ms = 5;
    config
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub storage: Arc<MemoryStorage>,
}

impl TestApp {
    pub fn new(config: AppConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let storage = Arc::new(MemoryStorage::new());
        let state = AppState::with_stores(config, store.clone(), storage.clone()).unwrap();
        Self { router: build_router(state.clone()), state, store, storage }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        TestResponse { status, headers, body }
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

/// A signed session token for `user_id`.
pub fn token(user_id: &str) -> String {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs();
    let claims = Claims {
        sub: user_id.to_string(),
        email: Some(format!("{}@example.com", user_id)),
        exp: now + 3600,
        aud: Some(TOKEN_AUDIENCE.to_string()),
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(JWT_SECRET.as_bytes())).unwrap()
}

pub async fn seed_company(store: &MemoryStore, id: &str, customer_id: Option<&str>) {
    store
        .insert(COMPANIES, json!({ "id": id, "name": format!("Company {}", id), "stripe_customer_id": customer_id }))
        .await
        .unwrap();
}

pub async fn seed_user(store: &MemoryStore, id: &str, organization_id: Option<&str>, role: &str) {
    store
        .insert(
            PROFILES,
            json!({
                "id": id,
                "email": format!("{}@example.com", id),
                "role": role,
                "status": "active",
                "organization_id": organization_id,
            }),
        )
        .await
        .unwrap();
}

pub fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    request(Method::GET, uri, token, None)
}

/// A request as seen by a mock vendor.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Decoded `application/x-www-form-urlencoded` body.
    pub fn form(&self) -> HashMap<String, String> {
        url::form_urlencoded::parse(self.body.as_bytes()).into_owned().collect()
    }

    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> Option<CapturedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut start = lines.next()?.split_whitespace();
    let method = start.next()?.to_string();
    let path = start.next()?.to_string();
    let headers: HashMap<String, String> = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    let length: usize = headers.get("content-length").and_then(|v| v.parse().ok()).unwrap_or(0);
    while buf.len() < header_end + length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body = String::from_utf8_lossy(&buf[header_end..]).to_string();

    Some(CapturedRequest { method, path, headers, body })
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        400 => "Bad Request",
        401 => "Unauthorized",
        402 => "Payment Required",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

/// Start a programmable mock vendor on an ephemeral port. Every request is
/// recorded; `respond` picks the status and JSON body.
pub async fn start_mock_vendor<F, Fut>(respond: F) -> (SocketAddr, Arc<Mutex<Vec<CapturedRequest>>>)
where
    F: Fn(CapturedRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let captured = Arc::new(Mutex::new(Vec::new()));
    let respond = Arc::new(respond);

    let log = captured.clone();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let respond = respond.clone();
            let log = log.clone();
            tokio::spawn(async move {
                let Some(req) = read_request(&mut socket).await else {
                    return;
                };
                log.lock().unwrap().push(req.clone());
                let (status, body) = respond(req).await;
                let response = format!(
                    "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    status_text(status),
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (addr, captured)
}

/// Mock vendor that always answers `status` with `body`.
pub async fn start_fixed_vendor(status: u16, body: &'static str) -> (SocketAddr, Arc<Mutex<Vec<CapturedRequest>>>) {
    start_mock_vendor(move |_| async move { (status, body.to_string()) }).await
}

//! HTTP server setup and shared application state.
//!
//! # Responsibilities
//! - Build the shared state (store, sessions, limiter, vendor clients)
//! - Create the Axum router with every route group
//! - Wire up middleware (session, rate limit, limits, request ID, tracing)
//! - Serve plain TCP or TLS until shutdown
//! - Apply configuration reloads
//!
//! # Layer order (outermost first)
//! ```text
//! request id → trace → propagate id → security headers → metrics
//!     → timeout → body limit → session → rate limit → routes
//! ```

use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{body::Body, extract::DefaultBodyLimit, http::Request, middleware, Router};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::admin;
use crate::auth::context::resolve_session;
use crate::auth::{SessionAdapter, SessionError};
use crate::config::validation::validate_config;
use crate::config::AppConfig;
use crate::db::{DataStore, DbError, HostedStorage, MemoryStorage, MemoryStore, ObjectStorage, PostgrestStore};
use crate::graphql::{build_schema, AppSchema};
use crate::http::request::{propagate_request_id_layer, set_request_id_layer, RequestIdExt};
use crate::http::routes;
use crate::http::tls::load_tls_config;
use crate::integrations::{IntegrationError, Integrations};
use crate::observability::metrics;
use crate::security::headers::with_security_headers;
use crate::security::rate_limit::{rate_limit_middleware, RateLimitError};
use crate::security::{RateLimitState, RateLimiter};
use crate::webhooks::StripeWebhook;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("session adapter: {0}")]
    Session(#[from] SessionError),

    #[error("data store: {0}")]
    Database(#[from] DbError),

    #[error("rate limiter: {0}")]
    RateLimit(#[from] RateLimitError),

    #[error("integrations: {0}")]
    Integration(#[from] IntegrationError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ArcSwap<AppConfig>>,
    pub store: Arc<dyn DataStore>,
    pub storage: Arc<dyn ObjectStorage>,
    pub sessions: Arc<SessionAdapter>,
    pub rate_limit: RateLimitState,
    pub integrations: Arc<ArcSwap<Integrations>>,
    pub webhooks: StripeWebhook,
    pub schema: AppSchema,
    pub request_count: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl AppState {
    /// Build state against the hosted backend when configured, else in-memory stores.
    pub fn from_config(config: AppConfig) -> Result<Self, StartupError> {
        let timeout = Duration::from_secs(config.timeouts.upstream_secs);
        let supabase = &config.supabase;

        let (store, storage): (Arc<dyn DataStore>, Arc<dyn ObjectStorage>) = match &supabase.url {
            Some(url) => {
                let key = supabase.service_role_key.clone().ok_or_else(|| {
                    StartupError::InvalidConfig("supabase.service_role_key is required when supabase.url is set".into())
                })?;
                let store = PostgrestStore::new(url, key.clone(), timeout)?;
                let storage = HostedStorage::new(url, key, timeout)?;
                (Arc::new(store), Arc::new(storage))
            }
            None => {
                tracing::warn!("No hosted database configured; using in-memory store");
                (Arc::new(MemoryStore::new()), Arc::new(MemoryStorage::new()))
            }
        };

        Self::with_stores(config, store, storage)
    }

    /// Build state around the given stores.
    pub fn with_stores(
        config: AppConfig,
        store: Arc<dyn DataStore>,
        storage: Arc<dyn ObjectStorage>,
    ) -> Result<Self, StartupError> {
        let timeout = Duration::from_secs(config.timeouts.upstream_secs);
        let sessions = SessionAdapter::from_config(&config.supabase, store.clone(), timeout)?;
        let limiter = RateLimiter::from_config(&config.rate_limit, timeout)?;
        let integrations = Integrations::from_config(&config)?;

        Ok(Self {
            rate_limit: RateLimitState::new(limiter, config.rate_limit.trust_forwarded_for),
            schema: build_schema(store.clone()),
            config: Arc::new(ArcSwap::from_pointee(config)),
            store,
            storage,
            sessions: Arc::new(sessions),
            integrations: Arc::new(ArcSwap::from_pointee(integrations)),
            webhooks: StripeWebhook::default(),
            request_count: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        })
    }

    /// Apply a reloaded configuration. Rate-limit and vendor settings take
    /// effect immediately; database and auth settings need a restart.
    pub fn reload(&self, config: AppConfig) -> Result<(), StartupError> {
        if let Err(errors) = validate_config(&config) {
            let fields: Vec<String> = errors.iter().map(ToString::to_string).collect();
            return Err(StartupError::InvalidConfig(fields.join("; ")));
        }
        let timeout = Duration::from_secs(config.timeouts.upstream_secs);
        let limiter = RateLimiter::from_config(&config.rate_limit, timeout)?;
        let integrations = Integrations::from_config(&config)?;

        self.rate_limit.reload(limiter, config.rate_limit.trust_forwarded_for);
        self.integrations.store(Arc::new(integrations));
        self.config.store(Arc::new(config));
        tracing::info!("Configuration reloaded");
        Ok(())
    }
}

async fn count_requests(
    axum::extract::State(counter): axum::extract::State<Arc<AtomicU64>>,
    request: Request<Body>,
    next: middleware::Next,
) -> axum::response::Response {
    counter.fetch_add(1, Ordering::Relaxed);
    next.run(request).await
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(state: AppState) -> Router {
    let config = state.config.load_full();

    let app = Router::new()
        .merge(routes::router(&config))
        .nest("/api/admin", admin::router())
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(state.rate_limit.clone(), rate_limit_middleware))
        .layer(middleware::from_fn_with_state(state.sessions.clone(), resolve_session))
        .layer(DefaultBodyLimit::max(config.security.max_body_size))
        .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
        .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
        .layer(middleware::from_fn_with_state(state.request_count.clone(), count_requests))
        .layer(middleware::from_fn(metrics::track_requests));

    let app = if config.security.enable_headers { with_security_headers(app) } else { app };

    app.layer(propagate_request_id_layer())
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
            tracing::info_span!(
                "request",
                method = %request.method(),
                path = %request.uri().path(),
                request_id = %request.request_id(),
            )
        }))
        .layer(set_request_id_layer())
}

/// HTTP server for the onboarding API.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: AppConfig) -> Result<Self, StartupError> {
        Ok(Self::with_state(AppState::from_config(config)?))
    }

    pub fn with_state(state: AppState) -> Self {
        let router = build_router(state.clone());
        Self { router, state }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run the server on `listener` until `shutdown` fires.
    ///
    /// Configurations arriving on `config_updates` are applied as they come.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: Option<mpsc::UnboundedReceiver<AppConfig>>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        let config = self.state.config.load_full();

        if let Some(mut updates) = config_updates {
            let state = self.state.clone();
            tokio::spawn(async move {
                while let Some(new_config) = updates.recv().await {
                    if let Err(e) = state.reload(new_config) {
                        tracing::error!(error = %e, "Rejected configuration reload; keeping current configuration");
                    }
                }
            });
        }

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        match &config.listener.tls {
            Some(tls) => {
                let rustls = load_tls_config(Path::new(&tls.cert_path), Path::new(&tls.key_path)).await?;
                tracing::info!(address = %addr, "HTTPS server starting");

                let handle = axum_server::Handle::new();
                let shutdown_handle = handle.clone();
                tokio::spawn(async move {
                    let _ = shutdown.recv().await;
                    shutdown_handle.graceful_shutdown(Some(Duration::from_secs(10)));
                });

                axum_server::from_tcp_rustls(listener.into_std()?, rustls)
                    .handle(handle)
                    .serve(app)
                    .await?;
            }
            None => {
                tracing::info!(address = %addr, "HTTP server starting");
                axum::serve(listener, app)
                    .with_graceful_shutdown(async move {
                        let _ = shutdown.recv().await;
                    })
                    .await?;
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

//! Onboard Hero API: multi-tenant client onboarding backend.

// Core subsystems
pub mod auth;
pub mod config;
pub mod db;
pub mod http;

// Product surfaces
pub mod admin;
pub mod billing;
pub mod graphql;
pub mod integrations;
pub mod webhooks;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod security;

pub use config::schema::AppConfig;
pub use http::{AppState, HttpServer};
pub use lifecycle::Shutdown;

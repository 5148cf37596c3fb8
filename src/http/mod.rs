//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, middleware stack, shared state)
//!     → extract.rs (enveloped extractor rejections)
//!     → request.rs (request ID)
//!     → routes/ (handlers, role gates)
//!     → response.rs (envelope, error mapping)
//!     → Send to client
//! ```

pub mod extract;
pub mod request;
pub mod response;
pub mod routes;
pub mod server;
pub mod tls;

pub use request::{RequestIdExt, X_REQUEST_ID};
pub use response::{ApiError, ApiResponse, ApiResult};
pub use server::{build_router, AppState, HttpServer, StartupError};

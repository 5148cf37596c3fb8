//! Authentication and authorization.
//!
//! # Data Flow
//! ```text
//! request
//!     → session.rs (token → verified subject → profile → Identity)
//!     → context.rs (attach Identity; AuthContext / TenantContext extractors; role gates)
//!     → roles.rs (role levels and permission lists)
//! ```

pub mod context;
pub mod roles;
pub mod session;

pub use context::{AuthContext, MaybeIdentity, TenantContext};
pub use roles::{Permission, Role};
pub use session::{Identity, SessionAdapter, SessionError, TokenVerifier};

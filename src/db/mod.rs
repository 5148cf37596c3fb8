//! Data access layer.
//!
//! # Data Flow
//! ```text
//! handler / resolver
//!     → repo.rs (typed, tenant-scoped operations)
//!     → store.rs (DataStore trait: select / count / insert / update / delete)
//!     → postgrest.rs (hosted database) or MemoryStore (local)
//! ```
//!
//! No transactions or query planning happen here; atomicity is whatever a
//! single-row hosted operation provides.

pub mod models;
pub mod postgrest;
pub mod repo;
pub mod storage;
pub mod store;

pub use postgrest::PostgrestStore;
pub use storage::{HostedStorage, MemoryStorage, ObjectStorage};
pub use store::{DataStore, DbError, DbResult, MemoryStore, Query};

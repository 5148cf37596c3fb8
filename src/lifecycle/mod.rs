//! Process lifecycle.
//!
//! ```text
//! main.rs: load config → init logging/metrics → start config watcher → bind → serve
//! signals.rs: SIGINT / SIGTERM → Shutdown::trigger
//! shutdown.rs: notice fans out → server stops accepting → in-flight requests drain
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;

//! cloudfeed-core: Shared infrastructure for the cloudfeed changefeed sink.
//!
//! - `storage/` - Multi-cloud storage abstraction (S3, GCS, Azure, local)
//! - `metrics/` - Internal metric events and the `emit!` macro
//! - `config/` - YAML loading with environment variable interpolation
//! - `error` - Common error types
//! - `tracing` - Subscriber initialization for binaries
//! - `signal` - Shutdown signal handling for binaries

pub mod config;
pub mod error;
pub mod metrics;
pub mod signal;
pub mod storage;
pub mod tracing;

// Re-export commonly used items
pub use config::{KB, MB, interpolate, load_yaml, load_yaml_file};
pub use error::{ConfigError, StorageError};
pub use signal::shutdown_signal;
pub use storage::{ExternalStorage, StorageProvider};
pub use tracing::init_tracing;

//! Error types for the cloudfeed sink.

use snafu::prelude::*;

pub use cloudfeed_core::error::{ConfigError, StorageError};

/// Errors returned by the sink controller.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SinkError {
    /// The sink configuration was rejected.
    #[snafu(display("Configuration error: {source}"))]
    Config { source: ConfigError },

    /// An operation was attempted after `close`.
    #[snafu(display("cannot {operation}: sink is closed"))]
    Closed { operation: &'static str },

    /// Persisting a file failed. The buffer it was cut from is retained.
    #[snafu(display("Failed to write {path}: {source}"))]
    Write { path: String, source: StorageError },

    /// The write to `path` was cancelled before it completed.
    #[snafu(display("Write to {path} was cancelled"))]
    Cancelled { path: String },

    /// The resolved timestamp payload could not be encoded.
    #[snafu(display("Failed to encode resolved timestamp: {source}"))]
    Encode { source: serde_json::Error },

    /// Opening or closing the storage backend failed.
    #[snafu(display("Storage error: {source}"))]
    Storage { source: StorageError },
}

impl SinkError {
    /// Whether the orchestration layer may retry the failed operation.
    ///
    /// Write failures and cancellations leave the sink's buffers intact, so
    /// calling `flush` again resumes where the previous attempt stopped.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SinkError::Write { .. } | SinkError::Cancelled { .. })
    }
}

impl From<ConfigError> for SinkError {
    fn from(source: ConfigError) -> Self {
        SinkError::Config { source }
    }
}

impl From<StorageError> for SinkError {
    fn from(source: StorageError) -> Self {
        SinkError::Storage { source }
    }
}

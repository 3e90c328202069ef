//! Common error types shared across cloudfeed crates.
//!
//! This module defines error types for storage and configuration operations.

use snafu::prelude::*;

// ============ Storage Errors ============

/// Errors that can occur during storage operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StorageError {
    /// Invalid storage URL format.
    #[snafu(display("Invalid storage URL: {url}"))]
    InvalidUrl { url: String },

    /// Object store operation failed.
    #[snafu(display("Storage operation failed: {source}"))]
    ObjectStore { source: object_store::Error },

    /// IO error during storage operations.
    #[snafu(display("IO error: {source}"))]
    Io { source: std::io::Error },

    /// S3 configuration error.
    #[snafu(display("S3 configuration error: {source}"))]
    S3Config { source: object_store::Error },

    /// GCS configuration error.
    #[snafu(display("GCS configuration error: {source}"))]
    GcsConfig { source: object_store::Error },

    /// Azure configuration error.
    #[snafu(display("Azure configuration error: {source}"))]
    AzureConfig { source: object_store::Error },
}

// ============ Config Errors ============

/// Errors that can occur during sink configuration parsing and validation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    /// Sink URI is empty.
    #[snafu(display("Sink URI cannot be empty"))]
    EmptySinkUri,

    /// Session identifier is empty.
    #[snafu(display("Session id cannot be empty"))]
    EmptySessionId,

    /// Target file size must be positive.
    #[snafu(display("Target file size must be greater than zero"))]
    ZeroTargetFileSize,

    /// The requested output format is not supported by this sink.
    #[snafu(display("this sink is incompatible with format={format}"))]
    UnsupportedFormat { format: String },

    /// The requested envelope is not supported by this sink.
    #[snafu(display("this sink is incompatible with envelope={envelope}"))]
    UnsupportedEnvelope { envelope: String },

    /// A required option was not supplied.
    #[snafu(display("this sink requires the WITH {option} option"))]
    MissingOption { option: String },

    /// Environment variable interpolation failed.
    #[snafu(display("Environment variable interpolation failed:\n{message}"))]
    EnvInterpolation { message: String },

    /// Failed to parse YAML configuration.
    #[snafu(display("Failed to parse YAML: {source}"))]
    YamlParse { source: serde_yaml::Error },

    /// Failed to read configuration file.
    #[snafu(display("Failed to read configuration file {}: {source}", path.display()))]
    ReadFile {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
}

//! Multi-cloud storage abstraction.
//!
//! Provides a unified interface for writing changefeed output to S3, GCS,
//! Azure Blob Storage, and the local filesystem. The backend is selected by
//! the scheme and shape of the sink URI.

mod azure;
mod gcs;
mod local;
mod s3;
mod url_parser;

pub use url_parser::BackendConfig;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt, future::ready};
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use snafu::prelude::*;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::emit;
use crate::error::{ObjectStoreSnafu, StorageError};
use crate::metrics::events::{
    RequestStatus, StorageOperation, StorageRequest, StorageRequestDuration,
};

// Re-export config types
pub use azure::AzureConfig;
pub use gcs::GcsConfig;
pub use local::LocalConfig;
pub use s3::S3Config;

/// Destination for sink output.
///
/// Writes are whole-object puts; writing the same path twice overwrites it.
/// Dropping an in-flight `write_file` future abandons the write.
#[async_trait]
pub trait ExternalStorage: Send + Sync {
    /// Write `payload` to `path`, relative to the storage root.
    async fn write_file(&self, path: &Path, payload: Bytes) -> Result<(), StorageError>;

    /// Release the storage handle.
    async fn close(&self) -> Result<(), StorageError>;
}

#[async_trait]
impl<T: ExternalStorage + ?Sized> ExternalStorage for Arc<T> {
    async fn write_file(&self, path: &Path, payload: Bytes) -> Result<(), StorageError> {
        (**self).write_file(path, payload).await
    }

    async fn close(&self) -> Result<(), StorageError> {
        (**self).close().await
    }
}

/// Storage provider that abstracts over different cloud storage backends.
#[derive(Clone)]
pub struct StorageProvider {
    pub(crate) config: BackendConfig,
    pub(crate) object_store: Arc<dyn ObjectStore>,
    pub(crate) canonical_url: String,
}

impl std::fmt::Debug for StorageProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StorageProvider<{}>", self.canonical_url)
    }
}

impl StorageProvider {
    /// Create a storage provider for the given URL with storage options.
    pub async fn for_url_with_options(
        url: &str,
        options: HashMap<String, String>,
    ) -> Result<Self, StorageError> {
        let config = BackendConfig::parse_url(url)?;

        match config {
            BackendConfig::S3(config) => Self::construct_s3(config, options).await,
            BackendConfig::Gcs(config) => Self::construct_gcs(config, options).await,
            BackendConfig::Azure(config) => Self::construct_azure(config, options).await,
            BackendConfig::Local(config) => Self::construct_local(config).await,
        }
    }

    /// List files in the storage location.
    /// Returns paths relative to the configured key prefix.
    pub async fn list(
        &self,
        include_subdirectories: bool,
    ) -> Result<impl Stream<Item = Result<Path, object_store::Error>> + '_, StorageError> {
        emit!(StorageRequest {
            operation: StorageOperation::List,
            status: RequestStatus::Success,
        });

        let key_path: Option<Path> = self.config.key().cloned();
        let key_part_count = key_path
            .as_ref()
            .map(|key| key.parts().count())
            .unwrap_or_default();

        let list = self
            .object_store
            .list(key_path.as_ref())
            .filter_map(move |meta| {
                let result = match meta {
                    Ok(metadata) => {
                        let path = metadata.location;
                        if !include_subdirectories && path.parts().count() != key_part_count + 1 {
                            None
                        } else {
                            // Strip the prefix so callers get paths they can pass back to get/put
                            let relative_path: Path = path.parts().skip(key_part_count).collect();
                            Some(Ok(relative_path))
                        }
                    }
                    Err(err) => Some(Err(err)),
                };
                ready(result)
            });

        Ok(list)
    }

    /// Get the contents of a file.
    pub async fn get(&self, path: impl Into<Path>) -> Result<Bytes, StorageError> {
        let path = path.into();
        let start = Instant::now();
        let result = self.object_store.get(&self.qualify_path(&path)).await;

        emit!(StorageRequest {
            operation: StorageOperation::Get,
            status: RequestStatus::from_result(&result),
        });
        emit!(StorageRequestDuration {
            operation: StorageOperation::Get,
            duration: start.elapsed(),
        });

        let bytes = result
            .context(ObjectStoreSnafu)?
            .bytes()
            .await
            .context(ObjectStoreSnafu)?;
        Ok(bytes)
    }

    /// Put a payload to a path.
    pub async fn put_payload(&self, path: &Path, payload: PutPayload) -> Result<(), StorageError> {
        let path = self.qualify_path(path);
        let start = Instant::now();
        let result = self.object_store.put(&path, payload).await;

        emit!(StorageRequest {
            operation: StorageOperation::Put,
            status: RequestStatus::from_result(&result),
        });
        emit!(StorageRequestDuration {
            operation: StorageOperation::Put,
            duration: start.elapsed(),
        });

        result.context(ObjectStoreSnafu)?;
        Ok(())
    }

    /// Qualify a path with the configured key prefix.
    pub fn qualify_path<'a>(&self, path: &'a Path) -> Cow<'a, Path> {
        match self.config.key() {
            Some(prefix) => Cow::Owned(prefix.parts().chain(path.parts()).collect()),
            None => Cow::Borrowed(path),
        }
    }

    /// Normalized URL of the storage root, for logging.
    pub fn canonical_url(&self) -> &str {
        &self.canonical_url
    }
}

#[async_trait]
impl ExternalStorage for StorageProvider {
    async fn write_file(&self, path: &Path, payload: Bytes) -> Result<(), StorageError> {
        self.put_payload(path, PutPayload::from(payload)).await
    }

    async fn close(&self) -> Result<(), StorageError> {
        // object_store clients hold no session state; dropping the handle is enough.
        debug!(url = %self.canonical_url, "Closing storage provider");
        Ok(())
    }
}

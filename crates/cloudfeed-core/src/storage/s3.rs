//! S3 storage backend implementation.

use object_store::{ObjectStore, RetryConfig};
use object_store::aws::AmazonS3Builder;
use object_store::path::Path;
use snafu::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{S3ConfigSnafu, StorageError};

use super::{BackendConfig, StorageProvider};

/// S3 storage configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Config {
    pub endpoint: Option<String>,
    pub region: Option<String>,
    pub bucket: String,
    pub key: Option<Path>,
}

impl S3Config {
    fn canonical_url(&self) -> String {
        let root = match (&self.region, &self.endpoint) {
            (_, Some(endpoint)) => format!("s3::{endpoint}/{}", self.bucket),
            (Some(region), _) => format!("https://s3.{region}.amazonaws.com/{}", self.bucket),
            _ => format!("https://s3.amazonaws.com/{}", self.bucket),
        };
        match &self.key {
            Some(key) => format!("{root}/{key}"),
            None => root,
        }
    }
}

impl StorageProvider {
    pub(super) async fn construct_s3(
        config: S3Config,
        options: HashMap<String, String>,
    ) -> Result<Self, StorageError> {
        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(&config.bucket)
            .with_retry(RetryConfig::default());

        for (key, value) in &options {
            builder = builder.with_config(key.parse().context(S3ConfigSnafu)?, value.clone());
        }

        if let Some(region) = &config.region {
            builder = builder.with_region(region);
        }

        if let Some(endpoint) = &config.endpoint {
            builder = builder
                .with_endpoint(endpoint)
                .with_virtual_hosted_style_request(false)
                .with_allow_http(true);
        }

        let object_store: Arc<dyn ObjectStore> =
            Arc::new(builder.build().context(S3ConfigSnafu)?);

        Ok(Self {
            canonical_url: config.canonical_url(),
            config: BackendConfig::S3(config),
            object_store,
        })
    }
}

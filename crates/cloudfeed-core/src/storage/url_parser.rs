//! Sink URI parsing.
//!
//! Maps a sink URI onto the backend that serves it (S3, GCS, Azure, local
//! filesystem). The key part of the URI becomes the root under which
//! date-partition directories are created.

use object_store::path::Path;
use regex::{Captures, Regex};
use std::sync::OnceLock;

use crate::error::{InvalidUrlSnafu, StorageError};

use super::{AzureConfig, GcsConfig, LocalConfig, S3Config};

const S3_PATH: &str =
    r"^https://s3\.(?P<region>[\w\-]+)\.amazonaws\.com/(?P<bucket>[a-z0-9\-\.]+)(/(?P<key>.+))?$";
const S3_VIRTUAL: &str =
    r"^https://(?P<bucket>[a-z0-9\-\.]+)\.s3\.(?P<region>[\w\-]+)\.amazonaws\.com(/(?P<key>.+))?$";
const S3_ENDPOINT_URL: &str = r"^[sS]3[aA]?::(?<protocol>https?)://(?P<endpoint>[^:/]+):(?<port>\d+)/(?P<bucket>[a-z0-9\-\.]+)(/(?P<key>.+))?$";
const S3_URL: &str = r"^[sS]3[aA]?://(?P<bucket>[a-z0-9\-\.]+)(/(?P<key>.+))?$";

const GCS_PATH: &str =
    r"^https://storage\.googleapis\.com/(?P<bucket>[a-z0-9\-_\.]+)(/(?P<key>.+))?$";
const GCS_VIRTUAL: &str =
    r"^https://(?P<bucket>[a-z0-9\-_\.]+)\.storage\.googleapis\.com(/(?P<key>.+))?$";
const GCS_URL: &str = r"^[gG][sS]://(?P<bucket>[a-z0-9\-\._]+)(/(?P<key>.+))?$";

const ABFS_URL: &str = r"^abfss?://(?P<container>[a-z0-9\-]+)@(?P<account>[a-z0-9]+)\.dfs\.core\.windows\.net(/(?P<key>.+))?$";
const AZURE_HTTPS: &str = r"^https://(?P<account>[a-z0-9]+)\.(blob|dfs)\.core\.windows\.net/(?P<container>[a-z0-9\-]+)(/(?P<key>.+))?$";

const FILE_URI: &str = r"^file://(?P<path>.*)$";
const FILE_URL: &str = r"^file:(?P<path>.*)$";
const FILE_PATH: &str = r"^/(?P<path>.*)$";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    S3,
    Gcs,
    Azure,
    Local,
}

/// Patterns are tried in order; the first match wins.
fn matchers() -> &'static [(Backend, Regex)] {
    static MATCHERS: OnceLock<Vec<(Backend, Regex)>> = OnceLock::new();
    MATCHERS.get_or_init(|| {
        [
            (Backend::S3, S3_PATH),
            (Backend::S3, S3_VIRTUAL),
            (Backend::S3, S3_ENDPOINT_URL),
            (Backend::S3, S3_URL),
            (Backend::Gcs, GCS_PATH),
            (Backend::Gcs, GCS_VIRTUAL),
            (Backend::Gcs, GCS_URL),
            (Backend::Azure, ABFS_URL),
            (Backend::Azure, AZURE_HTTPS),
            (Backend::Local, FILE_URI),
            (Backend::Local, FILE_URL),
            (Backend::Local, FILE_PATH),
        ]
        .into_iter()
        .map(|(backend, pattern)| (backend, Regex::new(pattern).expect("valid URL pattern")))
        .collect()
    })
}

/// Backend configuration enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    S3(S3Config),
    Gcs(GcsConfig),
    Azure(AzureConfig),
    Local(LocalConfig),
}

impl BackendConfig {
    /// Parse a sink URI into a backend configuration.
    pub fn parse_url(url: &str) -> Result<Self, StorageError> {
        let Some((backend, caps)) = matchers()
            .iter()
            .find_map(|(backend, regex)| regex.captures(url).map(|caps| (*backend, caps)))
        else {
            return InvalidUrlSnafu {
                url: url.to_string(),
            }
            .fail();
        };

        Ok(match backend {
            Backend::S3 => Self::parse_s3(&caps),
            Backend::Gcs => BackendConfig::Gcs(GcsConfig {
                bucket: required(&caps, "bucket"),
                key: key(&caps),
            }),
            Backend::Azure => BackendConfig::Azure(AzureConfig {
                account: required(&caps, "account"),
                container: required(&caps, "container"),
                key: key(&caps),
            }),
            Backend::Local => Self::parse_local(&caps),
        })
    }

    fn parse_s3(caps: &Captures) -> Self {
        let region = std::env::var("AWS_DEFAULT_REGION")
            .ok()
            .or_else(|| caps.name("region").map(|m| m.as_str().to_string()));

        let endpoint = std::env::var("AWS_ENDPOINT").ok().or_else(|| {
            caps.name("endpoint").map(|endpoint| {
                let port = caps
                    .name("port")
                    .and_then(|p| p.as_str().parse::<u16>().ok())
                    .unwrap_or(443);
                let protocol = caps.name("protocol").map_or("https", |p| p.as_str());
                format!("{protocol}://{}:{port}", endpoint.as_str())
            })
        });

        BackendConfig::S3(S3Config {
            endpoint,
            region,
            bucket: required(caps, "bucket"),
            key: key(caps),
        })
    }

    fn parse_local(caps: &Captures) -> Self {
        let path = caps
            .name("path")
            .map_or("", |m| m.as_str())
            .trim_end_matches('/');

        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };

        BackendConfig::Local(LocalConfig { path })
    }

    /// Key prefix inside the bucket/container, if any.
    pub(crate) fn key(&self) -> Option<&Path> {
        match self {
            BackendConfig::S3(s3) => s3.key.as_ref(),
            BackendConfig::Gcs(gcs) => gcs.key.as_ref(),
            BackendConfig::Azure(azure) => azure.key.as_ref(),
            // The local backend is rooted at the full path.
            BackendConfig::Local(_) => None,
        }
    }
}

// Every pattern for a backend declares its mandatory groups.
fn required(caps: &Captures, group: &str) -> String {
    caps.name(group)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

fn key(caps: &Captures) -> Option<Path> {
    caps.name("key")
        .map(|m| m.as_str().trim_end_matches('/'))
        .filter(|k| !k.is_empty())
        .map(Path::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_s3_url_parsing() {
        let config = BackendConfig::parse_url("s3://changefeeds/cluster-1/orders").unwrap();
        let BackendConfig::S3(s3) = config else {
            panic!("Expected S3 config");
        };
        assert_eq!(s3.bucket, "changefeeds");
        assert_eq!(s3.key, Some(Path::from("cluster-1/orders")));
    }

    #[test]
    fn test_s3_path_style_url() {
        let config =
            BackendConfig::parse_url("https://s3.us-east-1.amazonaws.com/changefeeds/orders")
                .unwrap();
        let BackendConfig::S3(s3) = config else {
            panic!("Expected S3 config");
        };
        assert_eq!(s3.bucket, "changefeeds");
        assert_eq!(s3.key, Some(Path::from("orders")));
    }

    #[test]
    fn test_s3_endpoint_url() {
        let config =
            BackendConfig::parse_url("s3::http://localhost:9000/changefeeds/orders").unwrap();
        let BackendConfig::S3(s3) = config else {
            panic!("Expected S3 config");
        };
        assert_eq!(s3.bucket, "changefeeds");
        assert_eq!(s3.key, Some(Path::from("orders")));
        if std::env::var("AWS_ENDPOINT").is_err() {
            assert_eq!(s3.endpoint, Some("http://localhost:9000".to_string()));
        }
    }

    #[test]
    fn test_s3_bucket_root_has_no_key() {
        let config = BackendConfig::parse_url("s3://changefeeds").unwrap();
        assert!(config.key().is_none());
    }

    #[test]
    fn test_gcs_url_parsing() {
        let config = BackendConfig::parse_url("gs://changefeeds/orders/").unwrap();
        assert_eq!(
            config,
            BackendConfig::Gcs(GcsConfig {
                bucket: "changefeeds".to_string(),
                key: Some(Path::from("orders")),
            })
        );
    }

    #[test]
    fn test_gcs_virtual_hosted_url() {
        let config =
            BackendConfig::parse_url("https://changefeeds.storage.googleapis.com/orders").unwrap();
        assert!(matches!(config, BackendConfig::Gcs(ref gcs) if gcs.bucket == "changefeeds"));
    }

    #[test]
    fn test_azure_url_parsing() {
        let config = BackendConfig::parse_url(
            "abfss://feeds@mystorageaccount.dfs.core.windows.net/orders",
        )
        .unwrap();
        assert_eq!(
            config,
            BackendConfig::Azure(AzureConfig {
                account: "mystorageaccount".to_string(),
                container: "feeds".to_string(),
                key: Some(Path::from("orders")),
            })
        );
    }

    #[test]
    fn test_azure_https_url() {
        let config =
            BackendConfig::parse_url("https://mystorageaccount.blob.core.windows.net/feeds")
                .unwrap();
        assert!(matches!(config, BackendConfig::Azure(ref az) if az.key.is_none()));
    }

    #[test]
    fn test_local_paths() {
        for url in [
            "/var/lib/changefeed",
            "file:///var/lib/changefeed",
            "file:/var/lib/changefeed",
            "file:///var/lib/changefeed/",
        ] {
            let config = BackendConfig::parse_url(url).unwrap();
            assert_eq!(
                config,
                BackendConfig::Local(LocalConfig {
                    path: "/var/lib/changefeed".to_string()
                }),
                "Failed for {url}"
            );
            assert!(config.key().is_none());
        }
    }

    #[test]
    fn test_invalid_url() {
        let err = BackendConfig::parse_url("kafka://broker:9092").unwrap_err();
        assert!(matches!(err, StorageError::InvalidUrl { .. }));
    }
}

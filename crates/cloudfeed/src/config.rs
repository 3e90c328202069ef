//! Sink configuration.
//!
//! A [`SinkConfig`] is either loaded from YAML (with `${VAR}` interpolation)
//! or built from the `WITH` options of a changefeed statement. Either way it
//! must pass [`SinkConfig::validate`] before a sink is constructed from it.

use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use std::collections::HashMap;
use std::path::Path;

use cloudfeed_core::error::{
    EmptySessionIdSnafu, EmptySinkUriSnafu, MissingOptionSnafu, UnsupportedEnvelopeSnafu,
    UnsupportedFormatSnafu, ZeroTargetFileSizeSnafu,
};
use cloudfeed_core::{MB, load_yaml, load_yaml_file};

use crate::error::ConfigError;
use crate::hlc::Timestamp;

/// `WITH` option selecting the row format.
pub const OPT_FORMAT: &str = "format";
/// `WITH` option selecting the row envelope.
pub const OPT_ENVELOPE: &str = "envelope";
/// `WITH` option requesting the primary key inside each row. Presence is the flag.
pub const OPT_KEY_IN_VALUE: &str = "key_in_value";

const FORMAT_JSON: &str = "json";
const ENVELOPE_WRAPPED: &str = "wrapped";

/// Configuration for a cloud storage sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SinkConfig {
    /// Base URI of the output location (S3, GCS, Azure, local).
    pub uri: String,
    /// Identity of the node running the sink.
    #[serde(default = "default_node_id")]
    pub node_id: i32,
    /// Token of the job execution; distinguishes files written by restarts.
    pub session_id: String,
    /// Buffer size in bytes above which a file is cut.
    #[serde(default = "default_target_file_size")]
    pub target_file_size: usize,
    /// Rows below this timestamp are never written.
    #[serde(default)]
    pub initial_high_water: Timestamp,
    /// Row format. Only `json` is supported.
    #[serde(default = "default_format")]
    pub format: String,
    /// Row envelope. Only `wrapped` is supported.
    #[serde(default = "default_envelope")]
    pub envelope: String,
    /// Rows must carry their primary key.
    #[serde(default)]
    pub key_in_value: bool,
    /// Storage options for the output location (credentials, region, etc.).
    #[serde(default)]
    pub storage_options: HashMap<String, String>,
}

fn default_node_id() -> i32 {
    1
}

fn default_target_file_size() -> usize {
    16 * MB
}

fn default_format() -> String {
    FORMAT_JSON.to_string()
}

fn default_envelope() -> String {
    ENVELOPE_WRAPPED.to_string()
}

/// On-disk layout of data files for a validated format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputFormat {
    /// File extension including the leading dot.
    pub extension: &'static str,
    /// Byte appended after every record.
    pub delimiter: u8,
}

impl OutputFormat {
    pub const NDJSON: OutputFormat = OutputFormat {
        extension: ".ndjson",
        delimiter: b'\n',
    };
}

impl SinkConfig {
    /// Config with defaults for everything but the required fields.
    pub fn new(uri: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            node_id: default_node_id(),
            session_id: session_id.into(),
            target_file_size: default_target_file_size(),
            initial_high_water: Timestamp::MIN,
            format: default_format(),
            envelope: default_envelope(),
            key_in_value: false,
            storage_options: HashMap::new(),
        }
    }

    /// Build a config from changefeed `WITH` options and validate it.
    ///
    /// Options other than `format`, `envelope` and `key_in_value` belong to
    /// other parts of the changefeed and are ignored.
    pub fn from_options(
        uri: &str,
        node_id: i32,
        session_id: &str,
        options: &HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::new(uri, session_id);
        config.node_id = node_id;
        if let Some(format) = options.get(OPT_FORMAT) {
            config.format = format.clone();
        }
        if let Some(envelope) = options.get(OPT_ENVELOPE) {
            config.envelope = envelope.clone();
        }
        config.key_in_value = options.contains_key(OPT_KEY_IN_VALUE);

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config: SinkConfig = load_yaml_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: SinkConfig = load_yaml(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration and resolve the output format.
    pub fn validate(&self) -> Result<OutputFormat, ConfigError> {
        ensure!(!self.uri.trim().is_empty(), EmptySinkUriSnafu);
        ensure!(!self.session_id.is_empty(), EmptySessionIdSnafu);
        ensure!(self.target_file_size > 0, ZeroTargetFileSizeSnafu);

        let format = match self.format.as_str() {
            FORMAT_JSON => OutputFormat::NDJSON,
            other => return UnsupportedFormatSnafu { format: other }.fail(),
        };
        ensure!(
            self.envelope == ENVELOPE_WRAPPED,
            UnsupportedEnvelopeSnafu {
                envelope: &self.envelope
            }
        );
        ensure!(
            self.key_in_value,
            MissingOptionSnafu {
                option: OPT_KEY_IN_VALUE
            }
        );

        Ok(format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_minimal_yaml() {
        let config = SinkConfig::parse(
            r#"
uri: /tmp/changefeed
session_id: job-1
key_in_value: true
"#,
        )
        .unwrap();

        assert_eq!(config.node_id, 1);
        assert_eq!(config.target_file_size, 16 * MB);
        assert_eq!(config.initial_high_water, Timestamp::MIN);
        assert_eq!(config.format, "json");
        assert_eq!(config.envelope, "wrapped");
        assert!(config.storage_options.is_empty());
    }

    #[test]
    fn test_parse_full_yaml() {
        let config = SinkConfig::parse(
            r#"
uri: s3://changefeeds/orders
node_id: 3
session_id: job-2
target_file_size: 1024
initial_high_water: "1546300800000000000.0000000001"
format: json
envelope: wrapped
key_in_value: true
storage_options:
  aws_region: us-east-1
"#,
        )
        .unwrap();

        assert_eq!(config.node_id, 3);
        assert_eq!(config.target_file_size, 1024);
        assert_eq!(
            config.initial_high_water,
            Timestamp::new(1_546_300_800_000_000_000, 1)
        );
        assert_eq!(config.storage_options["aws_region"], "us-east-1");
    }

    #[test]
    fn test_parse_rejects_unknown_fields() {
        let err = SinkConfig::parse("uri: /tmp/x\nsession_id: s\nkey_in_value: true\nbogus: 1\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::YamlParse { .. }));
    }

    #[test]
    fn test_validate_returns_ndjson_layout() {
        let mut config = SinkConfig::new("/tmp/x", "s");
        config.key_in_value = true;
        assert_eq!(config.validate().unwrap(), OutputFormat::NDJSON);
    }

    #[test]
    fn test_validate_errors() {
        let mut config = SinkConfig::new("/tmp/x", "s");
        config.key_in_value = true;

        let mut bad = config.clone();
        bad.uri = String::new();
        assert!(matches!(bad.validate(), Err(ConfigError::EmptySinkUri)));

        let mut bad = config.clone();
        bad.session_id = String::new();
        assert!(matches!(bad.validate(), Err(ConfigError::EmptySessionId)));

        let mut bad = config.clone();
        bad.target_file_size = 0;
        assert!(matches!(bad.validate(), Err(ConfigError::ZeroTargetFileSize)));

        let mut bad = config.clone();
        bad.format = "avro".to_string();
        let err = bad.validate().unwrap_err();
        assert_eq!(err.to_string(), "this sink is incompatible with format=avro");

        let mut bad = config.clone();
        bad.envelope = "key_only".to_string();
        let err = bad.validate().unwrap_err();
        assert_eq!(err.to_string(), "this sink is incompatible with envelope=key_only");

        let mut bad = config;
        bad.key_in_value = false;
        let err = bad.validate().unwrap_err();
        assert_eq!(err.to_string(), "this sink requires the WITH key_in_value option");
    }

    #[test]
    fn test_from_options() {
        let config = SinkConfig::from_options(
            "gs://bucket/feed",
            2,
            "job-3",
            &options(&[("format", "json"), ("key_in_value", ""), ("resolved", "10s")]),
        )
        .unwrap();
        assert_eq!(config.node_id, 2);
        assert_eq!(config.session_id, "job-3");
        assert!(config.key_in_value);
    }

    #[test]
    fn test_from_options_requires_key_in_value() {
        let err = SinkConfig::from_options("/tmp/x", 1, "s", &options(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingOption { .. }));
    }

    #[test]
    fn test_from_options_rejects_other_envelope() {
        let err = SinkConfig::from_options(
            "/tmp/x",
            1,
            "s",
            &options(&[("envelope", "row"), ("key_in_value", "")]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedEnvelope { .. }));
    }
}

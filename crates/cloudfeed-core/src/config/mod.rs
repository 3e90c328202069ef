//! Configuration loading helpers shared by cloudfeed crates.

mod vars;

pub use vars::{InterpolationResult, interpolate};

use serde::de::DeserializeOwned;
use snafu::prelude::*;
use std::path::Path;

use crate::error::{ConfigError, EnvInterpolationSnafu, ReadFileSnafu, YamlParseSnafu};

/// Byte size constants (binary/IEC units).
pub const KB: usize = 1024;
pub const MB: usize = 1024 * KB;

/// Interpolate environment variables in `text` and deserialize it as YAML.
pub fn load_yaml<T: DeserializeOwned>(text: &str) -> Result<T, ConfigError> {
    let interpolated = interpolate(text);
    ensure!(
        interpolated.is_ok(),
        EnvInterpolationSnafu {
            message: interpolated.errors.join("\n"),
        }
    );

    serde_yaml::from_str(&interpolated.text).context(YamlParseSnafu)
}

/// Read a YAML file from disk and deserialize it with [`load_yaml`].
pub fn load_yaml_file<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let text = std::fs::read_to_string(path).context(ReadFileSnafu { path })?;
    load_yaml(&text)
}

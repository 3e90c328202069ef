//! Environment variable interpolation for sink config files.
//!
//! Supports the following syntax:
//! - `$VAR` or `${VAR}` - substitute with env var value, error if missing
//! - `${VAR:-default}` - use default if VAR is unset OR empty
//! - `${VAR-default}` - use default only if VAR is unset (empty is OK)
//! - `$$` - escape sequence for literal `$`

use regex::{Captures, Regex};
use std::env;
use std::sync::LazyLock;

static ENV_VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        \$\$                           # Escape sequence $$
        |
        \$\{                           # Opening ${
            ([A-Za-z_][A-Za-z0-9_]*)   # Variable name (group 1)
            (?:(:?-)([^}]*))?          # Optional :- or - (group 2) and default (group 3)
        \}
        |
        \$([A-Za-z_][A-Za-z0-9_]*)     # Unbraced $VAR (group 4)
        ",
    )
    .expect("Invalid regex pattern")
});

/// Result of environment variable interpolation.
#[derive(Debug)]
pub struct InterpolationResult {
    /// The interpolated text.
    pub text: String,
    /// Every variable that could not be resolved, so all of them can be reported at once.
    pub errors: Vec<String>,
}

impl InterpolationResult {
    /// Returns true if there were no errors.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Interpolate environment variables in the given text.
pub fn interpolate(input: &str) -> InterpolationResult {
    let mut errors = Vec::new();

    let text = ENV_VAR_PATTERN
        .replace_all(input, |caps: &Captures| match resolve(caps) {
            Ok(value) => value,
            Err(message) => {
                errors.push(message);
                caps[0].to_string()
            }
        })
        .into_owned();

    InterpolationResult { text, errors }
}

fn resolve(caps: &Captures) -> Result<String, String> {
    if &caps[0] == "$$" {
        return Ok("$".to_string());
    }

    let name = caps
        .get(1)
        .or_else(|| caps.get(4))
        .map(|m| m.as_str())
        .unwrap_or_default();
    let empty_means_unset = caps.get(2).is_some_and(|m| m.as_str() == ":-");
    let default = caps.get(3).map(|m| m.as_str());

    match env::var(name) {
        Ok(value) if value.contains('\n') || value.contains('\r') => Err(format!(
            "environment variable '{name}' contains newlines, which is not allowed"
        )),
        Ok(value) if value.is_empty() && empty_means_unset => {
            Ok(default.unwrap_or_default().to_string())
        }
        Ok(value) => Ok(value),
        Err(_) => default
            .map(str::to_string)
            .ok_or_else(|| format!("environment variable '{name}' is not set")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test uses its own variable name so they can run in parallel.
    fn set(key: &str, value: Option<&str>) {
        // SAFETY: variable names are unique per test
        match value {
            Some(v) => unsafe { env::set_var(key, v) },
            None => unsafe { env::remove_var(key) },
        }
    }

    #[test]
    fn test_basic_substitution() {
        set("CLOUDFEED_TEST_BUCKET", Some("changefeed-out"));
        let result = interpolate("uri: s3://$CLOUDFEED_TEST_BUCKET/orders");
        assert!(result.is_ok());
        assert_eq!(result.text, "uri: s3://changefeed-out/orders");
    }

    #[test]
    fn test_braced_substitution() {
        set("CLOUDFEED_TEST_SESSION", Some("a1b2"));
        let result = interpolate("session_id: ${CLOUDFEED_TEST_SESSION}");
        assert!(result.is_ok());
        assert_eq!(result.text, "session_id: a1b2");
    }

    #[test]
    fn test_missing_variable_error() {
        set("CLOUDFEED_TEST_MISSING", None);
        let result = interpolate("uri: $CLOUDFEED_TEST_MISSING");
        assert!(!result.is_ok());
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("CLOUDFEED_TEST_MISSING"));
        assert!(result.errors[0].contains("not set"));
        assert_eq!(result.text, "uri: $CLOUDFEED_TEST_MISSING");
    }

    #[test]
    fn test_default_value_unset() {
        set("CLOUDFEED_TEST_UNSET", None);
        let result = interpolate("node_id: ${CLOUDFEED_TEST_UNSET:-7}");
        assert!(result.is_ok());
        assert_eq!(result.text, "node_id: 7");
    }

    #[test]
    fn test_default_value_empty() {
        set("CLOUDFEED_TEST_EMPTY", Some(""));
        let colon = interpolate("a: ${CLOUDFEED_TEST_EMPTY:-fallback}");
        let plain = interpolate("a: ${CLOUDFEED_TEST_EMPTY-fallback}");
        assert_eq!(colon.text, "a: fallback");
        assert_eq!(plain.text, "a: ");
    }

    #[test]
    fn test_newline_rejected() {
        set("CLOUDFEED_TEST_NEWLINE", Some("a\nb"));
        let result = interpolate("a: $CLOUDFEED_TEST_NEWLINE");
        assert!(!result.is_ok());
        assert!(result.errors[0].contains("newlines"));
    }

    #[test]
    fn test_escape_sequence() {
        let result = interpolate("price: $$100");
        assert!(result.is_ok());
        assert_eq!(result.text, "price: $100");
    }
}

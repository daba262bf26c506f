//! Human-readable duration fields such as `"30s"` or `"10m"`

use std::time::Duration;

use serde::{Deserialize, Deserializer};

/// Parse a duration string
///
/// `"0"`, `"never"` and the empty string map to [`Duration::ZERO`], which
/// idle-unload settings read as "never unload".
///
/// # Errors
///
/// Returns an error if the string is not a valid `duration-str` expression
pub fn parse(raw: &str) -> Result<Duration, String> {
    let trimmed = raw.trim();

    if trimmed.is_empty() || trimmed == "0" || trimmed.eq_ignore_ascii_case("never") {
        return Ok(Duration::ZERO);
    }

    duration_str::parse(trimmed).map_err(|e| format!("invalid duration '{trimmed}': {e}"))
}

/// Serde adapter for `#[serde(deserialize_with = ...)]`
///
/// # Errors
///
/// Returns a deserialization error if the value is not a string or does not parse
pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse(&raw).map_err(serde::de::Error::custom)
}

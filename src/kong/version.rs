//! Gateway version detection.

use serde_json::Value;
use std::fmt;

use crate::error::ApiError;

/// The version a gateway reports on `GET /`.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GatewayVersion {
    parts: Vec<u64>,
}

impl GatewayVersion {
    /// Creates a version from numeric parts.
    #[must_use]
    pub const fn new(parts: Vec<u64>) -> Self {
        Self { parts }
    }

    /// Parses a version string such as `2.8.1` or `1.0.0rc3`.
    ///
    /// Each dot-separated part contributes its leading digits; parsing stops
    /// at the first part without any.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let mut parts = Vec::new();
        for part in raw.trim().split('.') {
            let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
            match digits.parse::<u64>() {
                Ok(number) => parts.push(number),
                Err(_) => break,
            }
        }
        Self { parts }
    }

    /// Reads the version out of the admin API root document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document has no `version` string.
    pub fn from_root(root: &Value) -> Result<Self, ApiError> {
        root.get("version")
            .and_then(Value::as_str)
            .map(Self::parse)
            .ok_or_else(|| ApiError::invalid_response("Root document has no version field"))
    }

    /// Major version number.
    #[must_use]
    pub fn major(&self) -> u64 {
        self.parts.first().copied().unwrap_or_default()
    }

    /// Pre-1.0 gateways reference services and routes with flat
    /// `service_id` / `route_id` fields.
    #[must_use]
    pub fn uses_flat_references(&self) -> bool {
        self.major() < 1
    }

    /// Gateways older than 2.0 carry the plugin `run_on` attribute.
    #[must_use]
    pub fn has_run_on(&self) -> bool {
        self.major() < 2
    }
}

impl fmt::Display for GatewayVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.parts.iter().map(ToString::to_string).collect();
        f.write_str(&rendered.join("."))
    }
}

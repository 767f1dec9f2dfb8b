//! Context files: connection settings and substitution variables.
//!
//! A context file is a JSON document:
//!
//! ```json
//! {
//!   "client": {"server": "kong.internal:8001", "timeout": 10,
//!              "auth": {"type": "basic", "user": "admin", "password": "secret"}},
//!   "var_map": {"upstream_host": "billing.internal"}
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{ConfigError, Result};

/// Default admin API address.
pub const DEFAULT_SERVER: &str = "localhost:8001";

/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Default extra time for the retry after a read timeout, in seconds.
pub const DEFAULT_ADDITIONAL_TIME_SECS: u64 = 5;

/// Directory under the home directory holding named contexts.
pub const CONTEXT_DIR: &str = ".kongctl";

/// Authentication settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSettings {
    /// Authentication scheme; only `basic` is understood.
    #[serde(rename = "type")]
    pub scheme: String,
    /// User name.
    #[serde(default)]
    pub user: Option<String>,
    /// Password.
    #[serde(default)]
    pub password: Option<String>,
}

/// Admin API connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Admin API address; `http://` is assumed when no scheme is given.
    pub server: String,
    /// Per-request timeout in seconds.
    pub timeout: u64,
    /// Extra seconds granted to the retry after a read timeout.
    pub additional_time: u64,
    /// Optional authentication.
    pub auth: Option<AuthSettings>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server: String::from(DEFAULT_SERVER),
            timeout: DEFAULT_TIMEOUT_SECS,
            additional_time: DEFAULT_ADDITIONAL_TIME_SECS,
            auth: None,
        }
    }
}

impl ClientSettings {
    /// Returns the server address with a scheme.
    #[must_use]
    pub fn endpoint(&self) -> String {
        if self.server.starts_with("http") {
            self.server.clone()
        } else {
            format!("http://{}", self.server)
        }
    }

    /// Returns basic auth credentials, if configured.
    #[must_use]
    pub fn basic_auth(&self) -> Option<(&str, &str)> {
        let auth = self.auth.as_ref().filter(|a| a.scheme == "basic")?;
        Some((
            auth.user.as_deref().unwrap_or_default(),
            auth.password.as_deref().unwrap_or_default(),
        ))
    }
}

/// A loaded context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Context {
    /// Connection settings.
    #[serde(default)]
    pub client: ClientSettings,
    /// Variables substituted into desired-state documents.
    #[serde(default)]
    pub var_map: Map<String, Value>,
}

impl Context {
    /// Resolves a context path: as given, else under `~/.kongctl/`.
    ///
    /// # Errors
    ///
    /// Returns an error if neither location holds a file.
    pub fn resolve_path(raw: &Path) -> Result<PathBuf> {
        if raw.is_file() {
            return Ok(raw.to_path_buf());
        }

        if let Some(home) = dirs::home_dir() {
            let candidate = home.join(CONTEXT_DIR).join(raw);
            if candidate.is_file() {
                debug!("Resolved context {} to {}", raw.display(), candidate.display());
                return Ok(candidate);
            }
        }

        Err(ConfigError::FileNotFound {
            path: raw.to_path_buf(),
        }
        .into())
    }

    /// Loads a context file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be found, read or parsed.
    pub fn load(raw: &Path) -> Result<Self> {
        let path = Self::resolve_path(raw)?;
        info!("Loading context from: {}", path.display());

        let content = std::fs::read_to_string(&path).map_err(|e| {
            ConfigError::parse(format!("Failed to read file: {e}"), path.display().to_string())
        })?;

        Self::parse(&content, &path.display().to_string())
    }

    /// Parses a context document.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is invalid.
    pub fn parse(content: &str, location: &str) -> Result<Self> {
        let context: Self = serde_json::from_str(content)
            .map_err(|e| ConfigError::parse(format!("JSON parse error: {e}"), location))?;
        Ok(context)
    }

    /// Applies command-line overrides.
    #[must_use]
    pub fn with_overrides(mut self, server: Option<String>, timeout: Option<u64>) -> Self {
        if let Some(server) = server {
            self.client.server = server;
        }
        if let Some(timeout) = timeout {
            self.client.timeout = timeout;
        }
        self
    }
}

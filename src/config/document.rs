//! Desired-state document types.
//!
//! Three document kinds exist:
//!
//! ```yaml
//! # services document
//! _format_version: "2.8.1"
//! service_group: payments
//! services:
//!   - name: billing
//!     url: http://billing.internal:8080/api
//!     routes:
//!       - name: invoices
//!         paths: ["/invoices"]
//!     plugins:
//!       - name: rate-limiting
//!         route: {name: invoices}
//!         config: {minute: 20}
//! ```
//!
//! ```yaml
//! # consumers document
//! consumers:
//!   - username: alice
//!     keyauth_credentials:
//!       - key: alice-key
//!     jwt_secrets:
//!       - key: alice-issuer
//!         secret: s3cr3t
//! ```
//!
//! The orphan plugins document is a flat list of plugin records.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::kong::{Jwt, KeyAuth, Plugin, Route};

/// A services document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServicesDocument {
    /// Gateway version the document was exported from; ignored on input.
    #[serde(
        rename = "_format_version",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub format_version: Option<String>,
    /// Tag marking every service the document owns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_group: Option<String>,
    /// Services.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub services: Option<Vec<ServiceEntry>>,
}

impl ServicesDocument {
    /// Returns the services, or nothing if the list is absent.
    #[must_use]
    pub fn services(&self) -> &[ServiceEntry] {
        self.services.as_deref().unwrap_or_default()
    }
}

/// One service with its routes and plugins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceEntry {
    /// Unique service name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Upstream URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Routes; when absent, the service's routes are left alone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routes: Option<Vec<Route>>,
    /// Plugins; when absent, the service's plugins are left alone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugins: Option<Vec<Plugin>>,
}

impl ServiceEntry {
    /// Service name (validated documents always have one).
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }

    /// Upstream URL (validated documents always have one).
    #[must_use]
    pub fn url(&self) -> &str {
        self.url.as_deref().unwrap_or_default()
    }
}

/// A consumers document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsumersDocument {
    /// Consumers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumers: Option<Vec<ConsumerEntry>>,
}

impl ConsumersDocument {
    /// Returns the consumers, or nothing if the list is absent.
    #[must_use]
    pub fn consumers(&self) -> &[ConsumerEntry] {
        self.consumers.as_deref().unwrap_or_default()
    }
}

/// One consumer with its credentials.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsumerEntry {
    /// Unique username.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Key-auth credentials; when absent, existing keys are left alone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyauth_credentials: Option<Vec<KeyAuth>>,
    /// JWT credentials; when absent, existing secrets are left alone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwt_secrets: Option<Vec<Jwt>>,
}

impl ConsumerEntry {
    /// Username (validated documents always have one).
    #[must_use]
    pub fn username(&self) -> &str {
        self.username.as_deref().unwrap_or_default()
    }
}

/// Kinds of desired-state documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DocumentKind {
    /// Services with routes and plugins.
    Services,
    /// Plugins attached to neither a service nor a route.
    Plugins,
    /// Consumers with credentials.
    Consumers,
}

impl DocumentKind {
    /// Classifies a single file by its name.
    #[must_use]
    pub fn classify(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if name.contains("consumers") {
            Self::Consumers
        } else if name.contains("plugins") {
            Self::Plugins
        } else {
            Self::Services
        }
    }

    /// Maps a directory name to the kind of documents it holds.
    #[must_use]
    pub fn from_directory(name: &str) -> Option<Self> {
        match name {
            "services" => Some(Self::Services),
            "plugins" => Some(Self::Plugins),
            "consumers" => Some(Self::Consumers),
            _ => None,
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Services => f.write_str("services"),
            Self::Plugins => f.write_str("plugins"),
            Self::Consumers => f.write_str("consumers"),
        }
    }
}

/// A parsed desired-state document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DesiredDocument {
    /// Services document.
    Services(ServicesDocument),
    /// Orphan plugins document.
    Plugins(Vec<Plugin>),
    /// Consumers document.
    Consumers(ConsumersDocument),
}

impl DesiredDocument {
    /// Returns the document kind.
    #[must_use]
    pub const fn kind(&self) -> DocumentKind {
        match self {
            Self::Services(_) => DocumentKind::Services,
            Self::Plugins(_) => DocumentKind::Plugins,
            Self::Consumers(_) => DocumentKind::Consumers,
        }
    }
}

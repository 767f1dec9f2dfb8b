//! Error types for kongctl.
//!
//! This module provides the error hierarchy for every layer of the tool:
//! configuration, the admin API transport, resource lookups, reconciliation
//! and export.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for kongctl.
#[derive(Debug, Error)]
pub enum KongctlError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Admin API transport errors.
    #[error("{0}")]
    Api(#[from] ApiError),

    /// Resource lookup or delete errors.
    #[error("{0}")]
    Resource(#[from] ResourceError),

    /// Reconciliation errors.
    #[error("Ensure error: {0}")]
    Ensure(#[from] EnsureError),

    /// Export errors.
    #[error("{0}")]
    Export(#[from] ExportError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file was not found.
    #[error("File not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// A context file or document could not be parsed.
    #[error("Failed to parse {}: {message}", location.as_deref().unwrap_or("input"))]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// A setting has an unusable value.
    #[error("Invalid setting {field}: {message}")]
    InvalidSetting {
        /// Name of the setting.
        field: String,
        /// Description of the problem.
        message: String,
    },
}

/// Admin API transport errors.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The gateway answered with a status outside the success set.
    #[error("Received {status} for {method} {path}: {body}")]
    Status {
        /// HTTP method of the request.
        method: String,
        /// Request path.
        path: String,
        /// HTTP status code.
        status: u16,
        /// Decoded response body (JSON text or raw text).
        body: String,
    },

    /// The request could not be sent or the connection failed.
    #[error("Network error talking to the admin API: {message}")]
    Network {
        /// Description of the network error.
        message: String,
    },

    /// The request timed out, including the single retry.
    #[error("Request {method} {path} timed out after {timeout_secs}s")]
    Timeout {
        /// HTTP method of the request.
        method: String,
        /// Request path.
        path: String,
        /// Timeout used for the last attempt.
        timeout_secs: u64,
    },

    /// The response body does not have the expected shape.
    #[error("Invalid response from the admin API: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },
}

/// Resource lookup and delete errors, carrying the request context.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// Fetching a resource failed.
    #[error("Get: {resource} - {identifier}; Error: {source}")]
    Get {
        /// Resource kind (service, route, ...).
        resource: &'static str,
        /// Identifier used in the request.
        identifier: String,
        /// Underlying transport error.
        #[source]
        source: ApiError,
    },

    /// Deleting a resource failed.
    #[error("Delete{}: {resource} - {identifier}; Error: {source}", if *recursive { " recursive" } else { "" })]
    Delete {
        /// Resource kind.
        resource: &'static str,
        /// Identifier used in the request.
        identifier: String,
        /// Whether this was part of a recursive delete.
        recursive: bool,
        /// Underlying transport error.
        #[source]
        source: ApiError,
    },

    /// The resource kind cannot be addressed with the given scope.
    #[error("Unsupported scope for {resource}: {scope}")]
    UnsupportedScope {
        /// Resource kind.
        resource: &'static str,
        /// Description of the scope.
        scope: String,
    },
}

/// Reconciliation errors.
#[derive(Debug, Error)]
pub enum EnsureError {
    /// A desired-state document lacks a required field or has a bad value.
    #[error("{field}: {message}")]
    MalformedDocument {
        /// Path of the offending field, e.g. `services[0].url`.
        field: String,
        /// Description of the problem.
        message: String,
    },

    /// A reference names a resource that does not exist in the gateway.
    #[error("Can't find such {resource} {name} (referenced by {referenced_by})")]
    MissingReference {
        /// Kind of the missing resource.
        resource: &'static str,
        /// Name that could not be resolved.
        name: String,
        /// Resource holding the reference.
        referenced_by: String,
    },

    /// The gateway returned a resource without an id.
    #[error("{resource} {name} has no id in the gateway response")]
    MissingId {
        /// Resource kind.
        resource: &'static str,
        /// Name of the resource.
        name: String,
    },
}

/// Export errors.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The service to export could not be fetched.
    #[error("Config method {source}")]
    ConfigGet {
        /// Lookup error.
        #[source]
        source: ResourceError,
    },

    /// A service requested for dumping does not exist.
    #[error("Service dump: {service} not found")]
    DumpServiceNotFound {
        /// Requested service name or id.
        service: String,
    },

    /// A snapshot source document lacks a required field.
    #[error("Field {field} not present in config file")]
    SnapshotMissingField {
        /// Name of the missing field.
        field: String,
    },

    /// An exported document could not be rendered.
    #[error("Failed to render {what}: {message}")]
    Render {
        /// What was being rendered.
        what: String,
        /// Serializer message.
        message: String,
    },
}

/// Result type alias for kongctl operations.
pub type Result<T> = std::result::Result<T, KongctlError>;

impl KongctlError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error is an HTTP 404 from the gateway.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        match self {
            Self::Api(err) => err.is_not_found(),
            Self::Resource(ResourceError::Get { source, .. }) => source.is_not_found(),
            _ => false,
        }
    }
}

impl ConfigError {
    /// Creates a parse error for the given location.
    #[must_use]
    pub fn parse(message: impl Into<String>, location: impl Into<String>) -> Self {
        Self::ParseError {
            message: message.into(),
            location: Some(location.into()),
        }
    }
}

impl ApiError {
    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Creates an invalid-response error.
    #[must_use]
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    /// Returns the HTTP status, if the gateway answered at all.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns true if the gateway answered 404.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }
}

impl EnsureError {
    /// Creates a malformed-document error for a field.
    #[must_use]
    pub fn malformed(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedDocument {
            field: field.into(),
            message: message.into(),
        }
    }
}

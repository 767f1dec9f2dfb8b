//! Kong admin API record types.
//!
//! Records type the fields the tool reads (identity and references) and carry
//! everything else in a flattened `extra` map, so canonical comparison still
//! sees attributes the tool never interprets.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use url::Url;

use super::resource::ResourceKind;

/// Suffix appended to synthetic route names that look like UUIDs.
pub const SYNTHETIC_ROUTE_SUFFIX: &str = "_route";

/// A gateway record of a known resource kind.
pub trait Record: Serialize + DeserializeOwned + Clone {
    /// Resource kind of the record.
    const KIND: ResourceKind;

    /// Gateway-assigned id, if known.
    fn id(&self) -> Option<&str>;

    /// Human-facing label: name, username or credential key.
    fn label(&self) -> Option<&str>;

    /// Serializes the record to a JSON value.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be encoded as JSON.
    fn to_value(&self) -> crate::error::Result<Value> {
        serde_json::to_value(self).map_err(|e| {
            crate::error::KongctlError::internal(format!("Failed to encode {}: {e}", Self::KIND.singular()))
        })
    }
}

/// A reference to another entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Referenced id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Referenced name (documents only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ForeignKey {
    /// Creates a reference by id.
    #[must_use]
    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            name: None,
        }
    }

    /// Creates a reference by name.
    #[must_use]
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: Some(name.into()),
        }
    }
}

/// A service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Service {
    /// Service id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Unique service name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Upstream protocol.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    /// Upstream host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Upstream port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Upstream path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Tags, including the service-group tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    /// Remaining attributes.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Service {
    /// Renders the upstream URL from protocol, host, port and path.
    #[must_use]
    pub fn url(&self) -> ServiceUrl {
        ServiceUrl::from_parts(
            self.protocol.as_deref().unwrap_or("http"),
            self.host.as_deref().unwrap_or_default(),
            self.port,
            self.path.as_deref(),
        )
    }

    /// Returns true if the service carries the tag.
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.as_ref().is_some_and(|tags| tags.iter().any(|t| t == tag))
    }
}

impl Record for Service {
    const KIND: ResourceKind = ResourceKind::Service;

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn label(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// A route.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Route {
    /// Route id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Route name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Owning service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<ForeignKey>,
    /// Remaining attributes (hosts, paths, methods, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Route {
    /// Returns the route name, or for an unnamed route a synthetic one
    /// built from its id (`<id>_route`).
    #[must_use]
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| synthetic_name(self.id.as_deref().unwrap_or_default()))
    }
}

impl Record for Route {
    const KIND: ResourceKind = ResourceKind::Route;

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn label(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// A plugin instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plugin {
    /// Plugin id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Plugin name (`rate-limiting`, `key-auth`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Service the plugin is attached to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<ForeignKey>,
    /// Route the plugin is attached to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<ForeignKey>,
    /// Consumer the plugin is scoped to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumer: Option<ForeignKey>,
    /// Flat service reference of pre-1.0 gateways.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_id: Option<String>,
    /// Flat route reference of pre-1.0 gateways.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_id: Option<String>,
    /// Remaining attributes (config, protocols, enabled, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Plugin {
    /// Returns the id of the route the plugin is attached to, in either shape.
    #[must_use]
    pub fn route_ref(&self) -> Option<&str> {
        self.route
            .as_ref()
            .and_then(|r| r.id.as_deref())
            .or(self.route_id.as_deref())
    }

    /// Returns the id of the service the plugin is attached to, in either shape.
    #[must_use]
    pub fn service_ref(&self) -> Option<&str> {
        self.service
            .as_ref()
            .and_then(|s| s.id.as_deref())
            .or(self.service_id.as_deref())
    }

    /// Returns the consumer reference (id, else username).
    #[must_use]
    pub fn consumer_ref(&self) -> Option<&str> {
        self.consumer
            .as_ref()
            .and_then(|c| c.id.as_deref().or(c.name.as_deref()))
    }

    /// Returns true if the plugin is attached to neither a service nor a route.
    #[must_use]
    pub fn is_orphan(&self) -> bool {
        self.service_ref().is_none() && self.route_ref().is_none()
    }

    /// Identity used to match desired and live plugins.
    #[must_use]
    pub fn identity(&self) -> PluginKey {
        PluginKey {
            name: self.name.clone().unwrap_or_default(),
            route: self.route_ref().map(ToString::to_string),
            consumer: self.consumer_ref().map(ToString::to_string),
        }
    }
}

impl Record for Plugin {
    const KIND: ResourceKind = ResourceKind::Plugin;

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn label(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// Plugin identity: name plus route and consumer references.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PluginKey {
    /// Plugin name.
    pub name: String,
    /// Route id, if route-scoped.
    pub route: Option<String>,
    /// Consumer id or username, if consumer-scoped.
    pub consumer: Option<String>,
}

impl fmt::Display for PluginKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some(route) = &self.route {
            write!(f, " (route {route})")?;
        }
        if let Some(consumer) = &self.consumer {
            write!(f, " (consumer {consumer})")?;
        }
        Ok(())
    }
}

/// A consumer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Consumer {
    /// Consumer id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Unique username.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Remaining attributes.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Record for Consumer {
    const KIND: ResourceKind = ResourceKind::Consumer;

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn label(&self) -> Option<&str> {
        self.username.as_deref()
    }
}

/// A key-auth credential.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyAuth {
    /// Credential id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// API key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Owning consumer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumer: Option<ForeignKey>,
    /// Remaining attributes.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Record for KeyAuth {
    const KIND: ResourceKind = ResourceKind::KeyAuth;

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn label(&self) -> Option<&str> {
        self.key.as_deref()
    }
}

/// A JWT credential.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Jwt {
    /// Credential id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Issuer key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Signing secret.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    /// Owning consumer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumer: Option<ForeignKey>,
    /// Remaining attributes (algorithm, rsa_public_key, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Record for Jwt {
    const KIND: ResourceKind = ResourceKind::Jwt;

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn label(&self) -> Option<&str> {
        self.key.as_deref()
    }
}

/// Canonical rendering of a service upstream URL.
///
/// `scheme://host:port` followed by the path; a missing path and `/` both
/// render as nothing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceUrl(String);

impl ServiceUrl {
    /// Parses a URL from a document, filling in the scheme's default port.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not an absolute URL.
    pub fn parse(raw: &str) -> Result<Self, url::ParseError> {
        let url = Url::parse(raw)?;
        Ok(Self::from_parts(
            url.scheme(),
            url.host_str().unwrap_or_default(),
            url.port_or_known_default(),
            Some(url.path()),
        ))
    }

    /// Builds the rendering from its parts.
    #[must_use]
    pub fn from_parts(protocol: &str, host: &str, port: Option<u16>, path: Option<&str>) -> Self {
        let mut rendered = format!("{protocol}://{host}");
        if let Some(port) = port {
            rendered.push(':');
            rendered.push_str(&port.to_string());
        }
        if let Some(path) = path.filter(|p| !p.is_empty() && *p != "/") {
            rendered.push_str(path);
        }
        Self(rendered)
    }

    /// Returns the rendered URL.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Appends the synthetic suffix to names that parse as UUIDs.
#[must_use]
pub fn synthetic_name(name: &str) -> String {
    if uuid::Uuid::parse_str(name).is_ok() {
        format!("{name}{SYNTHETIC_ROUTE_SUFFIX}")
    } else {
        name.to_string()
    }
}

/// Decodes a JSON value into a record type.
///
/// # Errors
///
/// Returns an error if the value does not have the record's shape.
pub fn decode<T: DeserializeOwned>(value: Value) -> Result<T, crate::error::ApiError> {
    serde_json::from_value(value)
        .map_err(|e| crate::error::ApiError::invalid_response(format!("Unexpected record shape: {e}")))
}

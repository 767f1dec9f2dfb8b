//! Resource client for Kong admin API collections.
//!
//! This module knows how each resource kind is addressed, follows `next`
//! cursors when listing, maps failures to errors carrying the identifier and
//! keeps the per-run identity cache.

use futures::{Stream, TryStreamExt};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use tracing::debug;

use crate::error::{ApiError, ResourceError, Result};

use super::transport::{ApiRequest, ResponseBody, Transport};
use super::types::decode;
use super::version::GatewayVersion;

/// The resource kinds the admin API exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    /// Services.
    Service,
    /// Routes.
    Route,
    /// Plugins.
    Plugin,
    /// Consumers.
    Consumer,
    /// Key-auth credentials.
    KeyAuth,
    /// JWT credentials.
    Jwt,
}

impl ResourceKind {
    /// Singular name used in messages.
    #[must_use]
    pub const fn singular(self) -> &'static str {
        match self {
            Self::Service => "service",
            Self::Route => "route",
            Self::Plugin => "plugin",
            Self::Consumer => "consumer",
            Self::KeyAuth => "key-auth",
            Self::Jwt => "jwt",
        }
    }

    /// Collection segment in admin API paths.
    #[must_use]
    pub const fn collection(self) -> &'static str {
        match self {
            Self::Service => "services",
            Self::Route => "routes",
            Self::Plugin => "plugins",
            Self::Consumer => "consumers",
            Self::KeyAuth => "key-auth",
            Self::Jwt => "jwt",
        }
    }

    /// Field holding the human-facing label, for kinds that have one.
    #[must_use]
    pub const fn label_field(self) -> Option<&'static str> {
        match self {
            Self::Service | Self::Route | Self::Plugin => Some("name"),
            Self::Consumer => Some("username"),
            Self::KeyAuth | Self::Jwt => None,
        }
    }

    /// Returns true for credential kinds nested under a consumer.
    #[must_use]
    pub const fn is_credential(self) -> bool {
        matches!(self, Self::KeyAuth | Self::Jwt)
    }

    fn unsupported(self, scope: &Scope) -> ResourceError {
        ResourceError::UnsupportedScope {
            resource: self.singular(),
            scope: scope.to_string(),
        }
    }

    /// Builds the collection path for listing and creating.
    ///
    /// # Errors
    ///
    /// Returns an error if the kind cannot be addressed in the scope.
    pub fn list_path(self, scope: &Scope) -> std::result::Result<String, ResourceError> {
        let path = match (self, scope) {
            (Self::Service, Scope::Tag(tag)) => format!("/services?tags={}", encode(tag)),
            (Self::Route | Self::Plugin, Scope::Service(service)) => {
                format!("/services/{}/{}", encode(service), self.collection())
            }
            (Self::Plugin, Scope::Route(route)) => format!("/routes/{}/plugins", encode(route)),
            (Self::KeyAuth | Self::Jwt, Scope::Consumer(consumer)) => {
                format!("/consumers/{}/{}", encode(consumer), self.collection())
            }
            (Self::Service | Self::Route | Self::Plugin | Self::Consumer, Scope::Global) => {
                format!("/{}", self.collection())
            }
            _ => return Err(self.unsupported(scope)),
        };
        Ok(path)
    }

    /// Builds the path of a single entity.
    ///
    /// Top-level kinds ignore the scope; credentials require a consumer scope.
    ///
    /// # Errors
    ///
    /// Returns an error if a credential is addressed without a consumer.
    pub fn item_path(self, scope: &Scope, id: &str) -> std::result::Result<String, ResourceError> {
        if self.is_credential() {
            let Scope::Consumer(consumer) = scope else {
                return Err(self.unsupported(scope));
            };
            return Ok(format!(
                "/consumers/{}/{}/{}",
                encode(consumer),
                self.collection(),
                encode(id)
            ));
        }
        Ok(format!("/{}/{}", self.collection(), encode(id)))
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.singular())
    }
}

/// Narrows a listing to a parent entity or a tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// The whole collection.
    Global,
    /// Entities under a service (name or id).
    Service(String),
    /// Entities under a route (name or id).
    Route(String),
    /// Credentials of a consumer (username or id).
    Consumer(String),
    /// Services carrying a tag.
    Tag(String),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str("global"),
            Self::Service(s) => write!(f, "service {s}"),
            Self::Route(r) => write!(f, "route {r}"),
            Self::Consumer(c) => write!(f, "consumer {c}"),
            Self::Tag(t) => write!(f, "tag {t}"),
        }
    }
}

fn encode(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

/// One page of a listing.
#[derive(Debug)]
struct Page {
    data: Vec<Value>,
    next: Option<String>,
}

/// Executes admin API calls for every resource collection.
pub struct ResourceClient {
    /// Underlying transport.
    transport: Box<dyn Transport>,
    /// Identity cache, (kind, id) to record. Never held across an await.
    cache: Mutex<HashMap<(ResourceKind, String), Value>>,
}

impl fmt::Debug for ResourceClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceClient").finish_non_exhaustive()
    }
}

impl ResourceClient {
    /// Creates a resource client on top of a transport.
    #[must_use]
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Sends a request and checks the status against the success set.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-success status.
    pub async fn execute(&self, request: ApiRequest) -> std::result::Result<ResponseBody, ApiError> {
        let response = self.transport.send(request.clone()).await?;
        response.check(&request)
    }

    /// Fetches the gateway version from the admin API root.
    ///
    /// # Errors
    ///
    /// Returns an error if the root document cannot be fetched or has no version.
    pub async fn gateway_version(&self) -> Result<GatewayVersion> {
        let root = self.execute(ApiRequest::get("/")).await?.into_json();
        let version = GatewayVersion::from_root(&root)?;
        debug!("Gateway version: {version}");
        Ok(version)
    }

    /// Lazily walks the pages of a listing, following `next` until absent.
    ///
    /// Each call starts a fresh walk from the first page.
    ///
    /// # Errors
    ///
    /// Returns an error if the kind cannot be listed in the scope; the
    /// stream itself yields transport errors.
    pub fn pages(
        &self,
        kind: ResourceKind,
        scope: &Scope,
    ) -> std::result::Result<impl Stream<Item = std::result::Result<Vec<Value>, ApiError>> + '_, ResourceError>
    {
        let first = kind.list_path(scope)?;
        Ok(futures::stream::try_unfold(
            Some(first),
            move |next: Option<String>| async move {
                match next {
                    None => Ok(None),
                    Some(path) => self
                        .fetch_page(kind, &path)
                        .await
                        .map(|page| Some((page.data, page.next))),
                }
            },
        ))
    }

    async fn fetch_page(&self, kind: ResourceKind, path: &str) -> std::result::Result<Page, ApiError> {
        let body = self.execute(ApiRequest::get(path)).await?.into_json();

        let data = match body.get("data") {
            Some(Value::Array(items)) => items.clone(),
            _ => {
                return Err(ApiError::invalid_response(format!(
                    "Listing {path} returned no data array"
                )));
            }
        };
        let next = body
            .get("next")
            .and_then(Value::as_str)
            .filter(|n| !n.is_empty())
            .map(ToString::to_string);

        if let Some(field) = kind.label_field() {
            for item in &data {
                if item.get(field).is_some() {
                    self.remember(kind, item);
                }
            }
        }

        Ok(Page { data, next })
    }

    /// Lists every entity of a kind in a scope.
    ///
    /// # Errors
    ///
    /// Returns an error if any page cannot be fetched or decoded.
    pub async fn list<T: DeserializeOwned>(&self, kind: ResourceKind, scope: &Scope) -> Result<Vec<T>> {
        let values: Vec<Value> = self.pages(kind, scope)?.try_concat().await?;
        debug!("Listed {} {} ({scope})", values.len(), kind.collection());

        let mut records = Vec::with_capacity(values.len());
        for value in values {
            records.push(decode(value)?);
        }
        Ok(records)
    }

    /// Fetches one entity by id or name.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::Get`] carrying the identifier on failure.
    pub async fn get<T: DeserializeOwned>(
        &self,
        kind: ResourceKind,
        scope: &Scope,
        id_or_name: &str,
    ) -> Result<T> {
        let path = kind.item_path(scope, id_or_name)?;
        let value = self
            .execute(ApiRequest::get(path))
            .await
            .map_err(|source| ResourceError::Get {
                resource: kind.singular(),
                identifier: id_or_name.to_string(),
                source,
            })?
            .into_json();

        self.remember(kind, &value);
        Ok(decode(value)?)
    }

    /// Fetches one entity by id, consulting the identity cache first.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not cached and cannot be fetched.
    pub async fn get_by_id<T: DeserializeOwned>(&self, kind: ResourceKind, id: &str) -> Result<T> {
        if let Some(cached) = self.cached(kind, id) {
            return Ok(decode(cached)?);
        }
        self.get(kind, &Scope::Global, id).await
    }

    /// Creates an entity with POST on the collection path.
    ///
    /// # Errors
    ///
    /// Returns an error if the gateway rejects the entity.
    pub async fn create<T: DeserializeOwned>(
        &self,
        kind: ResourceKind,
        scope: &Scope,
        body: Value,
    ) -> Result<T> {
        let path = kind.list_path(scope)?;
        debug!("Creating {kind} ({scope})");
        let value = self.execute(ApiRequest::post(path, body)).await?.into_json();
        self.remember(kind, &value);
        Ok(decode(value)?)
    }

    /// Partially updates an entity with PATCH.
    ///
    /// # Errors
    ///
    /// Returns an error if the gateway rejects the update.
    pub async fn update<T: DeserializeOwned>(
        &self,
        kind: ResourceKind,
        scope: &Scope,
        id: &str,
        body: Value,
    ) -> Result<T> {
        let path = kind.item_path(scope, id)?;
        debug!("Updating {kind} {id}");
        let value = self.execute(ApiRequest::patch(path, body)).await?.into_json();
        self.remember(kind, &value);
        Ok(decode(value)?)
    }

    /// Creates or replaces an entity with PUT.
    ///
    /// # Errors
    ///
    /// Returns an error if the gateway rejects the entity.
    pub async fn upsert<T: DeserializeOwned>(
        &self,
        kind: ResourceKind,
        scope: &Scope,
        id_or_name: &str,
        body: Value,
    ) -> Result<T> {
        let path = kind.item_path(scope, id_or_name)?;
        debug!("Upserting {kind} {id_or_name}");
        let value = self.execute(ApiRequest::put(path, body)).await?.into_json();
        self.remember(kind, &value);
        Ok(decode(value)?)
    }

    /// Deletes an entity.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::Delete`] carrying the identifier on failure.
    pub async fn delete(&self, kind: ResourceKind, scope: &Scope, id: &str) -> Result<()> {
        self.delete_inner(kind, scope, id, false).await
    }

    async fn delete_inner(
        &self,
        kind: ResourceKind,
        scope: &Scope,
        id: &str,
        recursive: bool,
    ) -> Result<()> {
        let path = kind.item_path(scope, id)?;
        self.execute(ApiRequest::delete(path))
            .await
            .map_err(|source| ResourceError::Delete {
                resource: kind.singular(),
                identifier: id.to_string(),
                recursive,
                source,
            })?;

        self.forget(kind, id);
        debug!("Deleted {kind} {id}");
        Ok(())
    }

    /// Deletes a service together with its plugins and routes.
    ///
    /// Plugins go first, then routes, then the service itself.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::Delete`] (recursive) for the first failure.
    pub async fn delete_service_recursive(&self, service: &str) -> Result<()> {
        let scope = Scope::Service(service.to_string());

        let plugins: Vec<Value> = self.list(ResourceKind::Plugin, &scope).await?;
        for plugin in &plugins {
            if let Some(id) = plugin.get("id").and_then(Value::as_str) {
                self.delete_inner(ResourceKind::Plugin, &Scope::Global, id, true).await?;
            }
        }

        let routes: Vec<Value> = self.list(ResourceKind::Route, &scope).await?;
        for route in &routes {
            if let Some(id) = route.get("id").and_then(Value::as_str) {
                self.delete_inner(ResourceKind::Route, &Scope::Global, id, true).await?;
            }
        }

        self.delete_inner(ResourceKind::Service, &Scope::Global, service, true)
            .await
    }

    /// Lists the plugin names enabled on the gateway.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing fails or has an unexpected shape.
    pub async fn enabled_plugins(&self) -> Result<Vec<String>> {
        let body = self
            .execute(ApiRequest::get("/plugins/enabled"))
            .await?
            .into_json();
        let names = body
            .get("enabled_plugins")
            .and_then(Value::as_array)
            .ok_or_else(|| ApiError::invalid_response("No enabled_plugins in response"))?
            .iter()
            .filter_map(Value::as_str)
            .map(ToString::to_string)
            .collect();
        Ok(names)
    }

    /// Fetches the configuration schema of a plugin.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::Get`] if the schema cannot be fetched.
    pub async fn plugin_schema(&self, name: &str) -> Result<Value> {
        let path = format!("/plugins/schema/{}", encode(name));
        let body = self
            .execute(ApiRequest::get(path))
            .await
            .map_err(|source| ResourceError::Get {
                resource: "plugin schema",
                identifier: name.to_string(),
                source,
            })?;
        Ok(body.into_json())
    }

    fn remember(&self, kind: ResourceKind, value: &Value) {
        let Some(id) = value.get("id").and_then(Value::as_str) else {
            return;
        };
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert((kind, id.to_string()), value.clone());
        }
    }

    fn forget(&self, kind: ResourceKind, id: &str) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.remove(&(kind, id.to_string()));
        }
    }

    fn cached(&self, kind: ResourceKind, id: &str) -> Option<Value> {
        self.cache
            .lock()
            .ok()
            .and_then(|cache| cache.get(&(kind, id.to_string())).cloned())
    }
}

//! Export of live gateway state as desired-state documents.
//!
//! Exports are deterministic and stripped of every generated attribute, so
//! ensuring an exported document against the gateway it came from changes
//! nothing. Routes are sorted by name and plugins by name, then route name.

use serde::Serialize;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use crate::config::{ConsumerEntry, ConsumersDocument, ServiceEntry, ServicesDocument};
use crate::error::{ExportError, KongctlError, Result};
use crate::kong::{
    Consumer, ForeignKey, GatewayVersion, Jwt, KeyAuth, Plugin, Record, ResourceClient, ResourceKind,
    Route, Scope, Service, decode,
};
use crate::planner::normalize;

/// Directory, under the output root, that dumps are written to.
pub const DUMP_DIR: &str = "config";

/// Default plugin `run_on` on gateways that still carry the attribute.
const DEFAULT_RUN_ON: &str = "first";

/// Renders a document as YAML.
///
/// # Errors
///
/// Returns an error if the value cannot be represented as YAML.
pub fn render_yaml<T: Serialize>(value: &T, what: &str) -> Result<String> {
    serde_yaml::to_string(value).map_err(|e| {
        ExportError::Render {
            what: what.to_string(),
            message: e.to_string(),
        }
        .into()
    })
}

async fn write_yaml<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = render_yaml(value, &path.display().to_string())?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, content).await?;
    info!("Wrote {}", path.display());
    Ok(())
}

/// Sort key of an exported plugin: its name, then its route name.
fn plugin_sort_key(plugin: &Plugin) -> String {
    let route = plugin
        .route
        .as_ref()
        .and_then(|r| r.name.as_deref())
        .unwrap_or_default();
    format!("{}-{route}", plugin.name.as_deref().unwrap_or_default())
}

/// Reads live gateway state back into desired-state documents.
pub struct Exporter<'a> {
    client: &'a ResourceClient,
    version: &'a GatewayVersion,
}

impl<'a> Exporter<'a> {
    /// Creates a new exporter.
    #[must_use]
    pub const fn new(client: &'a ResourceClient, version: &'a GatewayVersion) -> Self {
        Self { client, version }
    }

    fn services_document(&self, service_group: Option<String>, services: Vec<ServiceEntry>) -> ServicesDocument {
        ServicesDocument {
            format_version: Some(self.version.to_string()),
            service_group,
            services: Some(services),
        }
    }

    /// Exports one service with its routes and plugins.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::ConfigGet`] if the service cannot be fetched,
    /// or any error raised while listing its routes and plugins.
    pub async fn export_service(&self, name_or_id: &str) -> Result<ServicesDocument> {
        let entry = self.service_entry(name_or_id).await?;
        Ok(self.services_document(None, vec![entry]))
    }

    /// Exports every service tagged with the group.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing or any service export fails.
    pub async fn export_service_group(&self, group: &str) -> Result<ServicesDocument> {
        let services: Vec<Service> = self
            .client
            .list(ResourceKind::Service, &Scope::Tag(group.to_string()))
            .await?;
        info!("Exporting {} service(s) of group {group}", services.len());

        let mut entries = Vec::with_capacity(services.len());
        for service in &services {
            let key = service.label().or_else(|| service.id()).unwrap_or_default();
            entries.push(self.service_entry(key).await?);
        }
        Ok(self.services_document(Some(group.to_string()), entries))
    }

    async fn service_entry(&self, name_or_id: &str) -> Result<ServiceEntry> {
        let service: Service = match self
            .client
            .get(ResourceKind::Service, &Scope::Global, name_or_id)
            .await
        {
            Ok(service) => service,
            Err(KongctlError::Resource(source)) => return Err(ExportError::ConfigGet { source }.into()),
            Err(e) => return Err(e),
        };

        let name = service.name.clone().unwrap_or_else(|| name_or_id.to_string());
        info!("Config service: {name}");
        let scope = Scope::Service(service.id.clone().unwrap_or_else(|| name.clone()));

        let routes = self.export_routes(&scope).await?;
        let live_plugins: Vec<Plugin> = self.client.list(ResourceKind::Plugin, &scope).await?;
        let mut plugins = Vec::with_capacity(live_plugins.len());
        for plugin in &live_plugins {
            plugins.push(self.export_plugin(plugin).await?);
        }
        plugins.sort_by_cached_key(plugin_sort_key);

        Ok(ServiceEntry {
            name: Some(name),
            url: Some(service.url().to_string()),
            routes: Some(routes),
            plugins: Some(plugins),
        })
    }

    async fn export_routes(&self, scope: &Scope) -> Result<Vec<Route>> {
        let live: Vec<Route> = self.client.list(ResourceKind::Route, scope).await?;
        let mut routes = Vec::with_capacity(live.len());
        for route in &live {
            let mut named = route.clone();
            named.name = Some(route.display_name());
            debug!("Route: {}", route.display_name());
            routes.push(decode::<Route>(normalize(&named))?);
        }
        routes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(routes)
    }

    /// Normalizes a service plugin and points its route reference at the
    /// route name.
    async fn export_plugin(&self, plugin: &Plugin) -> Result<Plugin> {
        let mut exported: Plugin = decode(normalize(plugin))?;

        exported.route = match plugin.route_ref() {
            Some(route_id) => {
                let route: Route = self.client.get_by_id(ResourceKind::Route, route_id).await?;
                Some(ForeignKey::by_name(route.display_name()))
            }
            None => None,
        };
        exported.route_id = None;

        exported
            .extra
            .entry("protocols")
            .or_insert(Value::Null);
        exported
            .extra
            .entry("config")
            .or_insert_with(|| json!({}));
        if self.version.has_run_on() {
            exported
                .extra
                .entry("run_on")
                .or_insert_with(|| json!(DEFAULT_RUN_ON));
        }

        debug!("Plugin: {}", plugin_sort_key(&exported));
        Ok(exported)
    }

    /// Exports consumers with their credentials, optionally only the one
    /// with the given username.
    ///
    /// # Errors
    ///
    /// Returns an error if a listing fails.
    pub async fn export_consumers(&self, username: Option<&str>) -> Result<ConsumersDocument> {
        info!("Processing consumers");
        let live: Vec<Consumer> = self.client.list(ResourceKind::Consumer, &Scope::Global).await?;

        let mut consumers = Vec::new();
        for consumer in live
            .iter()
            .filter(|c| username.is_none_or(|wanted| c.username.as_deref() == Some(wanted)))
        {
            let owner = consumer.label().or_else(|| consumer.id()).unwrap_or_default();
            info!("Consumer: {owner}");
            let scope = Scope::Consumer(owner.to_string());

            let keys: Vec<KeyAuth> = self.client.list(ResourceKind::KeyAuth, &scope).await?;
            let keys = keys
                .into_iter()
                .map(|k| KeyAuth {
                    key: k.key,
                    ..KeyAuth::default()
                })
                .collect();

            let live_secrets: Vec<Jwt> = self.client.list(ResourceKind::Jwt, &scope).await?;
            let mut secrets = Vec::with_capacity(live_secrets.len());
            for secret in &live_secrets {
                debug!("jwt: key - {}", secret.key.as_deref().unwrap_or_default());
                secrets.push(decode::<Jwt>(normalize(secret))?);
            }

            consumers.push(ConsumerEntry {
                username: consumer.username.clone(),
                keyauth_credentials: Some(keys),
                jwt_secrets: (!secrets.is_empty()).then_some(secrets),
            });
        }

        Ok(ConsumersDocument {
            consumers: Some(consumers),
        })
    }

    /// Exports plugins attached to neither a service nor a route.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing fails.
    pub async fn export_orphan_plugins(&self) -> Result<Vec<Plugin>> {
        info!("Processing plugins");
        let live: Vec<Plugin> = self.client.list(ResourceKind::Plugin, &Scope::Global).await?;

        let mut plugins = Vec::new();
        for plugin in live.iter().filter(|p| p.is_orphan()) {
            debug!("Plugin: {}", plugin.name.as_deref().unwrap_or_default());
            plugins.push(decode::<Plugin>(normalize(plugin))?);
        }
        plugins.sort_by_cached_key(plugin_sort_key);
        Ok(plugins)
    }

    /// Exports the current state of every service a source document names.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::SnapshotMissingField`] if the source has no
    /// `services` list or an entry without a name.
    pub async fn snapshot(&self, source: &ServicesDocument) -> Result<ServicesDocument> {
        let Some(entries) = &source.services else {
            return Err(ExportError::SnapshotMissingField {
                field: String::from("services"),
            }
            .into());
        };

        let mut services = Vec::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            let Some(name) = entry.name.as_deref() else {
                return Err(ExportError::SnapshotMissingField {
                    field: format!("services[{i}].name"),
                }
                .into());
            };
            services.push(self.service_entry(name).await?);
        }
        Ok(self.services_document(source.service_group.clone(), services))
    }

    /// Writes one services document per service under
    /// `<out_dir>/config/services/`.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::DumpServiceNotFound`] if a requested service
    /// does not exist, or an IO error if a file cannot be written.
    pub async fn dump_services(&self, out_dir: &Path, service: Option<&str>) -> Result<Vec<PathBuf>> {
        let live: Vec<Service> = self.client.list(ResourceKind::Service, &Scope::Global).await?;
        let selected: Vec<&Service> = live
            .iter()
            .filter(|s| service.is_none_or(|wanted| s.label() == Some(wanted) || s.id() == Some(wanted)))
            .collect();
        if let Some(wanted) = service
            && selected.is_empty()
        {
            return Err(ExportError::DumpServiceNotFound {
                service: wanted.to_string(),
            }
            .into());
        }

        let dir = out_dir.join(DUMP_DIR).join("services");
        let mut written = Vec::with_capacity(selected.len());
        for service in selected {
            let name = service.label().or_else(|| service.id()).unwrap_or_default();
            info!("Processing: {name}");
            let document = self.export_service(name).await?;
            let path = dir.join(format!("{name}.yml"));
            write_yaml(&path, &document).await?;
            written.push(path);
        }
        Ok(written)
    }

    /// Writes the consumers document to
    /// `<out_dir>/config/consumers/<username|consumers>.yml`.
    ///
    /// # Errors
    ///
    /// Returns an error if the export or the write fails.
    pub async fn dump_consumers(&self, out_dir: &Path, username: Option<&str>) -> Result<PathBuf> {
        let document = self.export_consumers(username).await?;
        let file_name = format!("{}.yml", username.unwrap_or("consumers"));
        let path = out_dir.join(DUMP_DIR).join("consumers").join(file_name);
        write_yaml(&path, &document).await?;
        Ok(path)
    }

    /// Writes the orphan plugins to `<out_dir>/config/plugins/plugins.yml`,
    /// unless there are none.
    ///
    /// # Errors
    ///
    /// Returns an error if the export or the write fails.
    pub async fn dump_plugins(&self, out_dir: &Path) -> Result<Option<PathBuf>> {
        let plugins = self.export_orphan_plugins().await?;
        if plugins.is_empty() {
            info!("No orphan plugins to dump");
            return Ok(None);
        }
        let path = out_dir.join(DUMP_DIR).join("plugins").join("plugins.yml");
        write_yaml(&path, &plugins).await?;
        Ok(Some(path))
    }
}

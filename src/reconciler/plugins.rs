//! Plugins attached to neither a service nor a route, and the plugin
//! reference handling shared with service plugins.

use tracing::debug;

use crate::error::{EnsureError, Result};
use crate::kong::{Consumer, ForeignKey, Plugin, Record, ResourceKind, Scope};
use crate::planner::{Action, canonical, three_way};

use super::{ChangeKind, Reconciler, Tally, require_id};

impl Reconciler<'_> {
    /// Converges the orphan plugins document.
    pub(super) async fn ensure_orphan_plugins(&self, plugins: &[Plugin], tally: &mut Tally) -> Result<()> {
        let mut desired = Vec::with_capacity(plugins.len());
        for plugin in plugins {
            let mut resolved = plugin.clone();
            let referenced_by = format!("plugin {}", plugin.name.as_deref().unwrap_or_default());
            self.resolve_consumer(&mut resolved, &referenced_by).await?;
            desired.push(resolved);
        }

        let live: Vec<Plugin> = self
            .client
            .list::<Plugin>(ResourceKind::Plugin, &Scope::Global)
            .await?
            .into_iter()
            .filter(Plugin::is_orphan)
            .collect();
        debug!("Found {} orphan plugin(s)", live.len());

        let diff = three_way(
            &desired,
            &live,
            Plugin::identity,
            Plugin::identity,
            |desired, live| canonical(desired) == canonical(live),
        );

        for plugin in diff.deletes {
            self.client
                .delete(ResourceKind::Plugin, &Scope::Global, require_id(plugin)?)
                .await?;
            tally.record(ChangeKind::Deleted, ResourceKind::Plugin, plugin.identity().to_string());
        }

        for action in diff.actions {
            match action {
                Action::Unchanged { desired, .. } => {
                    tally.unchanged(ResourceKind::Plugin, &desired.identity().to_string());
                }
                Action::Update { desired, live } => {
                    let mut body = desired.clone();
                    body.id = None;
                    let _: Plugin = self
                        .client
                        .update(ResourceKind::Plugin, &Scope::Global, require_id(live)?, body.to_value()?)
                        .await?;
                    tally.record(ChangeKind::Updated, ResourceKind::Plugin, desired.identity().to_string());
                }
                Action::Create(desired) => {
                    let _: Plugin = match desired.id.as_deref() {
                        Some(id) => {
                            self.client
                                .upsert(ResourceKind::Plugin, &Scope::Global, id, desired.to_value()?)
                                .await?
                        }
                        None => {
                            self.client
                                .create(ResourceKind::Plugin, &Scope::Global, desired.to_value()?)
                                .await?
                        }
                    };
                    tally.record(ChangeKind::Created, ResourceKind::Plugin, desired.identity().to_string());
                }
            }
        }
        Ok(())
    }

    /// Replaces a `consumer: {name}` reference with the consumer's id.
    pub(super) async fn resolve_consumer(&self, plugin: &mut Plugin, referenced_by: &str) -> Result<()> {
        let Some(reference) = &plugin.consumer else {
            return Ok(());
        };
        if reference.id.is_some() {
            return Ok(());
        }
        let Some(username) = reference.name.clone() else {
            return Ok(());
        };

        let consumer = match self
            .client
            .get::<Consumer>(ResourceKind::Consumer, &Scope::Global, &username)
            .await
        {
            Ok(consumer) => consumer,
            Err(e) if e.is_not_found() => {
                return Err(EnsureError::MissingReference {
                    resource: "consumer",
                    name: username,
                    referenced_by: referenced_by.to_string(),
                }
                .into());
            }
            Err(e) => return Err(e),
        };
        plugin.consumer = Some(ForeignKey::by_id(require_id(&consumer)?));
        Ok(())
    }

    /// Moves a nested route reference into the flat `route_id` field on
    /// gateways that predate nested references.
    pub(super) fn with_reference_shape(&self, mut plugin: Plugin) -> Plugin {
        if self.version.uses_flat_references()
            && let Some(route) = plugin.route.take()
        {
            plugin.route_id = route.id;
        }
        plugin
    }
}

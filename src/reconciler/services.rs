//! Services, their routes and their plugins.

use serde_json::json;
use std::collections::HashSet;
use tracing::{debug, info};

use crate::config::{ServiceEntry, ServicesDocument};
use crate::error::{EnsureError, Result};
use crate::kong::{ForeignKey, Plugin, Record, ResourceKind, Route, Scope, Service, ServiceUrl};
use crate::planner::{Action, canonical, three_way};

use super::{ChangeKind, Reconciler, Tally, require_id};

impl Reconciler<'_> {
    /// Converges every service of a services document.
    pub(super) async fn ensure_services(&self, doc: &ServicesDocument, tally: &mut Tally) -> Result<()> {
        let group = doc.service_group.as_deref();
        if let Some(group) = group {
            self.prune_service_group(group, doc.services(), tally).await?;
        }

        for entry in doc.services() {
            info!("Processing service: {}", entry.name());
            let service_id = self.ensure_service(entry, group, tally).await?;

            if let Some(routes) = &entry.routes {
                self.ensure_routes(&service_id, routes, tally).await?;
            }
            if let Some(plugins) = &entry.plugins {
                self.ensure_service_plugins(entry.name(), &service_id, plugins, tally)
                    .await?;
            }
        }
        Ok(())
    }

    /// Deletes, recursively, every service tagged with the group that the
    /// document no longer lists.
    async fn prune_service_group(&self, group: &str, entries: &[ServiceEntry], tally: &mut Tally) -> Result<()> {
        let wanted: HashSet<&str> = entries.iter().map(ServiceEntry::name).collect();
        let live: Vec<Service> = self
            .client
            .list(ResourceKind::Service, &Scope::Tag(group.to_string()))
            .await?;

        for service in &live {
            let name = service.name.as_deref().unwrap_or_default();
            if wanted.contains(name) {
                continue;
            }
            info!("Recursive delete service {name} from service_group {group}");
            self.client.delete_service_recursive(require_id(service)?).await?;
            tally.record(ChangeKind::Deleted, ResourceKind::Service, name);
        }
        Ok(())
    }

    /// Creates the service, or patches its URL and group tag when they
    /// differ. Returns the service id.
    async fn ensure_service(&self, entry: &ServiceEntry, group: Option<&str>, tally: &mut Tally) -> Result<String> {
        let name = entry.name();
        let desired_url = ServiceUrl::parse(entry.url())
            .map_err(|e| EnsureError::malformed(format!("service {name}.url"), e.to_string()))?;

        let live = match self
            .client
            .get::<Service>(ResourceKind::Service, &Scope::Global, name)
            .await
        {
            Ok(live) => live,
            Err(e) if e.is_not_found() => {
                let mut body = json!({"name": name, "url": entry.url()});
                if let Some(group) = group {
                    body["tags"] = json!([group]);
                }
                let created: Service = self
                    .client
                    .create(ResourceKind::Service, &Scope::Global, body)
                    .await?;
                tally.record(ChangeKind::Created, ResourceKind::Service, name);
                return Ok(require_id(&created)?.to_string());
            }
            Err(e) => return Err(e),
        };

        let id = require_id(&live)?.to_string();
        let missing_tag = group.is_some_and(|g| !live.has_tag(g));
        if live.url() == desired_url && !missing_tag {
            tally.unchanged(ResourceKind::Service, name);
            return Ok(id);
        }

        debug!("Service {name}: live url {} desired {desired_url}", live.url());
        let mut body = json!({"url": entry.url()});
        if let Some(group) = group {
            let mut tags = live.tags.clone().unwrap_or_default();
            if !tags.iter().any(|t| t == group) {
                tags.push(group.to_string());
            }
            body["tags"] = json!(tags);
        }
        let _: Service = self
            .client
            .update(ResourceKind::Service, &Scope::Global, &id, body)
            .await?;
        tally.record(ChangeKind::Updated, ResourceKind::Service, name);
        Ok(id)
    }

    /// Converges the routes of one service. Routes are keyed by name; live
    /// unnamed routes are keyed by their synthetic name.
    async fn ensure_routes(&self, service_id: &str, routes: &[Route], tally: &mut Tally) -> Result<()> {
        let live: Vec<Route> = self
            .client
            .list(ResourceKind::Route, &Scope::Service(service_id.to_string()))
            .await?;

        let diff = three_way(
            routes,
            &live,
            |desired| desired.name.clone().unwrap_or_default(),
            Route::display_name,
            |desired, live| canonical(desired) == canonical(live),
        );

        for route in diff.deletes {
            self.client
                .delete(ResourceKind::Route, &Scope::Global, require_id(route)?)
                .await?;
            tally.record(ChangeKind::Deleted, ResourceKind::Route, route.display_name());
        }

        for action in diff.actions {
            match action {
                Action::Unchanged { desired, .. } => {
                    tally.unchanged(ResourceKind::Route, desired.name.as_deref().unwrap_or_default());
                }
                Action::Update { desired, live } => {
                    // unnamed live routes can only be addressed by id
                    let target = live.name.as_deref().map_or_else(|| require_id(live), Ok)?;
                    self.put_route(desired, service_id, target).await?;
                    tally.record(ChangeKind::Updated, ResourceKind::Route, live.display_name());
                }
                Action::Create(desired) => {
                    let name = desired.name.as_deref().unwrap_or_default();
                    self.put_route(desired, service_id, name).await?;
                    tally.record(ChangeKind::Created, ResourceKind::Route, name);
                }
            }
        }
        Ok(())
    }

    async fn put_route(&self, desired: &Route, service_id: &str, target: &str) -> Result<()> {
        let mut route = desired.clone();
        route.id = None;
        route.service = Some(ForeignKey::by_id(service_id));
        let _: Route = self
            .client
            .upsert(ResourceKind::Route, &Scope::Global, target, route.to_value()?)
            .await?;
        Ok(())
    }

    /// Converges the plugins of one service, after its routes.
    async fn ensure_service_plugins(
        &self,
        service_name: &str,
        service_id: &str,
        plugins: &[Plugin],
        tally: &mut Tally,
    ) -> Result<()> {
        let scope = Scope::Service(service_id.to_string());

        let routes: Vec<Route> = if plugins.iter().any(|p| p.route.as_ref().is_some_and(|r| r.id.is_none())) {
            self.client.list(ResourceKind::Route, &scope).await?
        } else {
            Vec::new()
        };

        let mut desired = Vec::with_capacity(plugins.len());
        for plugin in plugins {
            let referenced_by = format!(
                "plugin {} of service {service_name}",
                plugin.name.as_deref().unwrap_or_default()
            );
            let mut resolved = Self::resolve_route(plugin, &routes, &referenced_by)?;
            self.resolve_consumer(&mut resolved, &referenced_by).await?;
            resolved.id = None;
            resolved.service = None;
            desired.push(self.with_reference_shape(resolved));
        }

        let live: Vec<Plugin> = self.client.list(ResourceKind::Plugin, &scope).await?;
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
                    let _: Plugin = self
                        .client
                        .update(ResourceKind::Plugin, &Scope::Global, require_id(live)?, desired.to_value()?)
                        .await?;
                    tally.record(ChangeKind::Updated, ResourceKind::Plugin, desired.identity().to_string());
                }
                Action::Create(desired) => {
                    let _: Plugin = self
                        .client
                        .create(ResourceKind::Plugin, &scope, desired.to_value()?)
                        .await?;
                    tally.record(ChangeKind::Created, ResourceKind::Plugin, desired.identity().to_string());
                }
            }
        }
        Ok(())
    }

    /// Replaces a `route: {name}` reference with the id of the converged
    /// route of that name.
    fn resolve_route(plugin: &Plugin, routes: &[Route], referenced_by: &str) -> Result<Plugin> {
        let mut resolved = plugin.clone();
        let Some(reference) = &plugin.route else {
            return Ok(resolved);
        };
        if reference.id.is_some() {
            resolved.route = Some(ForeignKey {
                id: reference.id.clone(),
                name: None,
            });
            return Ok(resolved);
        }

        let name = reference.name.as_deref().unwrap_or_default();
        let route = routes
            .iter()
            .find(|r| r.name.as_deref() == Some(name) || r.display_name() == name)
            .ok_or_else(|| EnsureError::MissingReference {
                resource: "route",
                name: name.to_string(),
                referenced_by: referenced_by.to_string(),
            })?;
        resolved.route = Some(ForeignKey::by_id(require_id(route)?));
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kong::fake::FakeGateway;
    use crate::kong::{GatewayVersion, Method};
    use crate::reconciler::tests::services_doc;

    fn version() -> GatewayVersion {
        GatewayVersion::parse("2.8.1")
    }

    #[tokio::test]
    async fn test_empty_gateway_creates_service_then_route() {
        let gateway = FakeGateway::new();
        let client = gateway.client();
        let version = version();
        let doc = services_doc("services:\n  - name: s1\n    url: http://s1.local\n    routes:\n      - name: r1\n");

        Reconciler::new(&client, &version).reconcile(&doc).await.unwrap();

        assert_eq!(gateway.mutations(), vec!["POST /services", "PUT /routes/r1"]);
        let sid = gateway.services()[0]["id"].clone();
        assert_eq!(gateway.routes()[0]["service"]["id"], sid);
        assert!(gateway.calls().iter().all(|c| !c.path.contains("plugins")));
    }

    #[tokio::test]
    async fn test_parents_are_created_before_children() {
        let gateway = FakeGateway::new();
        let client = gateway.client();
        let version = version();
        let doc = services_doc(
            "services:\n  - name: s1\n    url: http://s1.local\n    routes:\n      - name: r1\n    plugins:\n      - name: rate-limiting\n        route: {name: r1}\n        config: {minute: 20}\n",
        );

        Reconciler::new(&client, &version).reconcile(&doc).await.unwrap();

        let sid = gateway.services()[0]["id"].as_str().unwrap().to_string();
        let rid = gateway.routes()[0]["id"].clone();
        assert_eq!(
            gateway.mutations(),
            vec![
                String::from("POST /services"),
                String::from("PUT /routes/r1"),
                format!("POST /services/{sid}/plugins"),
            ]
        );
        assert_eq!(gateway.plugins()[0]["route"]["id"], rid);
    }

    #[tokio::test]
    async fn test_route_named_like_a_uuid_is_stable() {
        let gateway = FakeGateway::new();
        let client = gateway.client();
        let version = version();
        let doc = services_doc(
            "services:\n  - name: s1\n    url: http://s1.local\n    routes:\n      - name: 3c5b7f0e-1d2a-4e7b-9a51-0f6c2b8d9e11\n        paths: [/one]\n",
        );

        let reconciler = Reconciler::new(&client, &version);
        reconciler.reconcile(&doc).await.unwrap();
        assert_eq!(gateway.routes().len(), 1);

        gateway.clear_calls();
        let report = reconciler.reconcile(&doc).await.unwrap();
        assert!(gateway.mutations().is_empty(), "unexpected calls: {:?}", gateway.mutations());
        assert_eq!(report.unchanged, 2);
    }

    #[tokio::test]
    async fn test_second_run_only_reads() {
        let gateway = FakeGateway::new();
        let client = gateway.client();
        let version = version();
        let doc = services_doc(
            r"
service_group: payments
services:
  - name: s1
    url: http://s1.local:8080/api
    routes:
      - name: r1
        paths: [/one]
      - name: r2
        paths: [/two]
    plugins:
      - name: rate-limiting
        route: {name: r1}
        config: {minute: 20}
      - name: cors
        config: {origins: ['*']}
",
        );

        let reconciler = Reconciler::new(&client, &version);
        reconciler.reconcile(&doc).await.unwrap();
        assert_eq!(gateway.plugins().len(), 2);

        gateway.clear_calls();
        let report = reconciler.reconcile(&doc).await.unwrap();

        assert!(gateway.mutations().is_empty(), "unexpected calls: {:?}", gateway.mutations());
        assert!(gateway.calls().iter().all(|c| c.method == Method::Get));
        assert_eq!(report.unchanged, 5);
    }

    #[tokio::test]
    async fn test_undesired_route_is_deleted_first() {
        let gateway = FakeGateway::new();
        let sid = gateway.seed_service("s1", "http://s1.local", &[]);
        let r2 = gateway.seed_route(&sid, "r2", json!({"paths": ["/two"]}));
        gateway.clear_calls();

        let client = gateway.client();
        let version = version();
        let doc = services_doc("services:\n  - name: s1\n    url: http://s1.local\n    routes:\n      - name: r1\n");
        Reconciler::new(&client, &version).reconcile(&doc).await.unwrap();

        let mutations = gateway.mutations();
        assert_eq!(mutations, vec![format!("DELETE /routes/{r2}"), String::from("PUT /routes/r1")]);
        let route_calls: Vec<_> = gateway
            .calls()
            .into_iter()
            .filter(|c| c.path.starts_with("/routes"))
            .collect();
        assert_eq!(route_calls[0].method, Method::Delete);
    }

    #[tokio::test]
    async fn test_changed_route_and_url_are_converged() {
        let gateway = FakeGateway::new();
        let sid = gateway.seed_service("s1", "http://old.local", &[]);
        gateway.seed_route(&sid, "r1", json!({"paths": ["/old"]}));
        gateway.clear_calls();

        let client = gateway.client();
        let version = version();
        let doc = services_doc(
            "services:\n  - name: s1\n    url: http://new.local\n    routes:\n      - name: r1\n        paths: [/new]\n",
        );
        let report = Reconciler::new(&client, &version).reconcile(&doc).await.unwrap();

        assert_eq!(gateway.mutations(), vec![format!("PATCH /services/{sid}"), String::from("PUT /routes/r1")]);
        assert_eq!(report.updated, 2);
        assert_eq!(gateway.services()[0]["host"], "new.local");
        assert_eq!(gateway.routes()[0]["paths"], json!(["/new"]));
    }

    #[tokio::test]
    async fn test_service_group_prunes_recursively() {
        let gateway = FakeGateway::new();
        let keep = gateway.seed_service("keep", "http://keep.local", &["payments"]);
        let gone = gateway.seed_service("gone", "http://gone.local", &["payments"]);
        gateway.seed_service("other", "http://other.local", &["search"]);
        let route = gateway.seed_route(&gone, "gone-route", json!({"paths": ["/gone"]}));
        gateway.seed_plugin(json!({"name": "cors", "route": {"id": route}, "service": {"id": gone}}));
        gateway.clear_calls();

        let client = gateway.client();
        let version = version();
        let doc = services_doc("service_group: payments\nservices:\n  - name: keep\n    url: http://keep.local\n");
        let report = Reconciler::new(&client, &version).reconcile(&doc).await.unwrap();

        let names: Vec<_> = gateway.services().iter().map(|s| s["name"].clone()).collect();
        assert_eq!(names, vec![json!("keep"), json!("other")]);
        assert!(gateway.routes().is_empty());
        assert!(gateway.plugins().is_empty());
        assert_eq!(report.deleted, 1);
        assert!(
            gateway
                .mutations()
                .last()
                .is_some_and(|m| m == &format!("DELETE /services/{gone}"))
        );
        assert!(!gateway.mutations().iter().any(|m| m.contains(&keep)));
    }

    #[tokio::test]
    async fn test_group_tag_is_added_to_existing_service() {
        let gateway = FakeGateway::new();
        let sid = gateway.seed_service("s1", "http://s1.local", &["team-a"]);
        gateway.clear_calls();

        let client = gateway.client();
        let version = version();
        let doc = services_doc("service_group: payments\nservices:\n  - name: s1\n    url: http://s1.local\n");
        Reconciler::new(&client, &version).reconcile(&doc).await.unwrap();

        assert_eq!(gateway.mutations(), vec![format!("PATCH /services/{sid}")]);
        assert_eq!(gateway.services()[0]["tags"], json!(["team-a", "payments"]));
    }

    #[tokio::test]
    async fn test_unknown_plugin_route_is_fatal() {
        let gateway = FakeGateway::new();
        let client = gateway.client();
        let version = version();
        let doc = services_doc(
            "services:\n  - name: s1\n    url: http://s1.local\n    routes:\n      - name: r1\n    plugins:\n      - name: cors\n        route: {name: nope}\n",
        );

        let err = Reconciler::new(&client, &version).reconcile(&doc).await.unwrap_err();

        assert!(err.to_string().contains("Can't find such route nope"));
        assert!(!gateway.mutations().iter().any(|m| m.contains("plugins")));
    }

    #[tokio::test]
    async fn test_plugin_changes_are_patched_and_extras_deleted() {
        let gateway = FakeGateway::new();
        let sid = gateway.seed_service("s1", "http://s1.local", &[]);
        let rid = gateway.seed_route(&sid, "r1", json!({}));
        let limited = gateway.seed_plugin(json!({
            "name": "rate-limiting",
            "service": {"id": sid},
            "route": {"id": rid},
            "config": {"minute": 5}
        }));
        let stale = gateway.seed_plugin(json!({"name": "cors", "service": {"id": sid}}));
        gateway.clear_calls();

        let client = gateway.client();
        let version = version();
        let doc = services_doc(
            "services:\n  - name: s1\n    url: http://s1.local\n    plugins:\n      - name: rate-limiting\n        route: {name: r1}\n        config: {minute: 20}\n",
        );
        Reconciler::new(&client, &version).reconcile(&doc).await.unwrap();

        assert_eq!(
            gateway.mutations(),
            vec![format!("DELETE /plugins/{stale}"), format!("PATCH /plugins/{limited}")]
        );
        assert_eq!(gateway.plugins()[0]["config"]["minute"], 20);
    }

    #[tokio::test]
    async fn test_unnamed_live_route_is_adopted_by_id() {
        let gateway = FakeGateway::new();
        let sid = gateway.seed_service("s1", "http://s1.local", &[]);
        let rid = gateway.seed_unnamed_route(&sid, json!({"paths": ["/legacy"]}));
        gateway.clear_calls();

        let client = gateway.client();
        let version = version();
        let doc = services_doc(&format!(
            "services:\n  - name: s1\n    url: http://s1.local\n    routes:\n      - name: {rid}_route\n        paths: [/legacy]\n"
        ));
        Reconciler::new(&client, &version).reconcile(&doc).await.unwrap();

        assert_eq!(gateway.mutations(), vec![format!("PUT /routes/{rid}")]);
        assert_eq!(gateway.routes().len(), 1);
        assert_eq!(gateway.routes()[0]["name"], format!("{rid}_route"));
    }
}

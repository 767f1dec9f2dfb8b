//! In-memory admin API for reconciler and exporter tests.
//!
//! Behaves like a small Kong: ids and timestamps are assigned on write,
//! listings are paginated with `next` cursors, deleting a service that still
//! has routes is refused and deleting a route cascades to its plugins.
//! Every request is recorded so tests can assert on ordering and idempotence.

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::ApiError;

use super::resource::ResourceClient;
use super::transport::{ApiRequest, ApiResponse, Method, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Table {
    Services,
    Routes,
    Plugins,
    Consumers,
    KeyAuth,
    Jwt,
}

impl Table {
    const fn label(self) -> Option<&'static str> {
        match self {
            Self::Services | Self::Routes => Some("name"),
            Self::Consumers => Some("username"),
            Self::Plugins | Self::KeyAuth | Self::Jwt => None,
        }
    }
}

#[derive(Debug)]
struct Failure {
    method: Method,
    path_prefix: String,
    status: u16,
}

#[derive(Debug, Default)]
struct Query {
    tags: Option<String>,
    offset: usize,
}

#[derive(Debug)]
struct State {
    version: String,
    page_size: usize,
    clock: i64,
    services: Vec<Value>,
    routes: Vec<Value>,
    plugins: Vec<Value>,
    consumers: Vec<Value>,
    key_auth: Vec<Value>,
    jwt: Vec<Value>,
    calls: Vec<ApiRequest>,
    failures: Vec<Failure>,
}

/// Shared handle to the in-memory gateway.
#[derive(Debug, Clone)]
pub(crate) struct FakeGateway {
    state: Arc<Mutex<State>>,
}

fn not_found() -> ApiResponse {
    ApiResponse::json(404, json!({"message": "Not found"}))
}

fn bad_request(message: impl Into<String>) -> ApiResponse {
    ApiResponse::json(400, json!({"message": message.into()}))
}

fn conflict(message: impl Into<String>) -> ApiResponse {
    ApiResponse::json(409, json!({"message": message.into()}))
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn str_field<'a>(value: &'a Value, field: &str) -> Option<&'a str> {
    value.get(field).and_then(Value::as_str)
}

fn ref_id<'a>(value: &'a Value, field: &str) -> Option<&'a str> {
    value.get(field).and_then(|r| r.get("id")).and_then(Value::as_str)
}

fn object(body: Option<&Value>) -> Map<String, Value> {
    body.and_then(Value::as_object).cloned().unwrap_or_default()
}

fn parse_query(raw: Option<&str>) -> Query {
    let mut query = Query::default();
    for pair in raw.unwrap_or_default().split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let value = urlencoding::decode(value).map(|v| v.into_owned()).unwrap_or_default();
        match key {
            "tags" => query.tags = Some(value),
            "offset" => query.offset = value.parse().unwrap_or_default(),
            _ => {}
        }
    }
    query
}

/// Splits an upstream URL into the service fields the gateway stores.
fn url_parts(raw: &str) -> Option<Map<String, Value>> {
    let url = url::Url::parse(raw).ok()?;
    let mut parts = Map::new();
    parts.insert(String::from("protocol"), json!(url.scheme()));
    parts.insert(String::from("host"), json!(url.host_str()?));
    parts.insert(String::from("port"), json!(url.port_or_known_default()?));
    let path = if url.path() == "/" { Value::Null } else { json!(url.path()) };
    parts.insert(String::from("path"), path);
    Some(parts)
}

impl State {
    fn table(&mut self, table: Table) -> &mut Vec<Value> {
        match table {
            Table::Services => &mut self.services,
            Table::Routes => &mut self.routes,
            Table::Plugins => &mut self.plugins,
            Table::Consumers => &mut self.consumers,
            Table::KeyAuth => &mut self.key_auth,
            Table::Jwt => &mut self.jwt,
        }
    }

    fn find(&mut self, table: Table, id_or_name: &str) -> Option<usize> {
        let label = table.label();
        self.table(table).iter().position(|entry| {
            str_field(entry, "id") == Some(id_or_name)
                || label.is_some_and(|l| str_field(entry, l) == Some(id_or_name))
        })
    }

    fn resolve_id(&mut self, table: Table, id_or_name: &str) -> Option<String> {
        let index = self.find(table, id_or_name)?;
        str_field(&self.table(table)[index], "id").map(ToString::to_string)
    }

    fn tick(&mut self) -> i64 {
        self.clock += 1;
        self.clock
    }

    fn page(&self, items: Vec<Value>, base: &str, query: &Query) -> ApiResponse {
        let start = query.offset.min(items.len());
        let end = (start + self.page_size).min(items.len());
        let next = (end < items.len()).then(|| match &query.tags {
            Some(tag) => format!("{base}?tags={}&offset={end}", urlencoding::encode(tag)),
            None => format!("{base}?offset={end}"),
        });
        ApiResponse::json(200, json!({"data": items[start..end].to_vec(), "next": next}))
    }

    fn failure_for(&self, request: &ApiRequest) -> Option<u16> {
        self.failures
            .iter()
            .find(|f| f.method == request.method && request.path.starts_with(&f.path_prefix))
            .map(|f| f.status)
    }

    fn handle(&mut self, request: &ApiRequest) -> ApiResponse {
        if let Some(status) = self.failure_for(request) {
            return ApiResponse::json(status, json!({"message": "injected failure"}));
        }

        let (path, raw_query) = match request.path.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (request.path.as_str(), None),
        };
        let query = parse_query(raw_query);
        let segments: Vec<String> = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| urlencoding::decode(s).map(|d| d.into_owned()).unwrap_or_default())
            .collect();
        let segments: Vec<&str> = segments.iter().map(String::as_str).collect();
        let body = request.body.as_ref();

        match (request.method, segments.as_slice()) {
            (Method::Get, []) => ApiResponse::json(
                200,
                json!({"version": self.version, "tagline": "Welcome to kong"}),
            ),

            (Method::Get, ["services"]) => {
                let items = self
                    .services
                    .iter()
                    .filter(|s| {
                        query.tags.as_ref().is_none_or(|tag| {
                            s.get("tags")
                                .and_then(Value::as_array)
                                .is_some_and(|tags| tags.iter().any(|t| t.as_str() == Some(tag.as_str())))
                        })
                    })
                    .cloned()
                    .collect();
                self.page(items, path, &query)
            }
            (Method::Post, ["services"]) => self.create_service(body),
            (Method::Get, ["services", service]) => self.get(Table::Services, service),
            (Method::Patch, ["services", service]) => self.patch_service(service, body),
            (Method::Delete, ["services", service]) => self.delete_service(service),
            (Method::Get, ["services", service, "routes"]) => {
                let Some(sid) = self.resolve_id(Table::Services, service) else {
                    return not_found();
                };
                let items = self
                    .routes
                    .iter()
                    .filter(|r| ref_id(r, "service") == Some(sid.as_str()))
                    .cloned()
                    .collect();
                self.page(items, path, &query)
            }
            (Method::Get, ["services", service, "plugins"]) => {
                let Some(sid) = self.resolve_id(Table::Services, service) else {
                    return not_found();
                };
                let items = self
                    .plugins
                    .iter()
                    .filter(|p| ref_id(p, "service") == Some(sid.as_str()))
                    .cloned()
                    .collect();
                self.page(items, path, &query)
            }
            (Method::Post, ["services", service, "plugins"]) => {
                let Some(sid) = self.resolve_id(Table::Services, service) else {
                    return not_found();
                };
                let mut payload = object(body);
                payload.insert(String::from("service"), json!({"id": sid}));
                self.create_plugin(None, payload)
            }

            (Method::Get, ["routes"]) => self.page(self.routes.clone(), path, &query),
            (Method::Post, ["routes"]) => self.put_route(None, body),
            (Method::Get, ["routes", route]) => self.get(Table::Routes, route),
            (Method::Put, ["routes", route]) => self.put_route(Some(route), body),
            (Method::Patch, ["routes", route]) => self.patch(Table::Routes, route, body),
            (Method::Delete, ["routes", route]) => self.delete_route(route),
            (Method::Get, ["routes", route, "plugins"]) => {
                let Some(rid) = self.resolve_id(Table::Routes, route) else {
                    return not_found();
                };
                let items = self
                    .plugins
                    .iter()
                    .filter(|p| ref_id(p, "route") == Some(rid.as_str()))
                    .cloned()
                    .collect();
                self.page(items, path, &query)
            }

            (Method::Get, ["plugins"]) => self.page(self.plugins.clone(), path, &query),
            (Method::Get, ["plugins", "enabled"]) => ApiResponse::json(
                200,
                json!({"enabled_plugins": ["cors", "jwt", "key-auth", "rate-limiting"]}),
            ),
            (Method::Get, ["plugins", "schema", name]) => ApiResponse::json(
                200,
                json!({"name": name, "fields": [{"config": {"type": "record"}}]}),
            ),
            (Method::Post, ["plugins"]) => self.create_plugin(None, object(body)),
            (Method::Get, ["plugins", plugin]) => self.get(Table::Plugins, plugin),
            (Method::Put, ["plugins", plugin]) => self.put_plugin(plugin, body),
            (Method::Patch, ["plugins", plugin]) => self.patch(Table::Plugins, plugin, body),
            (Method::Delete, ["plugins", plugin]) => {
                if let Some(index) = self.find(Table::Plugins, plugin) {
                    self.plugins.remove(index);
                }
                ApiResponse::empty(204)
            }

            (Method::Get, ["consumers"]) => self.page(self.consumers.clone(), path, &query),
            (Method::Post, ["consumers"]) => {
                let payload = object(body);
                let username = payload.get("username").and_then(Value::as_str).map(ToString::to_string);
                self.upsert_consumer(username.as_deref(), payload)
            }
            (Method::Get, ["consumers", consumer]) => self.get(Table::Consumers, consumer),
            (Method::Put, ["consumers", consumer]) => self.upsert_consumer(Some(consumer), object(body)),
            (Method::Patch, ["consumers", consumer]) => self.patch(Table::Consumers, consumer, body),
            (Method::Delete, ["consumers", consumer]) => {
                if let Some(cid) = self.resolve_id(Table::Consumers, consumer) {
                    self.consumers.retain(|c| str_field(c, "id") != Some(cid.as_str()));
                    self.key_auth.retain(|k| ref_id(k, "consumer") != Some(cid.as_str()));
                    self.jwt.retain(|j| ref_id(j, "consumer") != Some(cid.as_str()));
                }
                ApiResponse::empty(204)
            }
            (method, ["consumers", consumer, kind @ ("key-auth" | "jwt"), rest @ ..]) => {
                let table = if *kind == "key-auth" { Table::KeyAuth } else { Table::Jwt };
                self.credentials(method, table, consumer, rest, path, &query, body)
            }

            _ => not_found(),
        }
    }

    fn get(&mut self, table: Table, id_or_name: &str) -> ApiResponse {
        match self.find(table, id_or_name) {
            Some(index) => ApiResponse::json(200, self.table(table)[index].clone()),
            None => not_found(),
        }
    }

    fn patch(&mut self, table: Table, id_or_name: &str, body: Option<&Value>) -> ApiResponse {
        let Some(index) = self.find(table, id_or_name) else {
            return not_found();
        };
        let now = self.tick();
        let entry = &mut self.table(table)[index];
        if let Some(fields) = entry.as_object_mut() {
            for (key, value) in object(body) {
                fields.insert(key, value);
            }
            if table == Table::Routes {
                fields.insert(String::from("updated_at"), json!(now));
            }
        }
        ApiResponse::json(200, entry.clone())
    }

    fn create_service(&mut self, body: Option<&Value>) -> ApiResponse {
        let mut payload = object(body);
        let Some(name) = payload.get("name").and_then(Value::as_str).map(ToString::to_string) else {
            return bad_request("schema violation (name: required field missing)");
        };
        if self.find(Table::Services, &name).is_some() {
            return conflict(format!("UNIQUE violation detected on '{{name=\"{name}\"}}'"));
        }
        let Some(parts) = payload
            .remove("url")
            .and_then(|u| u.as_str().and_then(url_parts))
        else {
            return bad_request("schema violation (host: required field missing)");
        };
        payload.extend(parts);
        let now = self.tick();
        payload.insert(String::from("id"), json!(new_id()));
        payload.insert(String::from("created_at"), json!(now));
        payload.insert(String::from("updated_at"), json!(now));
        let entity = Value::Object(payload);
        self.services.push(entity.clone());
        ApiResponse::json(201, entity)
    }

    fn patch_service(&mut self, service: &str, body: Option<&Value>) -> ApiResponse {
        let mut payload = object(body);
        if let Some(url) = payload.remove("url") {
            let Some(parts) = url.as_str().and_then(url_parts) else {
                return bad_request("schema violation (url: invalid url)");
            };
            payload.extend(parts);
        }
        let Some(index) = self.find(Table::Services, service) else {
            return not_found();
        };
        let now = self.tick();
        let entry = &mut self.services[index];
        if let Some(fields) = entry.as_object_mut() {
            fields.extend(payload);
            fields.insert(String::from("updated_at"), json!(now));
        }
        ApiResponse::json(200, entry.clone())
    }

    fn delete_service(&mut self, service: &str) -> ApiResponse {
        let Some(sid) = self.resolve_id(Table::Services, service) else {
            return ApiResponse::empty(204);
        };
        if self.routes.iter().any(|r| ref_id(r, "service") == Some(sid.as_str())) {
            return bad_request("an existing 'routes' entity references this 'services' entity");
        }
        self.plugins.retain(|p| ref_id(p, "service") != Some(sid.as_str()));
        self.services.retain(|s| str_field(s, "id") != Some(sid.as_str()));
        ApiResponse::empty(204)
    }

    fn put_route(&mut self, route: Option<&str>, body: Option<&Value>) -> ApiResponse {
        let mut payload = object(body);
        let Some(sid) = payload
            .get("service")
            .and_then(|s| s.get("id"))
            .and_then(Value::as_str)
            .map(ToString::to_string)
        else {
            return bad_request("schema violation (service: required field missing)");
        };
        if self.find(Table::Services, &sid).is_none() {
            return bad_request(format!("the foreign key '{{id=\"{sid}\"}}' does not reference an existing 'services' entity"));
        }

        let existing = route.and_then(|r| self.find(Table::Routes, r));
        let now = self.tick();
        let (id, created_at) = match existing {
            Some(index) => {
                let entry = &self.routes[index];
                (
                    str_field(entry, "id").map(ToString::to_string).unwrap_or_else(new_id),
                    entry.get("created_at").cloned().unwrap_or(json!(now)),
                )
            }
            None => (new_id(), json!(now)),
        };

        if let Some(name) = route.filter(|r| *r != id) {
            payload.insert(String::from("name"), json!(name));
        }
        payload.insert(String::from("id"), json!(id));
        payload.insert(String::from("created_at"), created_at);
        payload.insert(String::from("updated_at"), json!(now));
        payload.entry(String::from("preserve_host")).or_insert(json!(false));
        let entity = Value::Object(payload);

        match existing {
            Some(index) => {
                self.routes[index] = entity.clone();
                ApiResponse::json(200, entity)
            }
            None => {
                self.routes.push(entity.clone());
                ApiResponse::json(201, entity)
            }
        }
    }

    fn delete_route(&mut self, route: &str) -> ApiResponse {
        if let Some(rid) = self.resolve_id(Table::Routes, route) {
            self.plugins.retain(|p| ref_id(p, "route") != Some(rid.as_str()));
            self.routes.retain(|r| str_field(r, "id") != Some(rid.as_str()));
        }
        ApiResponse::empty(204)
    }

    fn plugin_scope(plugin: &Map<String, Value>) -> (Option<Value>, Option<Value>, Option<Value>) {
        let reference = |field: &str| {
            plugin
                .get(field)
                .and_then(|r| r.get("id"))
                .cloned()
        };
        (reference("service"), reference("route"), reference("consumer"))
    }

    fn create_plugin(&mut self, id: Option<&str>, mut payload: Map<String, Value>) -> ApiResponse {
        if payload.get("name").and_then(Value::as_str).is_none() {
            return bad_request("schema violation (name: required field missing)");
        }
        if let Some(rid) = payload.get("route").and_then(|r| r.get("id")).and_then(Value::as_str)
            && self.find(Table::Routes, rid).is_none()
        {
            return bad_request(format!("the foreign key '{{id=\"{rid}\"}}' does not reference an existing 'routes' entity"));
        }

        let scope = Self::plugin_scope(&payload);
        let name = payload.get("name").cloned();
        let duplicate = self.plugins.iter().any(|p| {
            p.get("name").cloned() == name
                && p.as_object().map(Self::plugin_scope) == Some(scope.clone())
        });
        if duplicate {
            return conflict("UNIQUE violation detected on plugin scope");
        }

        let now = self.tick();
        for field in ["service", "route", "consumer"] {
            payload.entry(String::from(field)).or_insert(Value::Null);
        }
        payload.insert(String::from("id"), json!(id.map_or_else(new_id, ToString::to_string)));
        payload.insert(String::from("created_at"), json!(now));
        let entity = Value::Object(payload);
        self.plugins.push(entity.clone());
        ApiResponse::json(201, entity)
    }

    fn put_plugin(&mut self, plugin: &str, body: Option<&Value>) -> ApiResponse {
        match self.find(Table::Plugins, plugin) {
            Some(index) => {
                let mut payload = object(body);
                let entry = &self.plugins[index];
                payload.insert(String::from("id"), json!(plugin));
                payload.insert(
                    String::from("created_at"),
                    entry.get("created_at").cloned().unwrap_or(Value::Null),
                );
                for field in ["service", "route", "consumer"] {
                    payload.entry(String::from(field)).or_insert(Value::Null);
                }
                let entity = Value::Object(payload);
                self.plugins[index] = entity.clone();
                ApiResponse::json(200, entity)
            }
            None => self.create_plugin(Some(plugin), object(body)),
        }
    }

    fn upsert_consumer(&mut self, username: Option<&str>, mut payload: Map<String, Value>) -> ApiResponse {
        let Some(username) = username else {
            return bad_request("schema violation (username or custom_id required)");
        };
        let now = self.tick();
        payload.insert(String::from("username"), json!(username));
        match self.find(Table::Consumers, username) {
            Some(index) => {
                let entry = &mut self.consumers[index];
                if let Some(fields) = entry.as_object_mut() {
                    fields.extend(payload);
                }
                ApiResponse::json(200, entry.clone())
            }
            None => {
                payload.insert(String::from("id"), json!(new_id()));
                payload.insert(String::from("created_at"), json!(now));
                let entity = Value::Object(payload);
                self.consumers.push(entity.clone());
                ApiResponse::json(201, entity)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn credentials(
        &mut self,
        method: Method,
        table: Table,
        consumer: &str,
        rest: &[&str],
        path: &str,
        query: &Query,
        body: Option<&Value>,
    ) -> ApiResponse {
        let Some(cid) = self.resolve_id(Table::Consumers, consumer) else {
            return not_found();
        };
        let owned_by = |entry: &Value| ref_id(entry, "consumer") == Some(cid.as_str());

        match (method, rest) {
            (Method::Get, []) => {
                let items = self.table(table).iter().filter(|e| owned_by(*e)).cloned().collect();
                self.page(items, path, query)
            }
            (Method::Post, []) => {
                let mut payload = object(body);
                let now = self.tick();
                payload.entry(String::from("key")).or_insert_with(|| json!(new_id().replace('-', "")));
                if table == Table::Jwt {
                    payload.entry(String::from("secret")).or_insert_with(|| json!(new_id().replace('-', "")));
                    payload.entry(String::from("algorithm")).or_insert_with(|| json!("HS256"));
                    payload.entry(String::from("rsa_public_key")).or_insert(Value::Null);
                }
                payload.insert(String::from("id"), json!(new_id()));
                payload.insert(String::from("created_at"), json!(now));
                payload.insert(String::from("consumer"), json!({"id": cid}));
                let entity = Value::Object(payload);
                self.table(table).push(entity.clone());
                ApiResponse::json(201, entity)
            }
            (Method::Get, [id]) => {
                let found = self
                    .table(table)
                    .iter()
                    .find(|e| owned_by(*e) && str_field(e, "id") == Some(*id))
                    .cloned();
                found.map_or_else(not_found, |entry| ApiResponse::json(200, entry))
            }
            (Method::Delete, [id]) => {
                self.table(table)
                    .retain(|e| !(owned_by(e) && str_field(e, "id") == Some(*id)));
                ApiResponse::empty(204)
            }
            _ => not_found(),
        }
    }
}

impl FakeGateway {
    pub(crate) fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                version: String::from("2.8.1"),
                page_size: 2,
                clock: 1_700_000_000,
                services: Vec::new(),
                routes: Vec::new(),
                plugins: Vec::new(),
                consumers: Vec::new(),
                key_auth: Vec::new(),
                jwt: Vec::new(),
                calls: Vec::new(),
                failures: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn with_version(self, version: &str) -> Self {
        self.lock().version = version.to_string();
        self
    }

    pub(crate) fn with_page_size(self, page_size: usize) -> Self {
        self.lock().page_size = page_size.max(1);
        self
    }

    /// Builds a resource client talking to this gateway.
    pub(crate) fn client(&self) -> ResourceClient {
        ResourceClient::new(Box::new(self.clone()))
    }

    /// Makes every matching request answer with `status`.
    pub(crate) fn fail(&self, method: Method, path_prefix: &str, status: u16) {
        self.lock().failures.push(Failure {
            method,
            path_prefix: path_prefix.to_string(),
            status,
        });
    }

    pub(crate) fn calls(&self) -> Vec<ApiRequest> {
        self.lock().calls.clone()
    }

    /// Mutating calls as `"METHOD path"` strings, in order.
    pub(crate) fn mutations(&self) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.method.is_mutating())
            .map(|c| format!("{} {}", c.method, c.path))
            .collect()
    }

    pub(crate) fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    fn seed(&self, request: &ApiRequest) -> Value {
        let response = self.lock().handle(request);
        assert!(response.is_success(), "seeding {} {} failed: {:?}", request.method, request.path, response.body);
        response.body.into_json()
    }

    fn seeded_id(value: &Value) -> String {
        str_field(value, "id").map(ToString::to_string).unwrap_or_default()
    }

    pub(crate) fn seed_service(&self, name: &str, url: &str, tags: &[&str]) -> String {
        let mut body = json!({"name": name, "url": url});
        if !tags.is_empty() {
            body["tags"] = json!(tags);
        }
        Self::seeded_id(&self.seed(&ApiRequest::post("/services", body)))
    }

    pub(crate) fn seed_route(&self, service_id: &str, name: &str, mut body: Value) -> String {
        body["service"] = json!({"id": service_id});
        Self::seeded_id(&self.seed(&ApiRequest::put(format!("/routes/{name}"), body)))
    }

    /// Seeds a route without a name, as created through `POST /routes`.
    pub(crate) fn seed_unnamed_route(&self, service_id: &str, mut body: Value) -> String {
        body["service"] = json!({"id": service_id});
        Self::seeded_id(&self.seed(&ApiRequest::post("/routes", body)))
    }

    pub(crate) fn seed_plugin(&self, body: Value) -> String {
        Self::seeded_id(&self.seed(&ApiRequest::post("/plugins", body)))
    }

    pub(crate) fn seed_consumer(&self, username: &str) -> String {
        Self::seeded_id(&self.seed(&ApiRequest::put(format!("/consumers/{username}"), json!({}))))
    }

    pub(crate) fn seed_key_auth(&self, username: &str, key: &str) -> String {
        let request = ApiRequest::post(format!("/consumers/{username}/key-auth"), json!({"key": key}));
        Self::seeded_id(&self.seed(&request))
    }

    pub(crate) fn seed_jwt(&self, username: &str, body: Value) -> String {
        Self::seeded_id(&self.seed(&ApiRequest::post(format!("/consumers/{username}/jwt"), body)))
    }

    pub(crate) fn services(&self) -> Vec<Value> {
        self.lock().services.clone()
    }

    pub(crate) fn routes(&self) -> Vec<Value> {
        self.lock().routes.clone()
    }

    pub(crate) fn plugins(&self) -> Vec<Value> {
        self.lock().plugins.clone()
    }

    pub(crate) fn key_auths(&self) -> Vec<Value> {
        self.lock().key_auth.clone()
    }

    pub(crate) fn jwts(&self) -> Vec<Value> {
        self.lock().jwt.clone()
    }

    pub(crate) fn consumers(&self) -> Vec<Value> {
        self.lock().consumers.clone()
    }
}

#[async_trait]
impl Transport for FakeGateway {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let mut state = self.lock();
        state.calls.push(request.clone());
        Ok(state.handle(&request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kong::{ResourceKind, Scope, Service};

    #[tokio::test]
    async fn test_listing_is_paginated() {
        let gateway = FakeGateway::new().with_page_size(2);
        for name in ["a", "b", "c", "d", "e"] {
            gateway.seed_service(name, "http://upstream.local", &[]);
        }

        let client = gateway.client();
        let services: Vec<Service> = client.list(ResourceKind::Service, &Scope::Global).await.unwrap();

        assert_eq!(services.len(), 5);
        let pages = gateway.calls().iter().filter(|c| c.path.starts_with("/services")).count();
        assert_eq!(pages, 3);
    }

    #[tokio::test]
    async fn test_service_with_routes_cannot_be_deleted() {
        let gateway = FakeGateway::new();
        let sid = gateway.seed_service("billing", "http://billing.local", &[]);
        gateway.seed_route(&sid, "invoices", json!({"paths": ["/invoices"]}));

        let client = gateway.client();
        let err = client
            .delete(ResourceKind::Service, &Scope::Global, "billing")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("400"));

        client.delete_service_recursive("billing").await.unwrap();
        assert!(gateway.services().is_empty());
        assert!(gateway.routes().is_empty());
    }

    #[test]
    fn test_service_url_is_split() {
        let gateway = FakeGateway::new();
        gateway.seed_service("billing", "https://billing.local/api", &["team-a"]);

        let stored = &gateway.services()[0];
        assert_eq!(stored["protocol"], "https");
        assert_eq!(stored["port"], 443);
        assert_eq!(stored["path"], "/api");
        assert!(stored.get("url").is_none());
    }
}

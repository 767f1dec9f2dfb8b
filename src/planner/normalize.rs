//! Normalization of live records into their comparable form.
//!
//! The gateway decorates every record with ids, timestamps and
//! back-references that a desired-state document never carries. Those are
//! stripped here so a desired entry and its live counterpart can be compared
//! as canonical JSON.

use serde_json::{Map, Value, json};
use std::fmt;
use tracing::warn;

use crate::kong::{Record, ResourceKind};

/// Attributes the gateway generates for every kind.
const GENERATED: &[&str] = &["id", "created_at", "updated_at", "service"];

/// Canonical JSON text of a normalized record: keys sorted at every level.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Canonical(String);

impl Canonical {
    /// Renders a value canonically.
    #[must_use]
    pub fn of(value: &Value) -> Self {
        Self(canonical_value(value))
    }

    /// Returns the canonical text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Canonical {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Strips generated attributes from a record value of the given kind.
#[must_use]
pub fn normalize_value(kind: ResourceKind, value: Value) -> Value {
    let Value::Object(mut fields) = value else {
        return value;
    };

    for field in GENERATED {
        fields.remove(*field);
    }

    match kind {
        ResourceKind::Route => {
            fields.remove("preserve_host");
        }
        ResourceKind::Plugin => normalize_plugin(&mut fields),
        ResourceKind::KeyAuth | ResourceKind::Jwt => {
            fields.remove("consumer");
        }
        ResourceKind::Service | ResourceKind::Consumer => {}
    }

    Value::Object(fields)
}

fn normalize_plugin(fields: &mut Map<String, Value>) {
    if let Some(route_id) = fields.remove("route_id")
        && !route_id.is_null()
        && fields.get("route").is_none_or(Value::is_null)
    {
        fields.insert(String::from("route"), json!({ "id": route_id }));
    }
    fields.remove("service_id");

    let empty_tags = match fields.get("tags") {
        None | Some(Value::Null) => true,
        Some(Value::Array(tags)) => tags.is_empty(),
        Some(_) => false,
    };
    if empty_tags {
        fields.remove("tags");
    }

    if fields.get("route").is_some_and(Value::is_null) {
        fields.remove("route");
    }
}

/// Normalizes a typed record.
///
/// A record that cannot be encoded normalizes to `null`, which never equals a
/// live record; the write that follows reports the encoding error.
#[must_use]
pub fn normalize<R: Record>(record: &R) -> Value {
    match record.to_value() {
        Ok(value) => normalize_value(R::KIND, value),
        Err(e) => {
            warn!("{e}");
            Value::Null
        }
    }
}

/// Canonical form of a normalized record.
#[must_use]
pub fn canonical<R: Record>(record: &R) -> Canonical {
    Canonical::of(&normalize(record))
}

/// Renders a value as JSON with object keys sorted at every level.
#[must_use]
pub fn canonical_value(value: &Value) -> String {
    sorted(value).to_string()
}

fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(fields) => {
            let mut keys: Vec<&String> = fields.keys().collect();
            keys.sort();
            let mut out = Map::new();
            for key in keys {
                out.insert(key.clone(), sorted(&fields[key.as_str()]));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

//! Desired-state document validation.
//!
//! Every document is checked in full before the reconciler issues a single
//! mutating call, so a malformed entry deep in a file cannot leave the
//! gateway half-converged.

use std::collections::HashSet;
use tracing::{debug, warn};

use crate::error::{EnsureError, Result};
use crate::kong::{Plugin, ServiceUrl};

use super::document::{ConsumersDocument, DesiredDocument, ServicesDocument};

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

impl ValidationResult {
    fn error(&mut self, field: String, message: impl Into<String>) {
        self.errors.push(ValidationError {
            field,
            message: message.into(),
        });
    }
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

/// Validator for desired-state documents.
#[derive(Debug, Default)]
pub struct DocumentValidator;

impl DocumentValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a document.
    ///
    /// # Errors
    ///
    /// Returns [`EnsureError::MalformedDocument`] for the first problem found.
    pub fn validate(&self, document: &DesiredDocument) -> Result<ValidationResult> {
        let mut result = ValidationResult::default();

        match document {
            DesiredDocument::Services(doc) => Self::validate_services(doc, &mut result),
            DesiredDocument::Plugins(plugins) => {
                Self::validate_plugins(plugins, "plugins", &mut result);
            }
            DesiredDocument::Consumers(doc) => Self::validate_consumers(doc, &mut result),
        }

        for warning in &result.warnings {
            warn!("{warning}");
        }

        if let Some(first) = result.errors.first() {
            return Err(EnsureError::malformed(first.field.clone(), first.message.clone()).into());
        }

        debug!("{} document validation passed", document.kind());
        Ok(result)
    }

    fn validate_services(doc: &ServicesDocument, result: &mut ValidationResult) {
        let Some(services) = &doc.services else {
            result.error(String::from("services"), "Field services not present in document");
            return;
        };

        if let Some(group) = &doc.service_group
            && group.trim().is_empty()
        {
            result.error(String::from("service_group"), "Service group cannot be empty");
        }

        let mut seen = HashSet::new();
        for (i, service) in services.iter().enumerate() {
            let prefix = format!("services[{i}]");

            match service.name.as_deref() {
                None | Some("") => {
                    result.error(format!("{prefix}.name"), "Service missing field name");
                }
                Some(name) => {
                    if !seen.insert(name) {
                        result.error(format!("{prefix}.name"), format!("Duplicate service name: {name}"));
                    }
                }
            }

            match service.url.as_deref() {
                None | Some("") => result.error(
                    format!("{prefix}.url"),
                    format!("Service {} missing field url", service.name()),
                ),
                Some(url) => {
                    if let Err(e) = ServiceUrl::parse(url) {
                        result.error(format!("{prefix}.url"), format!("Invalid url '{url}': {e}"));
                    }
                }
            }

            if let Some(routes) = &service.routes {
                let mut route_names = HashSet::new();
                for (j, route) in routes.iter().enumerate() {
                    let field = format!("{prefix}.routes[{j}].name");
                    match route.name.as_deref() {
                        None | Some("") => result.error(
                            field,
                            format!("Route of service {} missing field name", service.name()),
                        ),
                        Some(name) => {
                            if !route_names.insert(name) {
                                result.error(field, format!("Duplicate route name: {name}"));
                            }
                        }
                    }
                }
            }

            if let Some(plugins) = &service.plugins {
                Self::validate_plugins(plugins, &format!("{prefix}.plugins"), result);
            }
        }

        if services.is_empty() {
            result.warnings.push(String::from("No services defined in document"));
        }
    }

    /// Checks plugin names and references. Two entries with the same name,
    /// route and consumer would both claim one live plugin, so they are
    /// rejected.
    fn validate_plugins(plugins: &[Plugin], prefix: &str, result: &mut ValidationResult) {
        let mut identities = HashSet::new();
        for (i, plugin) in plugins.iter().enumerate() {
            match plugin.name.as_deref() {
                None | Some("") => result.error(format!("{prefix}[{i}].name"), "Plugin missing field name"),
                Some(name) => {
                    let route = plugin
                        .route
                        .as_ref()
                        .and_then(|r| r.id.as_deref().or(r.name.as_deref()))
                        .or(plugin.route_id.as_deref());
                    let consumer = plugin.consumer_ref();
                    if !identities.insert((name, route, consumer)) {
                        let scope: Vec<String> = [
                            route.map(|r| format!("route {r}")),
                            consumer.map(|c| format!("consumer {c}")),
                        ]
                        .into_iter()
                        .flatten()
                        .collect();
                        let message = if scope.is_empty() {
                            format!("Duplicate plugin: {name}")
                        } else {
                            format!("Duplicate plugin: {name} ({})", scope.join(", "))
                        };
                        result.error(format!("{prefix}[{i}]"), message);
                    }
                }
            }
            if let Some(route) = &plugin.route
                && route.name.is_none()
                && route.id.is_none()
            {
                result.error(
                    format!("{prefix}[{i}].route"),
                    "Plugin route reference needs a name or an id",
                );
            }
        }
    }

    fn validate_consumers(doc: &ConsumersDocument, result: &mut ValidationResult) {
        let Some(consumers) = &doc.consumers else {
            result.error(String::from("consumers"), "Field consumers not present in document");
            return;
        };

        for (i, consumer) in consumers.iter().enumerate() {
            let prefix = format!("consumers[{i}]");
            let username = consumer.username();

            if username.is_empty() {
                result.error(format!("{prefix}.username"), "Consumer missing field username");
            }

            for (j, credential) in consumer.keyauth_credentials.iter().flatten().enumerate() {
                if credential.key.as_deref().is_none_or(str::is_empty) {
                    result.error(
                        format!("{prefix}.keyauth_credentials[{j}].key"),
                        format!("Consumer {username} in keyauth_credentials missing field key"),
                    );
                }
            }

            for (j, credential) in consumer.jwt_secrets.iter().flatten().enumerate() {
                if credential.key.as_deref().is_none_or(str::is_empty) {
                    result.error(
                        format!("{prefix}.jwt_secrets[{j}].key"),
                        format!("Consumer {username} in jwt_secrets missing field key"),
                    );
                }
            }
        }
    }
}

//! Output formatting for CLI commands.
//!
//! Records and documents go to stdout as JSON or YAML; short listings are
//! rendered as tables and reconcile reports in color.

use colored::Colorize;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Write as _;
use std::io::Write;
use tabled::{Table, Tabled};

use crate::error::{KongctlError, Result};
use crate::exporter::render_yaml;
use crate::kong::{ResourceKind, Route, Service, decode};
use crate::reconciler::{ChangeKind, ReconcileReport};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// One row of a short listing.
#[derive(Tabled)]
struct ListingRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Details")]
    details: String,
}

fn str_field<'a>(record: &'a Value, field: &str) -> &'a str {
    record.get(field).and_then(Value::as_str).unwrap_or_default()
}

fn ref_id<'a>(record: &'a Value, field: &str) -> Option<&'a str> {
    record
        .get(field)
        .and_then(|r| r.get("id"))
        .and_then(Value::as_str)
        .or_else(|| record.get(&format!("{field}_id")).and_then(Value::as_str))
}

fn joined(record: &Value, field: &str, fallback: &str) -> Vec<String> {
    let values: Vec<String> = record
        .get(field)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).map(ToString::to_string).collect())
        .unwrap_or_default();
    if values.is_empty() {
        vec![fallback.to_string()]
    } else {
        values
    }
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Renders a value in the selected format.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be serialized.
    pub fn render<T: Serialize>(&self, value: &T) -> Result<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(value)
                .map(|mut rendered| {
                    rendered.push('\n');
                    rendered
                })
                .map_err(|e| KongctlError::internal(format!("Failed to render JSON: {e}"))),
            OutputFormat::Yaml => render_yaml(value, "output"),
        }
    }

    /// Writes a value to stdout in the selected format.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be serialized or written.
    pub fn emit<T: Serialize>(&self, value: &T) -> Result<()> {
        let rendered = self.render(value)?;
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(rendered.as_bytes())?;
        stdout.flush()?;
        Ok(())
    }

    /// Writes raw text to stdout.
    ///
    /// # Errors
    ///
    /// Returns an error if stdout cannot be written.
    pub fn emit_text(&self, text: &str) -> Result<()> {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(text.as_bytes())?;
        Ok(())
    }

    /// Formats records as a short table.
    ///
    /// `services` is used to show service names instead of ids; pass what
    /// has already been fetched.
    #[must_use]
    pub fn format_listing(&self, kind: ResourceKind, records: &[Value], services: &[Service]) -> String {
        if records.is_empty() {
            return format!("No {} found.\n", kind.collection());
        }

        let service_name = |id: Option<&str>| -> String {
            id.map_or_else(
                || String::from("*all*"),
                |id| {
                    services
                        .iter()
                        .find(|s| s.id.as_deref() == Some(id))
                        .and_then(|s| s.name.clone())
                        .unwrap_or_else(|| id.to_string())
                },
            )
        };

        let rows: Vec<ListingRow> = records
            .iter()
            .map(|record| {
                let id = str_field(record, "id").to_string();
                let (name, details) = match kind {
                    ResourceKind::Service => {
                        let url = decode::<Service>(record.clone()).map(|s| s.url().to_string());
                        (str_field(record, "name").to_string(), url.unwrap_or_default())
                    }
                    ResourceKind::Route => {
                        let name = decode::<Route>(record.clone())
                            .map(|r| r.display_name())
                            .unwrap_or_default();
                        let mut targets = Vec::new();
                        for host in joined(record, "hosts", "*") {
                            for path in joined(record, "paths", "/") {
                                targets.push(format!("{host}{path}"));
                            }
                        }
                        let service = service_name(ref_id(record, "service"));
                        (name, format!("{service}: {}", targets.join(", ")))
                    }
                    ResourceKind::Plugin => {
                        let enabled = record.get("enabled").and_then(Value::as_bool).unwrap_or(true);
                        let state = if enabled { "on".green() } else { "off".red() };
                        let route = ref_id(record, "route").unwrap_or("*all*");
                        (
                            str_field(record, "name").to_string(),
                            format!(
                                "service {} route {route} {state}",
                                service_name(ref_id(record, "service"))
                            ),
                        )
                    }
                    ResourceKind::Consumer => (str_field(record, "username").to_string(), String::new()),
                    ResourceKind::KeyAuth => (str_field(record, "key").to_string(), String::new()),
                    ResourceKind::Jwt => (
                        str_field(record, "key").to_string(),
                        format!("secret {}", str_field(record, "secret")),
                    ),
                };
                ListingRow { id, name, details }
            })
            .collect();

        let mut output = Table::new(rows).to_string();
        output.push('\n');
        output
    }

    /// Formats the enabled plugin names, one per line.
    #[must_use]
    pub fn format_plugin_names(&self, names: &[String]) -> String {
        let mut output = String::new();
        for name in names {
            let _ = writeln!(output, "{name}");
        }
        output
    }

    /// Formats a reconcile report.
    #[must_use]
    pub fn format_report(&self, report: &ReconcileReport) -> String {
        if !report.has_changes() {
            return format!(
                "{} No changes required - {} are converged ({} unchanged).\n",
                "✓".green(),
                report.document,
                report.unchanged
            );
        }

        let mut output = format!(
            "{} Reconciled {} document {}\n",
            "✓".green(),
            report.document,
            &report.fingerprint[..report.fingerprint.len().min(8)]
        );
        for change in &report.changes {
            let marker = match change.change {
                ChangeKind::Created => "+created".green(),
                ChangeKind::Updated => "~updated".yellow(),
                ChangeKind::Deleted => "-deleted".red(),
            };
            let _ = writeln!(output, "   {marker} {} {}", change.resource, change.name);
        }
        let _ = writeln!(
            output,
            "\n{} created, {} updated, {} deleted, {} unchanged",
            report.created.to_string().green(),
            report.updated.to_string().yellow(),
            report.deleted.to_string().red(),
            report.unchanged
        );
        output
    }
}

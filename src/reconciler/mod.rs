//! Reconciler for converging the gateway onto desired-state documents.
//!
//! Each collection is reconciled with a three-way diff: live entries that are
//! not desired are deleted first, then every desired entry is skipped when
//! unchanged, updated when matched, or created. Parents always converge
//! before their children so the parent id can scope the child calls.

mod consumers;
mod plugins;
mod services;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use tracing::{debug, info};

use crate::config::{DesiredDocument, DocumentHasher, DocumentValidator};
use crate::error::{EnsureError, Result};
use crate::kong::{GatewayVersion, Record, ResourceClient, ResourceKind};

/// Kind of change applied to one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// The resource was created.
    Created,
    /// The resource was updated in place.
    Updated,
    /// The resource was deleted.
    Deleted,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Updated => write!(f, "updated"),
            Self::Deleted => write!(f, "deleted"),
        }
    }
}

/// One applied change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Change {
    /// What happened.
    pub change: ChangeKind,
    /// Resource kind.
    pub resource: &'static str,
    /// Name (or key) of the resource.
    pub name: String,
}

/// Result of reconciling one document.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    /// Kind of the reconciled document.
    pub document: String,
    /// Fingerprint of the document.
    pub fingerprint: String,
    /// Applied changes, in the order they were made.
    pub changes: Vec<Change>,
    /// Number of resources created.
    pub created: usize,
    /// Number of resources updated.
    pub updated: usize,
    /// Number of resources deleted.
    pub deleted: usize,
    /// Number of resources already converged.
    pub unchanged: usize,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
}

impl ReconcileReport {
    /// Returns true if any resource was changed.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }
}

impl fmt::Display for ReconcileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Reconciled {} document {}:",
            self.document,
            &self.fingerprint[..self.fingerprint.len().min(8)]
        )?;
        writeln!(f, "  Created: {}", self.created)?;
        writeln!(f, "  Updated: {}", self.updated)?;
        writeln!(f, "  Deleted: {}", self.deleted)?;
        writeln!(f, "  Unchanged: {}", self.unchanged)?;

        if !self.changes.is_empty() {
            writeln!(f, "  Changes:")?;
            for change in &self.changes {
                writeln!(f, "    - {} {} {}", change.change, change.resource, change.name)?;
            }
        }

        Ok(())
    }
}

/// Running tally of one reconcile.
#[derive(Debug, Default)]
struct Tally {
    changes: Vec<Change>,
    unchanged: usize,
}

impl Tally {
    fn record(&mut self, change: ChangeKind, kind: ResourceKind, name: impl Into<String>) {
        let name = name.into();
        info!("{} {kind}: {name}", capitalized(change));
        self.changes.push(Change {
            change,
            resource: kind.singular(),
            name,
        });
    }

    fn unchanged(&mut self, kind: ResourceKind, name: &str) {
        debug!("{kind} {name} is up to date");
        self.unchanged += 1;
    }

    fn count(&self, change: ChangeKind) -> usize {
        self.changes.iter().filter(|c| c.change == change).count()
    }
}

const fn capitalized(change: ChangeKind) -> &'static str {
    match change {
        ChangeKind::Created => "Created",
        ChangeKind::Updated => "Updated",
        ChangeKind::Deleted => "Deleted",
    }
}

/// Returns the gateway id of a live record.
fn require_id<R: Record>(record: &R) -> Result<&str> {
    record.id().ok_or_else(|| {
        EnsureError::MissingId {
            resource: R::KIND.singular(),
            name: record.label().unwrap_or_default().to_string(),
        }
        .into()
    })
}

/// Folds every orphan plugin document into the first one.
fn merge_plugin_documents(documents: &[DesiredDocument]) -> Vec<DesiredDocument> {
    let mut merged: Vec<DesiredDocument> = Vec::with_capacity(documents.len());
    let mut plugins_at = None;

    for document in documents {
        match (document, plugins_at) {
            (DesiredDocument::Plugins(plugins), Some(at)) => {
                if let Some(DesiredDocument::Plugins(collected)) = merged.get_mut(at) {
                    collected.extend(plugins.iter().cloned());
                }
            }
            (DesiredDocument::Plugins(_), None) => {
                plugins_at = Some(merged.len());
                merged.push(document.clone());
            }
            _ => merged.push(document.clone()),
        }
    }

    if merged.len() < documents.len() {
        debug!("Merged {} plugin documents", documents.len() - merged.len() + 1);
    }
    merged
}

/// Converges the gateway onto desired-state documents.
pub struct Reconciler<'a> {
    /// Admin API access.
    client: &'a ResourceClient,
    /// Version reported by the gateway.
    version: &'a GatewayVersion,
    /// Document hasher.
    hasher: DocumentHasher,
    /// Document validator.
    validator: DocumentValidator,
}

impl<'a> Reconciler<'a> {
    /// Creates a new reconciler.
    #[must_use]
    pub const fn new(client: &'a ResourceClient, version: &'a GatewayVersion) -> Self {
        Self {
            client,
            version,
            hasher: DocumentHasher::new(),
            validator: DocumentValidator::new(),
        }
    }

    /// Validates every document, then reconciles them in order.
    ///
    /// Orphan plugin documents are merged into one collection at the position
    /// of the first, since each is otherwise reconciled as the whole set. No
    /// call is issued unless all documents are valid.
    ///
    /// # Errors
    ///
    /// Returns the first validation error, or the first error raised while
    /// converging; the gateway is left partially converged in that case.
    pub async fn reconcile_all(&self, documents: &[DesiredDocument]) -> Result<Vec<ReconcileReport>> {
        let documents = merge_plugin_documents(documents);
        for document in &documents {
            self.validator.validate(document)?;
        }

        let mut reports = Vec::with_capacity(documents.len());
        for document in &documents {
            reports.push(self.converge(document).await?);
        }
        Ok(reports)
    }

    /// Validates and reconciles one document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed or a call fails.
    pub async fn reconcile(&self, document: &DesiredDocument) -> Result<ReconcileReport> {
        self.validator.validate(document)?;
        self.converge(document).await
    }

    async fn converge(&self, document: &DesiredDocument) -> Result<ReconcileReport> {
        let started_at = Utc::now();
        let fingerprint = self.hasher.hash_document(document);
        info!(
            "Reconciling {} document {}",
            document.kind(),
            self.hasher.short_hash(&fingerprint)
        );

        let mut tally = Tally::default();
        match document {
            DesiredDocument::Services(doc) => self.ensure_services(doc, &mut tally).await?,
            DesiredDocument::Plugins(plugins) => self.ensure_orphan_plugins(plugins, &mut tally).await?,
            DesiredDocument::Consumers(doc) => self.ensure_consumers(doc, &mut tally).await?,
        }

        let report = ReconcileReport {
            document: document.kind().to_string(),
            fingerprint,
            created: tally.count(ChangeKind::Created),
            updated: tally.count(ChangeKind::Updated),
            deleted: tally.count(ChangeKind::Deleted),
            unchanged: tally.unchanged,
            changes: tally.changes,
            started_at,
            finished_at: Utc::now(),
        };

        if report.has_changes() {
            info!(
                "{} converged: {} created, {} updated, {} deleted",
                report.document, report.created, report.updated, report.deleted
            );
        } else {
            info!("No changes required - {} are converged", report.document);
        }
        Ok(report)
    }
}

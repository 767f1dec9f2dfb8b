//! Desired-state document discovery and parsing.
//!
//! `ensure` accepts three kinds of input:
//! - `-`: a services document read from stdin
//! - a directory whose `services/`, `plugins/` and `consumers/` subdirectories
//!   hold documents of that kind
//! - a single file, classified by its file name
//!
//! Variables from the context are substituted into the raw text before the
//! YAML is parsed.

use serde_json::{Map, Value};
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{ConfigError, KongctlError, Result};

use super::document::{DesiredDocument, DocumentKind};
use super::substitute::substitute;

/// Where a document is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    /// Standard input.
    Stdin,
    /// A file on disk.
    File(PathBuf),
}

impl fmt::Display for DocumentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdin => f.write_str("stdin"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// A document waiting to be loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDocument {
    /// Kind the document will be parsed as.
    pub kind: DocumentKind,
    /// Where it comes from.
    pub source: DocumentSource,
}

/// Parser for desired-state documents.
#[derive(Debug, Default)]
pub struct DocumentParser {
    /// Variables substituted into raw text.
    vars: Map<String, Value>,
}

impl DocumentParser {
    /// Creates a parser without variables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the substitution variables.
    #[must_use]
    pub fn with_vars(mut self, vars: Map<String, Value>) -> Self {
        self.vars = vars;
        self
    }

    /// Lists the documents an `ensure` path refers to, in processing order:
    /// services first, then plugins, then consumers.
    ///
    /// # Errors
    ///
    /// Returns an error if the path does not exist or a directory cannot be read.
    pub fn discover(&self, path: &Path) -> Result<Vec<PendingDocument>> {
        if path == Path::new("-") {
            return Ok(vec![PendingDocument {
                kind: DocumentKind::Services,
                source: DocumentSource::Stdin,
            }]);
        }

        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }
            .into());
        }

        if !path.is_dir() {
            return Ok(vec![PendingDocument {
                kind: DocumentKind::classify(path),
                source: DocumentSource::File(path.to_path_buf()),
            }]);
        }

        let mut pending = Vec::new();
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            let dir = entry.path();
            if !dir.is_dir() {
                continue;
            }
            let Some(kind) = DocumentKind::from_directory(&entry.file_name().to_string_lossy()) else {
                debug!("Skipping directory {}", dir.display());
                continue;
            };
            for file in std::fs::read_dir(&dir)? {
                let file = file?.path();
                if file.is_file() {
                    pending.push(PendingDocument {
                        kind,
                        source: DocumentSource::File(file),
                    });
                }
            }
        }

        pending.sort_by(|a, b| {
            a.kind
                .cmp(&b.kind)
                .then_with(|| a.source.to_string().cmp(&b.source.to_string()))
        });
        debug!("Discovered {} document(s) under {}", pending.len(), path.display());
        Ok(pending)
    }

    /// Reads and parses one pending document.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read or parsed.
    pub fn load(&self, pending: &PendingDocument) -> Result<DesiredDocument> {
        info!("Processing {}: {}", pending.kind, pending.source);

        let content = match &pending.source {
            DocumentSource::Stdin => {
                let mut content = String::new();
                std::io::stdin().read_to_string(&mut content)?;
                content
            }
            DocumentSource::File(path) => std::fs::read_to_string(path).map_err(|e| {
                ConfigError::parse(format!("Failed to read file: {e}"), path.display().to_string())
            })?,
        };

        self.parse_str(&content, pending.kind, &pending.source.to_string())
    }

    /// Discovers and parses every document under a path.
    ///
    /// # Errors
    ///
    /// Returns the first discovery, read or parse error.
    pub fn load_all(&self, path: &Path) -> Result<Vec<DesiredDocument>> {
        self.discover(path)?
            .iter()
            .map(|pending| self.load(pending))
            .collect()
    }

    /// Substitutes variables into raw text and parses it as a document.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid or does not have the kind's shape.
    pub fn parse_str(&self, content: &str, kind: DocumentKind, location: &str) -> Result<DesiredDocument> {
        let substituted = substitute(content, &self.vars);
        let yaml_error =
            |e: serde_yaml::Error| KongctlError::from(ConfigError::parse(format!("YAML parse error: {e}"), location));

        let document = match kind {
            DocumentKind::Services => DesiredDocument::Services(serde_yaml::from_str(&substituted).map_err(yaml_error)?),
            DocumentKind::Plugins => DesiredDocument::Plugins(serde_yaml::from_str(&substituted).map_err(yaml_error)?),
            DocumentKind::Consumers => {
                DesiredDocument::Consumers(serde_yaml::from_str(&substituted).map_err(yaml_error)?)
            }
        };

        debug!("Parsed {kind} document from {location}");
        Ok(document)
    }
}

//! Configuration module for kongctl.
//!
//! This module handles all configuration-related functionality:
//! - Context files with connection settings and substitution variables
//! - Discovering, substituting and parsing desired-state documents
//! - Validation of documents before any mutation
//! - Document fingerprints for reconcile reports

mod context;
mod document;
mod hash;
mod parser;
mod substitute;
mod validator;

pub use context::{
    AuthSettings, ClientSettings, Context, CONTEXT_DIR, DEFAULT_ADDITIONAL_TIME_SECS,
    DEFAULT_SERVER, DEFAULT_TIMEOUT_SECS,
};
pub use document::{
    ConsumerEntry, ConsumersDocument, DesiredDocument, DocumentKind, ServiceEntry,
    ServicesDocument,
};
pub use hash::DocumentHasher;
pub use parser::{DocumentParser, DocumentSource, PendingDocument};
pub use substitute::substitute;
pub use validator::{DocumentValidator, ValidationError, ValidationResult};

// ============================================================================
// Strict linting
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention
#![warn(dead_code)]                   // Unused code
#![warn(unused_imports)]              // Unused imports
#![warn(unused_variables)]            // Unused variables
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]
#![warn(clippy::print_stdout)]
#![warn(clippy::todo)]
#![warn(clippy::unimplemented)]
#![warn(clippy::unwrap_in_result)]
#![warn(clippy::redundant_clone)]
#![warn(clippy::cognitive_complexity)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

// Safety and robustness lints
#![deny(overflowing_literals)]
#![deny(arithmetic_overflow)]

// ============================================================================
// Crate Documentation
// ============================================================================

//! # kongctl
//!
//! A command-line client for the Kong API Gateway admin API, with
//! declarative and idempotent reconciliation.
//!
//! ## Overview
//!
//! kongctl lets you:
//!
//! - List, get, create, update and delete services, routes, plugins,
//!   consumers and consumer credentials
//! - Export live state as desired-state documents, or dump it to files
//! - Converge the gateway onto desired-state documents with `ensure`
//!
//! ## Architecture
//!
//! 1. **Desired State**: services and consumers documents in YAML
//! 2. **Observed State**: queried from the admin API, page by page
//! 3. **Reconciler**: three-way diff per collection, deletes first, parents
//!    before children
//!
//! ## Modules
//!
//! - [`config`]: Context files, document loading and validation
//! - [`kong`]: Admin API transport, typed records and the resource client
//! - [`planner`]: Canonical normalization and the three-way diff
//! - [`reconciler`]: The `ensure` engine
//! - [`exporter`]: Live state as documents, snapshots and dumps
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! service_group: payments
//! services:
//!   - name: billing
//!     url: http://billing.internal:8080/v1
//!     routes:
//!       - name: invoices
//!         paths: ["/invoices"]
//!     plugins:
//!       - name: rate-limiting
//!         config:
//!           minute: 100
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod error;
pub mod exporter;
pub mod kong;
pub mod planner;
pub mod reconciler;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{Context, DesiredDocument, DocumentParser, DocumentValidator};
pub use error::{KongctlError, Result};
pub use exporter::Exporter;
pub use kong::{GatewayVersion, KongClient, ResourceClient, ResourceKind, Scope};
pub use planner::{canonical, normalize, three_way};
pub use reconciler::{ReconcileReport, Reconciler};

//! Kong admin API access.
//!
//! This module provides:
//! - The [`Transport`] seam and its reqwest implementation [`KongClient`]
//! - Typed records for services, routes, plugins, consumers and credentials
//! - The [`ResourceClient`] that addresses, paginates and caches them
//! - Gateway version detection

mod client;
#[cfg(test)]
pub(crate) mod fake;
mod resource;
mod transport;
mod types;
mod version;

pub use client::KongClient;
pub use resource::{ResourceClient, ResourceKind, Scope};
pub use transport::{ApiRequest, ApiResponse, Method, ResponseBody, Transport};
pub use types::{
    Consumer, ForeignKey, Jwt, KeyAuth, Plugin, PluginKey, Record, Route, Service, ServiceUrl,
    SYNTHETIC_ROUTE_SUFFIX, decode, synthetic_name,
};
pub use version::GatewayVersion;

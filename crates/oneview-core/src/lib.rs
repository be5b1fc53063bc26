//! # oneview-core
//!
//! Generic resource access for the OneView REST API.
//!
//! Every appliance collection follows the same protocol: members addressed by id or
//! URI below a base path, paginated collection reads, and mutations that may finish
//! asynchronously as tasks. This crate implements that protocol once so that
//! per-resource wrappers only declare a base URI and their own endpoints.
//!
//! ## Modules
//!
//! - [`error`] - Error types and HTTP status code mapping
//! - [`types`] - Entities, pages, task handles and request options
//! - [`uri`] - Resource URI validation and derivation
//! - [`query`] - Ordered, percent-encoded query strings
//! - [`connection`] - The transport trait the resource layer talks to
//! - [`task`] - Waiting on asynchronous appliance tasks
//! - [`resource`] - The generic CRUD and collection client
//! - [`facade`] - A stateful wrapper around one entity
//! - [`config`] - Appliance connection settings
//! - [`client`] - The reqwest-backed transport and retry policy

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod facade;
pub mod query;
pub mod resource;
pub mod task;
pub mod types;
pub mod uri;

// Re-export commonly used types
pub use client::HttpConnection;
pub use config::{Credentials, OneViewConfig};
pub use connection::Connection;
pub use error::{Error, Result};
pub use facade::Resource;
pub use query::{QuerySpec, UtilizationQuery};
pub use resource::{ResourceClient, ResourceRef};
pub use task::{TaskMonitor, TaskOutcome};
pub use types::{
    merge_default_values, CustomHeaders, Entity, RequestOptions, Response, TaskHandle, Timeout,
};
pub use uri::UriResolver;

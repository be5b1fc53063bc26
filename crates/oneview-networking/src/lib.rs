//! Networking resources for the OneView REST API.
//!
//! Thin wrappers over the generic resource layer of `oneview-core`: each declares its
//! collection URI and the endpoints that only it exposes.

#![deny(missing_docs)]

pub mod client;
pub mod fcoe_networks;
pub mod interconnects;

pub use client::OneViewClient;
pub use fcoe_networks::FcoeNetworks;
pub use interconnects::Interconnect;

/// Convenient result alias sharing the `oneview-core` error type.
pub type Result<T> = oneview_core::Result<T>;

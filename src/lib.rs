//! # Blade Provider Library
//!
//! The provider layer of a virtual blade cluster: it turns a declarative,
//! class-based configuration of virtual blades (compute instances) and blade
//! interconnects (networks) into concrete resource records, hands them to a
//! provisioning backend, and exposes the resulting topology to higher layers.
//!
//! ## Quick Example
//!
//! ```
//! use blade_provider::config::{parse_document, ProviderConfig};
//!
//! let document = parse_document(r#"
//! organization: {name: acme}
//! project: {base_name: lab}
//! blade_interconnects:
//!   base-net: {network_name: cluster, ipv4_cidr: 10.0.0.0/24}
//! virtual_blades:
//!   base:
//!     pure_base_class: true
//!     machine_type: n1-standard-4
//!     hostname: node
//!     count: 1
//!     blade_interconnect: {subnetwork: cluster}
//!   compute:
//!     parent_class: base
//!     count: 3
//! "#).unwrap();
//!
//! let config = ProviderConfig::resolve(&document).unwrap();
//! let names: Vec<_> = config.blades().iter().map(|b| b.name.as_str()).collect();
//! assert_eq!(names, ["node-1", "node-2", "node-3"]);
//! ```
//!
//! ## Core Concepts
//!
//! - **Deep merge (`merge`)**: layers one configuration value onto another,
//!   with a deletion sentinel for dropping inherited mapping entries.
//! - **Classes (`classes`)**: `parent_class` chains flattened into resolved
//!   classes, with cycle and unknown-parent detection.
//! - **Instances (`instances`)**: resolved classes expanded into named,
//!   addressed resource records.
//! - **Configuration (`config`)**: document loading, overlays and the
//!   immutable [`config::ProviderConfig`].
//! - **Facade (`provider`)**: lifecycle operations over the provisioning
//!   backend (`backend`), the cloud CLI (`cloud`) and secrets (`secrets`).

pub mod backend;
pub mod classes;
pub mod cloud;
pub mod config;
pub mod error;
pub mod instances;
pub mod merge;
pub mod output;
pub mod process;
pub mod provider;
pub mod render;
pub mod secrets;

#[cfg(test)]
mod merge_proptest;

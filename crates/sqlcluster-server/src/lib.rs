//! sqlcluster server
//!
//! HTTP front end of a replicated SQL service: query dispatch with leader
//! forwarding, cluster membership, configuration, logging and startup.

pub mod api;
pub mod error;
pub mod metrics;
pub mod model;
pub mod service;
pub mod startup;

#[cfg(test)]
pub(crate) mod test_support;

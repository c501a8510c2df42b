//! Integration Tests for the Multinode Pool
//!
//! This crate contains various test modules:
//!
//! - `config_builder_tests`: node validation and pool configuration, from code and from TOML
//! - `health_monitor_tests`: probe-driven state transitions observed through a running pool
//! - `selection_tests`: the four selection modes against live monitor state
//! - `lease_tests`: sticky leases, expiry and early revocation
//! - `pool_lifecycle_tests`: start, call dispatch, failure reporting and bounded close
//! - `http_transport_tests`: the HTTP JSON-RPC transport against mockito endpoints
//! - `mock_infrastructure`: reusable scripted transports and RPC mocks
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --package tests
//! ```

#![allow(clippy::expect_used)]


#[cfg(test)]
mod health_monitor_tests;

#[cfg(test)]
mod selection_tests;



#[cfg(test)]
mod http_transport_tests;

/// Mock infrastructure for testing
pub mod mock_infrastructure;

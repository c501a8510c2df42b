//! Mock Infrastructure for Testing the Node Pool
//!
//! Reusable mocks for exercising the pool without real RPC endpoints.
//!
//! ## Components
//!
//! - `MockTransport` / `MockTransportFactory`: scripted in-memory transports with probe and
//!   call counters
//! - `RpcMockBuilder`: wraps mockito to serve the JSON-RPC methods the HTTP transport uses
//! - Test helpers for building, starting and observing pools
//!
//! ## Usage
//!
//! ```ignore
//! use tests::mock_infrastructure::{node_config, start_pool, test_configs, MockTransportFactory};
//!
//! let factory = MockTransportFactory::new();
//! factory.transport("a").set_head(100);
//! let pool = start_pool(test_configs("HighestHead", vec![node_config("a")]), &factory);
//! ```

pub mod mock_transport;

pub use mock_transport::{CallBehavior, MockTransport, MockTransportFactory, ProbeBehavior};
pub use rpc_mock::RpcMockBuilder;
pub use test_helpers::*;

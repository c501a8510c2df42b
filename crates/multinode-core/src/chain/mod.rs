//! Pool-wide view of the chain.
//!
//! [`ChainHead`] keeps the latest head each node in the pool has reported. Every health
//! monitor writes its node's slot after a successful head probe, and reads the current
//! maximum when deciding whether a syncing node is too far behind.
//!
//! ```text
//!   monitor(a) ──observe(0, 120)──┐
//!   monitor(b) ──observe(1, 118)──┼──► ChainHead [120, 118, 95] ──► highest 120 ──► sync lag check
//!   monitor(c) ──observe(2, 95) ──┘
//! ```
//!
//! Each pool owns one instance inside the state its monitors share. There is no global.

pub mod state;

pub use state::ChainHead;

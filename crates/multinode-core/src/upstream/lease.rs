//! Sticky caller-to-node leases.
//!
//! A lease pins a caller context to the node it was last given until the lease expires or the
//! node leaves `Alive`. Leases are keyed by caller-supplied strings and stored in a `DashMap`,
//! so concurrent callers only contend when they share a shard.

use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

/// A single pinning of a caller to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lease {
    /// Index of the node in the pool's node array.
    pub node: usize,
    pub expires_at: Instant,
}

/// Holds active leases. Disabled when constructed with a zero duration.
#[derive(Debug)]
pub struct LeaseManager {
    duration: Duration,
    leases: DashMap<String, Lease>,
}

impl LeaseManager {
    #[must_use]
    pub fn new(duration: Duration) -> Self {
        Self { duration, leases: DashMap::new() }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.duration.is_zero()
    }

    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Returns the node leased to `caller`, if the lease is still valid.
    ///
    /// Expired leases are removed here rather than by a background sweeper.
    #[must_use]
    pub fn get(&self, caller: &str) -> Option<usize> {
        if !self.is_enabled() {
            return None;
        }

        let now = Instant::now();
        let lease = self.leases.get(caller).map(|entry| *entry.value());
        match lease {
            Some(lease) if lease.expires_at > now => Some(lease.node),
            Some(_) => {
                self.leases.remove_if(caller, |_, lease| lease.expires_at <= now);
                trace!(caller, "lease expired");
                None
            }
            None => None,
        }
    }

    /// Pins `caller` to `node` for the configured duration, replacing any previous lease.
    ///
    /// Returns the expiry, or `None` when leasing is disabled.
    pub fn grant(&self, caller: &str, node: usize) -> Option<Instant> {
        if !self.is_enabled() {
            return None;
        }

        let expires_at = Instant::now() + self.duration;
        self.leases.insert(caller.to_string(), Lease { node, expires_at });
        trace!(caller, node, "lease granted");
        Some(expires_at)
    }

    /// Drops the lease held by `caller`. Returns `true` if one existed.
    pub fn revoke(&self, caller: &str) -> bool {
        self.leases.remove(caller).is_some()
    }

    /// Drops every lease pointing at `node`. Returns how many were removed.
    pub fn revoke_node(&self, node: usize) -> usize {
        let mut removed = 0;
        self.leases.retain(|_, lease| {
            let keep = lease.node != node;
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    /// Number of leases that have not yet expired.
    #[must_use]
    pub fn active_leases(&self) -> usize {
        let now = Instant::now();
        self.leases.iter().filter(|entry| entry.expires_at > now).count()
    }

    pub fn clear(&self) {
        self.leases.clear();
    }
}

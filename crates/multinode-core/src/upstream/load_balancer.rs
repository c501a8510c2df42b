use std::{cmp::Ordering, sync::Arc};

use parking_lot::Mutex;

use crate::{
    types::{Node, SelectionMode},
    upstream::health::NodeHealth,
};

/// Picks one alive node per request according to the pool's [`SelectionMode`].
///
/// Selection works on a snapshot of every node's published health, so it never waits for a
/// monitor. Only round-robin keeps state between calls: the position of the previous pick in
/// the `(order, name)`-sorted node list.
#[derive(Debug)]
pub struct NodeSelector {
    mode: SelectionMode,
    /// Node indices sorted by ascending order, then name.
    rotation: Box<[usize]>,
    last_pick: Mutex<Option<usize>>,
}

impl NodeSelector {
    #[must_use]
    pub fn new(mode: SelectionMode, nodes: &[Arc<Node>]) -> Self {
        let mut rotation: Vec<usize> = (0..nodes.len()).collect();
        rotation.sort_by(|&a, &b| by_priority(&nodes[a], &nodes[b]));
        Self { mode, rotation: rotation.into_boxed_slice(), last_pick: Mutex::new(None) }
    }

    #[must_use]
    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    /// Returns the index of the node to use, or `None` if no node is alive.
    ///
    /// `nodes` and `health` are parallel slices indexed by node position.
    pub fn select(&self, nodes: &[Arc<Node>], health: &[Arc<NodeHealth>]) -> Option<usize> {
        debug_assert_eq!(nodes.len(), health.len());

        let alive = move || (0..nodes.len()).filter(move |&i| health[i].state.is_alive());

        let picked = match self.mode {
            SelectionMode::HighestHead => {
                alive().min_by(|&a, &b| by_head(nodes, health, a, b))
            }
            SelectionMode::PriorityLevel => {
                alive().min_by(|&a, &b| by_priority(&nodes[a], &nodes[b]))
            }
            SelectionMode::TotalDifficulty => {
                if alive().any(|i| health[i].last_difficulty.is_some()) {
                    alive().min_by(|&a, &b| {
                        health[b]
                            .last_difficulty
                            .cmp(&health[a].last_difficulty)
                            .then_with(|| by_priority(&nodes[a], &nodes[b]))
                    })
                } else {
                    alive().min_by(|&a, &b| by_head(nodes, health, a, b))
                }
            }
            SelectionMode::RoundRobin => self.next_in_rotation(health),
        };

        tracing::trace!(mode = %self.mode, picked = ?picked, "node selection");
        picked
    }

    fn next_in_rotation(&self, health: &[Arc<NodeHealth>]) -> Option<usize> {
        let len = self.rotation.len();
        if len == 0 {
            return None;
        }

        let mut last_pick = self.last_pick.lock();
        let start = last_pick.map_or(0, |position| position + 1);

        for offset in 0..len {
            let position = (start + offset) % len;
            let index = self.rotation[position];
            if health[index].state.is_alive() {
                *last_pick = Some(position);
                return Some(index);
            }
        }

        None
    }
}

/// Smaller order first, then lexicographically smaller name.
fn by_priority(a: &Node, b: &Node) -> Ordering {
    a.order().cmp(&b.order()).then_with(|| a.name().cmp(b.name()))
}

/// Higher head first, then [`by_priority`].
fn by_head(nodes: &[Arc<Node>], health: &[Arc<NodeHealth>], a: usize, b: usize) -> Ordering {
    health[b]
        .last_head_height
        .cmp(&health[a].last_head_height)
        .then_with(|| by_priority(&nodes[a], &nodes[b]))
}

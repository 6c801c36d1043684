//! Predecessor/dependent bookkeeping shared by flakes and attach points.
//!
//! Nodes are registered once, each naming predecessors that are already
//! registered, so the graph cannot contain a cycle. After registration the
//! only mutation is [`DependencyGraph::remove_edges`], which clears a node out
//! of the graph and reports which dependents became ready as a result.

use slotmap::{Key, SecondaryMap};
use std::collections::BTreeSet;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur while wiring a dependency graph.
#[derive(Debug, thiserror::Error)]
pub enum GraphError<K: Key> {
    #[error("node {0:?} is already registered")]
    DuplicateNode(K),
    #[error("node {0:?} cannot depend on itself")]
    SelfDependency(K),
    #[error("node {node:?} depends on unregistered node {predecessor:?}")]
    UnknownPredecessor { node: K, predecessor: K },
    #[error("node {node:?} depends on {predecessor:?}, which has already been cleared")]
    PredecessorCleared { node: K, predecessor: K },
}

// ---------------------------------------------------------------------------
// Graph
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct NodeEdges<K: Key + Ord> {
    /// Nodes that must be cleared before this one is ready.
    predecessors: BTreeSet<K>,
    /// Nodes that list this one as a predecessor. Used only to propagate
    /// removal.
    dependents: BTreeSet<K>,
    /// Predecessor count at registration time. Never changes.
    initial: usize,
    /// Set once `remove_edges` has run for this node.
    cleared: bool,
}

/// Progress of a node through its dependency list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DependencyProgress {
    pub initial: usize,
    pub remaining: usize,
}

impl DependencyProgress {
    /// Share of the initial predecessors that have been cleared. A node that
    /// started without predecessors is fully complete.
    pub fn removed_ratio(&self) -> f32 {
        if self.initial == 0 {
            return 1.0;
        }
        let removed = self.initial.saturating_sub(self.remaining);
        removed as f32 / self.initial as f32
    }
}

/// A directed acyclic predecessor graph over arena keys.
#[derive(Debug, Clone)]
pub struct DependencyGraph<K: Key + Ord> {
    nodes: SecondaryMap<K, NodeEdges<K>>,
}

impl<K: Key + Ord> DependencyGraph<K> {
    /// An empty graph.
    pub fn new() -> Self {
        Self {
            nodes: SecondaryMap::new(),
        }
    }

    /// Register `node` with the given predecessors. Duplicate predecessors
    /// are collapsed. Every predecessor must already be registered and not
    /// yet cleared.
    pub fn insert(&mut self, node: K, predecessors: &[K]) -> Result<(), GraphError<K>> {
        if self.nodes.contains_key(node) {
            return Err(GraphError::DuplicateNode(node));
        }

        let mut set = BTreeSet::new();
        for &predecessor in predecessors {
            if predecessor == node {
                return Err(GraphError::SelfDependency(node));
            }
            match self.nodes.get(predecessor) {
                None => return Err(GraphError::UnknownPredecessor { node, predecessor }),
                Some(edges) if edges.cleared => {
                    return Err(GraphError::PredecessorCleared { node, predecessor });
                }
                Some(_) => {}
            }
            set.insert(predecessor);
        }

        for &predecessor in &set {
            if let Some(edges) = self.nodes.get_mut(predecessor) {
                edges.dependents.insert(node);
            }
        }

        self.nodes.insert(
            node,
            NodeEdges {
                initial: set.len(),
                predecessors: set,
                dependents: BTreeSet::new(),
                cleared: false,
            },
        );
        Ok(())
    }

    /// Whether the node has been registered.
    pub fn contains(&self, node: K) -> bool {
        self.nodes.contains_key(node)
    }

    /// True iff the node is registered and has no remaining predecessors.
    pub fn is_ready(&self, node: K) -> bool {
        self.nodes
            .get(node)
            .is_some_and(|edges| edges.predecessors.is_empty())
    }

    /// True once [`Self::remove_edges`] has run for this node.
    pub fn is_cleared(&self, node: K) -> bool {
        self.nodes.get(node).is_some_and(|edges| edges.cleared)
    }

    /// Predecessors not yet cleared.
    pub fn remaining(&self, node: K) -> usize {
        self.nodes
            .get(node)
            .map_or(0, |edges| edges.predecessors.len())
    }

    /// Predecessor count at registration.
    pub fn initial(&self, node: K) -> usize {
        self.nodes.get(node).map_or(0, |edges| edges.initial)
    }

    /// Initial and remaining predecessor counts.
    pub fn progress(&self, node: K) -> DependencyProgress {
        DependencyProgress {
            initial: self.initial(node),
            remaining: self.remaining(node),
        }
    }

    /// Predecessors not yet cleared, in key order.
    pub fn predecessors(&self, node: K) -> impl Iterator<Item = K> + '_ {
        self.nodes
            .get(node)
            .into_iter()
            .flat_map(|edges| edges.predecessors.iter().copied())
    }

    /// Nodes still waiting on this one, in key order.
    pub fn dependents(&self, node: K) -> impl Iterator<Item = K> + '_ {
        self.nodes
            .get(node)
            .into_iter()
            .flat_map(|edges| edges.dependents.iter().copied())
    }

    /// Clear `node` out of the graph: drop it from every dependent's
    /// predecessor set and from every predecessor's dependent set, then empty
    /// its own sets.
    ///
    /// Returns the dependents that became ready because of this removal, in
    /// key order. Calling it again for the same node returns nothing.
    pub fn remove_edges(&mut self, node: K) -> Vec<K> {
        let Some(edges) = self.nodes.get_mut(node) else {
            return Vec::new();
        };
        if edges.cleared {
            return Vec::new();
        }
        edges.cleared = true;
        let dependents = std::mem::take(&mut edges.dependents);
        let predecessors = std::mem::take(&mut edges.predecessors);

        for predecessor in predecessors {
            if let Some(edges) = self.nodes.get_mut(predecessor) {
                edges.dependents.remove(&node);
            }
        }

        let mut ready = Vec::new();
        for dependent in dependents {
            if let Some(edges) = self.nodes.get_mut(dependent)
                && edges.predecessors.remove(&node)
                && edges.predecessors.is_empty()
                && !edges.cleared
            {
                ready.push(dependent);
            }
        }
        ready
    }

    /// Number of registered nodes, cleared or not.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether no node has been registered.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl<K: Key + Ord> Default for DependencyGraph<K> {
    fn default() -> Self {
        Self::new()
    }
}

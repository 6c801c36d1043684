//! Scene-graph intents.
//!
//! The core never owns scene memory. Detaching a flake or fixing a part into
//! a haft is expressed as calls on a [`SceneMutator`], implemented by the host
//! engine. [`HeadlessScene`] is a small in-memory implementation used by tests
//! and by the replay tool.

use crate::geometry::Pose;
use crate::id::{ColliderId, PrefabId, SceneNodeId};
use std::collections::BTreeMap;

/// Operations the core issues against the host scene graph.
pub trait SceneMutator {
    /// Instantiate `prefab` at `pose` as a new root node. The instance starts
    /// inactive so that children can be attached before it wakes up.
    fn instantiate_from(&mut self, prefab: PrefabId, pose: Pose) -> SceneNodeId;

    /// Move `child` under `new_parent` (or to the root), keeping its world pose.
    fn reparent(&mut self, child: SceneNodeId, new_parent: Option<SceneNodeId>);

    fn world_pose(&self, node: SceneNodeId) -> Pose;

    /// Set a node's world pose. Descendants follow.
    fn set_world_pose(&mut self, node: SceneNodeId, pose: Pose);

    fn rename(&mut self, node: SceneNodeId, name: &str);

    fn set_active(&mut self, node: SceneNodeId, active: bool);

    /// Stop routing contacts on `colliders` to the interactable rooted at
    /// `interactable`.
    fn unregister_colliders(&mut self, interactable: SceneNodeId, colliders: &[ColliderId]);

    /// Strip interaction and physical dynamics from a node; it becomes fixed
    /// to its parent for good.
    fn make_static(&mut self, node: SceneNodeId);
}

// ---------------------------------------------------------------------------
// HeadlessScene
// ---------------------------------------------------------------------------

/// A node in a [`HeadlessScene`].
#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub name: String,
    pub parent: Option<SceneNodeId>,
    pub pose: Pose,
    pub active: bool,
    /// Grabbable and simulated by physics. Cleared by `make_static`.
    pub dynamic: bool,
    /// Prefab this node was instantiated from, if any.
    pub prefab: Option<PrefabId>,
    /// Colliders routed to this node as an interactable.
    pub colliders: Vec<ColliderId>,
}

impl SceneNode {
    fn new(name: &str, pose: Pose) -> Self {
        Self {
            name: name.to_string(),
            parent: None,
            pose,
            active: true,
            dynamic: true,
            prefab: None,
            colliders: Vec::new(),
        }
    }
}

/// In-memory scene graph with world-space poses.
///
/// Unknown nodes report an identity pose and ignore mutations, so the core
/// can be driven against a partially populated scene.
#[derive(Debug, Clone, Default)]
pub struct HeadlessScene {
    nodes: BTreeMap<SceneNodeId, SceneNode>,
}

impl HeadlessScene {
    /// An empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a root node with a host-chosen id. Replaces any existing node.
    pub fn insert(&mut self, id: SceneNodeId, name: &str, pose: Pose) -> SceneNodeId {
        self.nodes.insert(id, SceneNode::new(name, pose));
        id
    }

    /// Insert a root node with the next free id.
    pub fn spawn(&mut self, name: &str, pose: Pose) -> SceneNodeId {
        let id = self.next_id();
        self.insert(id, name, pose)
    }

    /// Insert a node under `parent` with the next free id.
    pub fn spawn_child(&mut self, parent: SceneNodeId, name: &str, pose: Pose) -> SceneNodeId {
        let id = self.spawn(name, pose);
        if let Some(node) = self.nodes.get_mut(&id) {
            node.parent = Some(parent);
        }
        id
    }

    /// Route `collider` to `node` as an interactable.
    pub fn add_collider(&mut self, node: SceneNodeId, collider: ColliderId) {
        if let Some(node) = self.nodes.get_mut(&node) {
            node.colliders.push(collider);
        }
    }

    /// Look up a node.
    pub fn node(&self, id: SceneNodeId) -> Option<&SceneNode> {
        self.nodes.get(&id)
    }

    /// Parent of a node, or `None` for roots and unknown nodes.
    pub fn parent_of(&self, id: SceneNodeId) -> Option<SceneNodeId> {
        self.nodes.get(&id).and_then(|node| node.parent)
    }

    /// Direct children of a node.
    pub fn children_of(&self, id: SceneNodeId) -> impl Iterator<Item = SceneNodeId> + '_ {
        self.nodes
            .iter()
            .filter(move |(_, node)| node.parent == Some(id))
            .map(|(child, _)| *child)
    }

    /// Number of nodes in the scene.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the scene has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// One past the highest id in use. When the host has taken
    /// `u64::MAX`, falls back to the lowest unused id.
    fn next_id(&self) -> SceneNodeId {
        let Some(last) = self.nodes.keys().next_back() else {
            return SceneNodeId(1);
        };
        if let Some(next) = last.0.checked_add(1) {
            return SceneNodeId(next);
        }
        let mut candidate = 1;
        for id in self.nodes.keys() {
            if id.0 > candidate {
                break;
            }
            if id.0 == candidate {
                candidate += 1;
            }
        }
        SceneNodeId(candidate)
    }

    fn descendants(&self, root: SceneNodeId) -> Vec<SceneNodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(current) = stack.pop() {
            for child in self.children_of(current) {
                out.push(child);
                stack.push(child);
            }
        }
        out
    }

    fn is_ancestor(&self, ancestor: SceneNodeId, mut node: SceneNodeId) -> bool {
        while let Some(parent) = self.parent_of(node) {
            if parent == ancestor {
                return true;
            }
            node = parent;
        }
        false
    }
}

impl SceneMutator for HeadlessScene {
    fn instantiate_from(&mut self, prefab: PrefabId, pose: Pose) -> SceneNodeId {
        let id = self.spawn("", pose);
        if let Some(node) = self.nodes.get_mut(&id) {
            node.active = false;
            node.prefab = Some(prefab);
        }
        id
    }

    fn reparent(&mut self, child: SceneNodeId, new_parent: Option<SceneNodeId>) {
        if let Some(parent) = new_parent
            && (parent == child || self.is_ancestor(child, parent))
        {
            tracing::warn!(?child, ?parent, "refusing to reparent a node under itself");
            return;
        }
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = new_parent;
        }
    }

    fn world_pose(&self, node: SceneNodeId) -> Pose {
        self.nodes.get(&node).map_or(Pose::IDENTITY, |node| node.pose)
    }

    fn set_world_pose(&mut self, node: SceneNodeId, pose: Pose) {
        let Some(old) = self.nodes.get(&node).map(|n| n.pose) else {
            return;
        };
        // Carry descendants along: keep their pose relative to `node`.
        let delta = pose.compose(old.inverse());
        for descendant in self.descendants(node) {
            if let Some(child) = self.nodes.get_mut(&descendant) {
                child.pose = delta.compose(child.pose);
            }
        }
        if let Some(target) = self.nodes.get_mut(&node) {
            target.pose = pose;
        }
    }

    fn rename(&mut self, node: SceneNodeId, name: &str) {
        if let Some(node) = self.nodes.get_mut(&node) {
            node.name = name.to_string();
        }
    }

    fn set_active(&mut self, node: SceneNodeId, active: bool) {
        if let Some(node) = self.nodes.get_mut(&node) {
            node.active = active;
        }
    }

    fn unregister_colliders(&mut self, interactable: SceneNodeId, colliders: &[ColliderId]) {
        if let Some(node) = self.nodes.get_mut(&interactable) {
            node.colliders.retain(|c| !colliders.contains(c));
        }
    }

    fn make_static(&mut self, node: SceneNodeId) {
        if let Some(node) = self.nodes.get_mut(&node) {
            node.dynamic = false;
        }
    }
}

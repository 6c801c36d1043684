use crate::capability::{AdhesivePart, AttachedPart, FlakePart};
use crate::id::{AttachPointId, ColliderId, SceneNodeId};
use crate::sim::Ticks;
use std::collections::HashMap;

/// Authored configuration for one haft.
#[derive(Debug, Clone, PartialEq)]
pub struct HandleConfig {
    pub name: String,
    /// Scene node of the haft; its interactable owns the attach triggers.
    pub node: SceneNodeId,
}

impl HandleConfig {
    /// A handle with no attach points yet.
    pub fn new(name: impl Into<String>, node: SceneNodeId) -> Self {
        Self {
            name: name.into(),
            node,
        }
    }
}

/// A part fixed into one attach point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Joint {
    pub attach_point: AttachPointId,
    pub part: AttachedPart,
    pub tick: Ticks,
}

/// Aggregate owner of the attach points of one haft. Keeps the joint record
/// and routes trigger contacts to pending points.
#[derive(Debug, Clone)]
pub struct Handle {
    name: String,
    node: SceneNodeId,
    points: Vec<AttachPointId>,
    trigger_routes: HashMap<ColliderId, AttachPointId>,
    adhesives: Vec<AdhesivePart>,
    flakes: Vec<FlakePart>,
    joints: Vec<Joint>,
}

impl Handle {
    pub(crate) fn from_config(config: HandleConfig) -> Self {
        Self {
            name: config.name,
            node: config.node,
            points: Vec::new(),
            trigger_routes: HashMap::new(),
            adhesives: Vec::new(),
            flakes: Vec::new(),
            joints: Vec::new(),
        }
    }

    /// The authored name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Scene node of the haft.
    pub fn node(&self) -> SceneNodeId {
        self.node
    }

    /// Every attach point of this haft, in registration order.
    pub fn attach_points(&self) -> &[AttachPointId] {
        &self.points
    }

    /// Adhesive lumps fixed into this haft, in attach order.
    pub fn adhesives(&self) -> &[AdhesivePart] {
        &self.adhesives
    }

    /// Flakes fixed into this haft, in attach order.
    pub fn flakes(&self) -> &[FlakePart] {
        &self.flakes
    }

    /// Joints in the order they were made.
    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    /// Every attach point is filled.
    pub fn is_complete(&self) -> bool {
        !self.points.is_empty() && self.joints.len() == self.points.len()
    }

    /// The pending point listening on `collider`, if any.
    pub fn point_for_trigger(&self, collider: ColliderId) -> Option<AttachPointId> {
        self.trigger_routes.get(&collider).copied()
    }

    pub(crate) fn routes_trigger(&self, collider: ColliderId) -> bool {
        self.trigger_routes.contains_key(&collider)
    }

    /// Whether the scene node is already fixed into this haft.
    pub fn holds_part(&self, node: SceneNodeId) -> bool {
        self.joints.iter().any(|joint| joint.part.node() == node)
    }

    pub(crate) fn register_point(&mut self, id: AttachPointId, triggers: &[ColliderId]) {
        self.points.push(id);
        for &collider in triggers {
            self.trigger_routes.insert(collider, id);
        }
    }

    pub(crate) fn attach_adhesive(&mut self, point: AttachPointId, part: AdhesivePart, tick: Ticks) {
        self.adhesives.push(part);
        self.joints.push(Joint {
            attach_point: point,
            part: AttachedPart::Adhesive(part),
            tick,
        });
    }

    pub(crate) fn attach_flake(&mut self, point: AttachPointId, part: FlakePart, tick: Ticks) {
        self.flakes.push(part);
        self.joints.push(Joint {
            attach_point: point,
            part: AttachedPart::Flake(part),
            tick,
        });
    }

    /// Stop routing the given triggers; the point they fed is torn down.
    pub(crate) fn drop_triggers(&mut self, triggers: &[ColliderId]) {
        for collider in triggers {
            self.trigger_routes.remove(collider);
        }
    }
}

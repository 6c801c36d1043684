use crate::geometry::Pose;
use crate::id::{ColliderId, FlakeId, ObjectiveId, SceneNodeId};
use crate::impact::ImpactThresholds;
use glam::Vec3;

/// Authored configuration for one flake.
#[derive(Debug, Clone, PartialEq)]
pub struct FlakeConfig {
    pub name: String,
    /// Scene node holding the flake's geometry.
    pub node: SceneNodeId,
    /// Colliders on the blank that belong to this flake.
    pub colliders: Vec<ColliderId>,
    /// Candidate strike-surface normals in the flake's local frame, in
    /// priority order. Empty means the flake can never detach.
    pub offset_directions: Vec<Vec3>,
    pub thresholds: ImpactThresholds,
    /// Whether the flake can be hafted once detached.
    pub attachable: bool,
    /// Direction the flake points when hafted, in its local frame.
    pub attach_direction: Vec3,
    /// Flakes that must come off first.
    pub dependencies: Vec<FlakeId>,
}

impl FlakeConfig {
    /// A flake with default thresholds, no offsets and no dependencies.
    pub fn new(name: impl Into<String>, node: SceneNodeId) -> Self {
        Self {
            name: name.into(),
            node,
            colliders: Vec::new(),
            offset_directions: Vec::new(),
            thresholds: ImpactThresholds::default(),
            attachable: false,
            attach_direction: Vec3::Z,
            dependencies: Vec::new(),
        }
    }
}

/// One removable piece of a tool blank.
///
/// Attached while `objective` is set; detached (terminal) once it is cleared.
#[derive(Debug, Clone)]
pub struct Flake {
    pub(crate) name: String,
    pub(crate) node: SceneNodeId,
    pub(crate) colliders: Vec<ColliderId>,
    pub(crate) offset_directions: Vec<Vec3>,
    pub(crate) thresholds: ImpactThresholds,
    pub(crate) attachable: bool,
    pub(crate) attach_direction: Vec3,
    pub(crate) adjacent: Option<FlakeId>,
    pub(crate) objective: Option<ObjectiveId>,
    /// Standalone interactable created on detach.
    pub(crate) interactable: Option<SceneNodeId>,
}

impl Flake {
    pub(crate) fn from_config(config: FlakeConfig, objective: ObjectiveId) -> Self {
        Self {
            name: config.name,
            node: config.node,
            colliders: config.colliders,
            offset_directions: config.offset_directions,
            thresholds: config.thresholds,
            attachable: config.attachable,
            attach_direction: config.attach_direction,
            adjacent: None,
            objective: Some(objective),
            interactable: None,
        }
    }

    /// Current name. Rewritten to `{objective}_{flake}` on detach.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Scene node holding the flake's geometry.
    pub fn node(&self) -> SceneNodeId {
        self.node
    }

    /// Colliders on the blank that belong to this flake.
    pub fn colliders(&self) -> &[ColliderId] {
        &self.colliders
    }

    /// Strike thresholds.
    pub fn thresholds(&self) -> ImpactThresholds {
        self.thresholds
    }

    /// Candidate strike-surface normals in the local frame, in priority order.
    pub fn offset_directions(&self) -> &[Vec3] {
        &self.offset_directions
    }

    /// Owning objective; `None` once detached.
    pub fn objective(&self) -> Option<ObjectiveId> {
        self.objective
    }

    /// Whether the flake has come off its blank.
    pub fn is_detached(&self) -> bool {
        self.objective.is_none()
    }

    /// Detached and configured as a tool part.
    pub fn is_attachable(&self) -> bool {
        self.is_detached() && self.attachable
    }

    /// The adjacent twin, until either side detaches.
    pub fn adjacent(&self) -> Option<FlakeId> {
        self.adjacent
    }

    /// The interactable wrapping the flake once detached.
    pub fn interactable(&self) -> Option<SceneNodeId> {
        self.interactable
    }

    /// Offset directions rotated into world space by the flake's pose, in
    /// configured order.
    pub fn world_offset_directions(&self, pose: &Pose) -> Vec<Vec3> {
        self.offset_directions
            .iter()
            .map(|local| pose.transform_direction(*local))
            .collect()
    }

    /// Attach direction rotated into the frame of `pose`.
    pub fn world_attach_direction(&self, pose: &Pose) -> Vec3 {
        pose.transform_direction(self.attach_direction.normalize_or_zero())
    }
}

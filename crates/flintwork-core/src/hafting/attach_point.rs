use super::HaftingError;
use crate::capability::{AttachedPart, PartCapabilities};
use crate::id::{AttachPointId, ColliderId, HandleId, SceneNodeId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The kind of part an attach point accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachTarget {
    Adhesive,
    Flake,
}

impl AttachTarget {
    /// The tag used in data files.
    pub fn as_str(&self) -> &'static str {
        match self {
            AttachTarget::Adhesive => "adhesive",
            AttachTarget::Flake => "flake",
        }
    }
}

impl fmt::Display for AttachTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttachTarget {
    type Err = HaftingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "adhesive" => Ok(AttachTarget::Adhesive),
            "flake" => Ok(AttachTarget::Flake),
            _ => Err(HaftingError::UnknownTarget(s.to_string())),
        }
    }
}

/// Authored configuration for one attach point.
#[derive(Debug, Clone, PartialEq)]
pub struct AttachPointConfig {
    pub name: String,
    /// Scene node of the slot itself. Deactivated while dependencies remain.
    pub node: SceneNodeId,
    /// Node the attached part is snapped to and parented under. Defaults to
    /// `node`.
    pub attach_transform: Option<SceneNodeId>,
    pub target: AttachTarget,
    /// Trigger colliders on the handle that route contacts to this point.
    pub triggers: Vec<ColliderId>,
    /// Attach points that must be filled first.
    pub dependencies: Vec<AttachPointId>,
}

impl AttachPointConfig {
    /// A point with no triggers or dependencies that snaps parts onto `node`.
    pub fn new(name: impl Into<String>, node: SceneNodeId, target: AttachTarget) -> Self {
        Self {
            name: name.into(),
            node,
            attach_transform: None,
            target,
            triggers: Vec::new(),
            dependencies: Vec::new(),
        }
    }
}

/// Lifecycle of an attach point. `Attached` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachState {
    Pending,
    Attached(AttachedPart),
}

/// A hafting slot that accepts exactly one matching part.
#[derive(Debug, Clone)]
pub struct AttachPoint {
    pub(crate) name: String,
    pub(crate) node: SceneNodeId,
    pub(crate) attach_transform: SceneNodeId,
    pub(crate) target: AttachTarget,
    pub(crate) triggers: Vec<ColliderId>,
    pub(crate) handle: HandleId,
    pub(crate) state: AttachState,
}

impl AttachPoint {
    pub(crate) fn from_config(config: AttachPointConfig, handle: HandleId) -> Self {
        Self {
            attach_transform: config.attach_transform.unwrap_or(config.node),
            name: config.name,
            node: config.node,
            target: config.target,
            triggers: config.triggers,
            handle,
            state: AttachState::Pending,
        }
    }

    /// The authored name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Scene node of the point itself.
    pub fn node(&self) -> SceneNodeId {
        self.node
    }

    /// Scene node parts are snapped onto and parented under.
    pub fn attach_transform(&self) -> SceneNodeId {
        self.attach_transform
    }

    /// The kind of part this point accepts.
    pub fn target(&self) -> AttachTarget {
        self.target
    }

    /// Trigger colliders that route contacts to this point.
    pub fn triggers(&self) -> &[ColliderId] {
        &self.triggers
    }

    /// The handle owning this point.
    pub fn handle(&self) -> HandleId {
        self.handle
    }

    /// Current state.
    pub fn state(&self) -> AttachState {
        self.state
    }

    /// Whether a part has been fixed here.
    pub fn is_attached(&self) -> bool {
        matches!(self.state, AttachState::Attached(_))
    }

    /// The part fixed here, if any.
    pub fn attached_part(&self) -> Option<AttachedPart> {
        match self.state {
            AttachState::Attached(part) => Some(part),
            AttachState::Pending => None,
        }
    }

    /// Ask the contacting object for the capability this point accepts.
    /// Flakes must also report themselves attachable.
    pub fn match_part(&self, candidate: &dyn PartCapabilities) -> Option<AttachedPart> {
        match self.target {
            AttachTarget::Adhesive => candidate.as_adhesive().map(AttachedPart::Adhesive),
            AttachTarget::Flake => candidate
                .as_flake()
                .filter(|flake| flake.attachable)
                .map(AttachedPart::Flake),
        }
    }
}

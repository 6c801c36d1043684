//! Capability queries on contacting objects.
//!
//! Attach points do not know what kind of object touched them. The host
//! hands over a [`PartCapabilities`] view of the contacting object and the
//! attach point asks for the one capability its target type needs.

use crate::id::{FlakeId, SceneNodeId};
use serde::{Deserialize, Serialize};

/// An adhesive lump that can be pressed into an attach point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AdhesivePart {
    pub node: SceneNodeId,
}

/// A flake offered for hafting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlakePart {
    pub flake: FlakeId,
    pub node: SceneNodeId,
    /// Detached from its blank and configured as a tool part.
    pub attachable: bool,
}

/// What a contacting object can act as. Both default to "no".
pub trait PartCapabilities {
    fn as_adhesive(&self) -> Option<AdhesivePart> {
        None
    }

    fn as_flake(&self) -> Option<FlakePart> {
        None
    }
}

/// A contacting object with no hafting capability (a hand, the ground).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCapabilities;

impl PartCapabilities for NoCapabilities {}

impl PartCapabilities for AdhesivePart {
    fn as_adhesive(&self) -> Option<AdhesivePart> {
        Some(*self)
    }
}

impl PartCapabilities for FlakePart {
    fn as_flake(&self) -> Option<FlakePart> {
        Some(*self)
    }
}

/// A part fixed into an attach point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttachedPart {
    Adhesive(AdhesivePart),
    Flake(FlakePart),
}

impl AttachedPart {
    /// Scene node of the fixed part.
    pub fn node(&self) -> SceneNodeId {
        match self {
            AttachedPart::Adhesive(part) => part.node,
            AttachedPart::Flake(part) => part.node,
        }
    }
}

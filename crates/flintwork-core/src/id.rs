use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies a flake in the knapping module.
    pub struct FlakeId;

    /// Identifies an objective (one tool blank) in the knapping module.
    pub struct ObjectiveId;

    /// Identifies an attach point in the hafting module.
    pub struct AttachPointId;

    /// Identifies a handle (one haft) in the hafting module.
    pub struct HandleId;
}

/// Identifies a node in the host scene graph. Allocated by the host, opaque
/// to the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SceneNodeId(pub u64);

/// Identifies a collider registered with the host physics engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ColliderId(pub u64);

/// Identifies a prefab the host can instantiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrefabId(pub u32);

/// Identifies an interactor (a hand or tool) that strikes or holds objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InteractorId(pub u32);

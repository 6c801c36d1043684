//! Shared test helpers for unit and integration tests.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests and, via the `test-utils` feature, in the
//! integration test crate.

use crate::capability::{AdhesivePart, FlakePart, PartCapabilities};
use crate::geometry::Pose;
use crate::hafting::{AttachPointConfig, AttachTarget, ContactOutcome, HaftingModule, HandleConfig};
use crate::id::*;
use crate::impact::Impact;
use crate::knapping::{FlakeConfig, ImpactOutcome, KnappingModule, ObjectiveConfig};
use crate::scene::HeadlessScene;
use crate::sim::Ticks;
use glam::Vec3;
use slotmap::SlotMap;

/// Prefab used for detached flake interactables.
pub const TEST_PREFAB: PrefabId = PrefabId(7);

// ===========================================================================
// Interactors
// ===========================================================================

/// The interactor that delivers test strikes.
pub fn knapper() -> InteractorId {
    InteractorId(1)
}

/// The interactor that holds test blanks.
pub fn holder() -> InteractorId {
    InteractorId(2)
}

/// A strike from the test knapper at the origin.
pub fn strike(direction: Vec3, force: f32) -> Impact {
    Impact {
        knapper: knapper(),
        point: Vec3::ZERO,
        direction,
        force,
    }
}

// ===========================================================================
// Knapping
// ===========================================================================

/// A blank on a headless scene: one objective, flakes facing +Z.
pub struct TestBlank {
    pub scene: HeadlessScene,
    pub knapping: KnappingModule,
    pub objective: ObjectiveId,
    pub blank_node: SceneNodeId,
    next_collider: u64,
}

impl TestBlank {
    /// An empty blank whose objective uses `detach_cooldown`.
    pub fn new(detach_cooldown: Ticks) -> Self {
        let mut scene = HeadlessScene::new();
        let blank_node = scene.spawn("blank", Pose::IDENTITY);
        let mut knapping = KnappingModule::new();
        let mut config = ObjectiveConfig::new("blank", blank_node, TEST_PREFAB);
        config.detach_cooldown = detach_cooldown;
        let objective = knapping.create_objective(config);
        Self {
            scene,
            knapping,
            objective,
            blank_node,
            next_collider: 1,
        }
    }

    /// Config for a flake with its own scene node and collider and a single
    /// +Z offset direction. Default thresholds.
    pub fn config(&mut self, name: &str) -> FlakeConfig {
        let node = self.scene.spawn_child(self.blank_node, name, Pose::IDENTITY);
        let collider = ColliderId(self.next_collider);
        self.next_collider += 1;
        self.scene.add_collider(self.blank_node, collider);

        let mut config = FlakeConfig::new(name, node);
        config.colliders = vec![collider];
        config.offset_directions = vec![Vec3::Z];
        config
    }

    /// Register a flake with default config and the given dependencies.
    pub fn add(&mut self, name: &str, dependencies: &[FlakeId]) -> FlakeId {
        let mut config = self.config(name);
        config.dependencies = dependencies.to_vec();
        self.knapping
            .add_flake(self.objective, config)
            .expect("test flake should register")
    }

    /// Strike a flake at tick `now` from the test knapper.
    pub fn strike(&mut self, flake: FlakeId, direction: Vec3, force: f32, now: Ticks) -> ImpactOutcome {
        self.knapping
            .handle_impact(flake, &strike(direction, force), now, &mut self.scene)
    }
}

// ===========================================================================
// Hafting
// ===========================================================================

/// A handle on a headless scene with helpers for points and loose parts.
pub struct TestHaft {
    pub scene: HeadlessScene,
    pub hafting: HaftingModule,
    pub handle: HandleId,
    pub handle_node: SceneNodeId,
    next_trigger: u64,
    flake_keys: SlotMap<FlakeId, ()>,
}

impl TestHaft {
    /// An empty handle on a fresh scene.
    pub fn new() -> Self {
        let mut scene = HeadlessScene::new();
        let handle_node = scene.spawn("haft", Pose::IDENTITY);
        let mut hafting = HaftingModule::new();
        let handle = hafting.create_handle(HandleConfig::new("haft", handle_node));
        Self {
            scene,
            hafting,
            handle,
            handle_node,
            next_trigger: 100,
            flake_keys: SlotMap::with_key(),
        }
    }

    /// Config for an attach point with its own scene node and trigger.
    pub fn config(&mut self, name: &str, target: AttachTarget) -> AttachPointConfig {
        let node = self.scene.spawn_child(self.handle_node, name, Pose::IDENTITY);
        let trigger = ColliderId(self.next_trigger);
        self.next_trigger += 1;
        self.scene.add_collider(self.handle_node, trigger);

        let mut config = AttachPointConfig::new(name, node, target);
        config.triggers = vec![trigger];
        config
    }

    /// Register an attach point with its own node and trigger.
    pub fn point(&mut self, name: &str, target: AttachTarget, dependencies: &[AttachPointId]) -> AttachPointId {
        let mut config = self.config(name, target);
        config.dependencies = dependencies.to_vec();
        self.hafting
            .add_attach_point(self.handle, config, &mut self.scene)
            .expect("test attach point should register")
    }

    /// A fresh lump of adhesive lying in the scene.
    pub fn adhesive(&mut self) -> AdhesivePart {
        AdhesivePart {
            node: self.scene.spawn("adhesive", Pose::IDENTITY),
        }
    }

    /// A flake lying in the scene, not tied to any blank.
    pub fn loose_flake(&mut self, attachable: bool) -> FlakePart {
        FlakePart {
            flake: self.flake_keys.insert(()),
            node: self.scene.spawn("flake", Pose::IDENTITY),
            attachable,
        }
    }

    /// Offer `candidate` to an attach point at tick `now`.
    pub fn contact(&mut self, point: AttachPointId, candidate: &dyn PartCapabilities, now: Ticks) -> ContactOutcome {
        self.hafting
            .handle_contact(point, candidate, now, &mut self.scene)
    }
}

impl Default for TestHaft {
    fn default() -> Self {
        Self::new()
    }
}

use super::flake::Flake;
use crate::id::{ColliderId, FlakeId, InteractorId, PrefabId, SceneNodeId};
use crate::scene::SceneMutator;
use crate::sim::Ticks;
use std::collections::HashMap;

/// Cooldown applied when none is authored: one tick, enough to stop a
/// single physics step from detaching several flakes.
pub const DEFAULT_DETACH_COOLDOWN: Ticks = 1;

/// Authored configuration for one tool blank.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectiveConfig {
    pub name: String,
    /// Scene node of the held blank; its interactable owns the flake colliders.
    pub node: SceneNodeId,
    /// Prefab instantiated around each detached flake.
    pub interactable_prefab: PrefabId,
    pub detach_cooldown: Ticks,
}

impl ObjectiveConfig {
    /// A blank with the default detach cooldown.
    pub fn new(name: impl Into<String>, node: SceneNodeId, interactable_prefab: PrefabId) -> Self {
        Self {
            name: name.into(),
            node,
            interactable_prefab,
            detach_cooldown: DEFAULT_DETACH_COOLDOWN,
        }
    }
}

/// Owner of the live flakes of one tool blank. Gates how often flakes may
/// detach and performs the scene surgery when one does.
#[derive(Debug, Clone)]
pub struct Objective {
    name: String,
    node: SceneNodeId,
    interactable_prefab: PrefabId,
    detach_cooldown: Ticks,
    /// Flakes still attached, in registration order. Only ever shrinks.
    live: Vec<FlakeId>,
    /// Collider -> live flake, for routing contacts on the blank.
    collider_routes: HashMap<ColliderId, FlakeId>,
    detach_available_at: Ticks,
    holder: Option<InteractorId>,
}

impl Objective {
    pub(crate) fn from_config(config: ObjectiveConfig) -> Self {
        Self {
            name: config.name,
            node: config.node,
            interactable_prefab: config.interactable_prefab,
            detach_cooldown: config.detach_cooldown,
            live: Vec::new(),
            collider_routes: HashMap::new(),
            detach_available_at: 0,
            holder: None,
        }
    }

    /// The authored name, used as the prefix of detached flake names.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Scene node of the blank.
    pub fn node(&self) -> SceneNodeId {
        self.node
    }

    /// Ticks that must pass after a detach before the next one.
    pub fn detach_cooldown(&self) -> Ticks {
        self.detach_cooldown
    }

    /// Live (still attached) flakes in registration order.
    pub fn flakes(&self) -> &[FlakeId] {
        &self.live
    }

    /// Whether every flake has come off.
    pub fn is_exhausted(&self) -> bool {
        self.live.is_empty()
    }

    /// Whether a detachment may be processed at `now`.
    pub fn is_detach_available(&self, now: Ticks) -> bool {
        now >= self.detach_available_at
    }

    /// First tick at which another flake may detach.
    pub fn detach_available_at(&self) -> Ticks {
        self.detach_available_at
    }

    /// Interactor currently holding the blank.
    pub fn holder(&self) -> Option<InteractorId> {
        self.holder
    }

    pub(crate) fn set_holder(&mut self, holder: Option<InteractorId>) {
        self.holder = holder;
    }

    /// The live flake owning `collider`, if any.
    pub fn flake_for_collider(&self, collider: ColliderId) -> Option<FlakeId> {
        self.collider_routes.get(&collider).copied()
    }

    pub(crate) fn routes_collider(&self, collider: ColliderId) -> bool {
        self.collider_routes.contains_key(&collider)
    }

    pub(crate) fn register_flake(&mut self, id: FlakeId, colliders: &[ColliderId]) {
        self.live.push(id);
        for &collider in colliders {
            self.collider_routes.insert(collider, id);
        }
    }

    /// Complete a detachment: drop the flake from the live set and the
    /// collider routes, wrap it in a standalone interactable, and start the
    /// cooldown. Returns the new interactable node.
    pub(crate) fn finalize_detach(
        &mut self,
        id: FlakeId,
        flake: &mut Flake,
        scene: &mut dyn SceneMutator,
        now: Ticks,
    ) -> SceneNodeId {
        self.live.retain(|live| *live != id);
        for collider in &flake.colliders {
            self.collider_routes.remove(collider);
        }
        scene.unregister_colliders(self.node, &flake.colliders);

        let pose = scene.world_pose(flake.node);
        let interactable = scene.instantiate_from(self.interactable_prefab, pose);
        let name = format!("{}_{}", self.name, flake.name);
        scene.rename(interactable, &name);
        scene.rename(flake.node, &name);
        scene.reparent(flake.node, Some(interactable));
        // Activate only after reparenting so the interactable picks up the
        // flake's colliders when it wakes.
        scene.set_active(interactable, true);

        flake.name = name;
        flake.interactable = Some(interactable);
        self.detach_available_at = now.saturating_add(self.detach_cooldown);
        interactable
    }
}

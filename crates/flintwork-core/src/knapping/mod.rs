//! Knapping: removing flakes from a tool blank with validated strikes.
//!
//! Objectives and flakes are registered at startup via
//! [`KnappingModule::create_objective`] and [`KnappingModule::add_flake`].
//! A flake may only depend on flakes that are already registered, which keeps
//! the dependency graph acyclic. At runtime the host forwards strikes with
//! [`KnappingModule::handle_impact`]; every outcome is recorded as an
//! [`Event`] and drained with [`KnappingModule::drain_events`].

mod flake;
mod objective;

pub use flake::{Flake, FlakeConfig};
pub use objective::{DEFAULT_DETACH_COOLDOWN, Objective, ObjectiveConfig};

use crate::capability::FlakePart;
use crate::dependency::{DependencyGraph, DependencyProgress, GraphError};
use crate::event::{Event, FlakeEventArgs};
use crate::id::{ColliderId, FlakeId, InteractorId, ObjectiveId, SceneNodeId};
use crate::impact::{Impact, ImpactValidator, Rejection, ThresholdError, Verdict};
use crate::scene::SceneMutator;
use crate::sim::Ticks;
use slotmap::SlotMap;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Configuration errors raised while assembling a blank.
#[derive(Debug, thiserror::Error)]
pub enum KnappingError {
    #[error("objective not found: {0:?}")]
    ObjectiveNotFound(ObjectiveId),

    #[error("flake not found: {0:?}")]
    FlakeNotFound(FlakeId),

    #[error("flake {0:?} is already detached")]
    AlreadyDetached(FlakeId),

    #[error("dependency {dependency:?} belongs to a different objective than {objective:?}")]
    CrossObjectiveDependency {
        objective: ObjectiveId,
        dependency: FlakeId,
    },

    #[error("collider {0:?} is already routed to a flake")]
    DuplicateCollider(ColliderId),

    #[error("flake {0:?} cannot be adjacent to itself")]
    SelfAdjacent(FlakeId),

    #[error("flake {flake:?} is already adjacent to {other:?}")]
    AlreadyAdjacent { flake: FlakeId, other: FlakeId },

    #[error("adjacent flakes {a:?} and {b:?} belong to different objectives")]
    AdjacentAcrossObjectives { a: FlakeId, b: FlakeId },

    #[error("invalid thresholds for flake '{name}': {source}")]
    Thresholds {
        name: String,
        source: ThresholdError,
    },

    #[error(transparent)]
    Graph(#[from] GraphError<FlakeId>),
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// What a strike did. Mirrors the event recorded for it.
#[derive(Debug, Clone, PartialEq)]
pub enum ImpactOutcome {
    /// Unknown or already detached flake; nothing happened and nothing was
    /// recorded.
    Ignored,
    Rejected(Rejection),
    Detached {
        /// Matched strike angle in degrees.
        angle: f32,
        /// Standalone interactable now wrapping the flake.
        interactable: SceneNodeId,
        /// Flakes that became ready because this one came off.
        unlocked: Vec<FlakeId>,
    },
}

impl ImpactOutcome {
    /// Whether the strike detached the flake.
    pub fn is_detached(&self) -> bool {
        matches!(self, ImpactOutcome::Detached { .. })
    }

    /// The rejection reason, if the strike was rejected.
    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            ImpactOutcome::Rejected(rejection) => Some(*rejection),
            _ => None,
        }
    }
}

fn rejection_event(rejection: Rejection, args: FlakeEventArgs) -> Event {
    match rejection {
        Rejection::WeakImpact => Event::WeakImpact(args),
        Rejection::DependenciesRemaining => Event::DependenciesRemaining(args),
        Rejection::DetachCooldown => Event::DetachCooldown(args),
        Rejection::InvalidAngle => Event::InvalidAngle(args),
    }
}

// ---------------------------------------------------------------------------
// KnappingModule
// ---------------------------------------------------------------------------

/// Owns every objective and flake, the flake dependency graph, and the
/// outcome events recorded since the last drain.
#[derive(Debug, Default)]
pub struct KnappingModule {
    objectives: SlotMap<ObjectiveId, Objective>,
    /// All flakes, attached or not. Detached flakes stay addressable so they
    /// can be hafted.
    flakes: SlotMap<FlakeId, Flake>,
    graph: DependencyGraph<FlakeId>,
    events: Vec<Event>,
}

impl KnappingModule {
    /// Create an empty knapping module.
    pub fn new() -> Self {
        Self::default()
    }

    // -- Registration API --

    /// Register a blank. Flakes are added to it afterwards.
    pub fn create_objective(&mut self, config: ObjectiveConfig) -> ObjectiveId {
        self.objectives.insert(Objective::from_config(config))
    }

    /// Register a flake on an objective. Dependencies must be live flakes of
    /// the same objective; thresholds must be in range.
    pub fn add_flake(
        &mut self,
        objective_id: ObjectiveId,
        config: FlakeConfig,
    ) -> Result<FlakeId, KnappingError> {
        if !self.objectives.contains_key(objective_id) {
            return Err(KnappingError::ObjectiveNotFound(objective_id));
        }
        config
            .thresholds
            .validate()
            .map_err(|source| KnappingError::Thresholds {
                name: config.name.clone(),
                source,
            })?;

        for &dependency in &config.dependencies {
            let flake = self
                .flakes
                .get(dependency)
                .ok_or(KnappingError::FlakeNotFound(dependency))?;
            match flake.objective {
                None => return Err(KnappingError::AlreadyDetached(dependency)),
                Some(owner) if owner != objective_id => {
                    return Err(KnappingError::CrossObjectiveDependency {
                        objective: objective_id,
                        dependency,
                    });
                }
                Some(_) => {}
            }
        }

        for &collider in &config.colliders {
            if self.objectives.values().any(|o| o.routes_collider(collider)) {
                return Err(KnappingError::DuplicateCollider(collider));
            }
        }

        let dependencies = config.dependencies.clone();
        let colliders = config.colliders.clone();
        let id = self.flakes.insert(Flake::from_config(config, objective_id));
        if let Err(err) = self.graph.insert(id, &dependencies) {
            self.flakes.remove(id);
            return Err(err.into());
        }
        if let Some(objective) = self.objectives.get_mut(objective_id) {
            objective.register_flake(id, &colliders);
        }
        Ok(id)
    }

    /// Pair two flakes of the same objective as symmetric twins.
    pub fn link_adjacent(&mut self, a: FlakeId, b: FlakeId) -> Result<(), KnappingError> {
        if a == b {
            return Err(KnappingError::SelfAdjacent(a));
        }
        let fa = self.flakes.get(a).ok_or(KnappingError::FlakeNotFound(a))?;
        let fb = self.flakes.get(b).ok_or(KnappingError::FlakeNotFound(b))?;
        if fa.is_detached() {
            return Err(KnappingError::AlreadyDetached(a));
        }
        if fb.is_detached() {
            return Err(KnappingError::AlreadyDetached(b));
        }
        if fa.objective != fb.objective {
            return Err(KnappingError::AdjacentAcrossObjectives { a, b });
        }
        for (flake, existing) in [(a, fa.adjacent), (b, fb.adjacent)] {
            if let Some(other) = existing
                && other != a
                && other != b
            {
                return Err(KnappingError::AlreadyAdjacent { flake, other });
            }
        }

        if let Some(flake) = self.flakes.get_mut(a) {
            flake.adjacent = Some(b);
        }
        if let Some(flake) = self.flakes.get_mut(b) {
            flake.adjacent = Some(a);
        }
        Ok(())
    }

    /// Record which interactor holds the blank, reported in outcome events.
    pub fn set_holder(
        &mut self,
        objective: ObjectiveId,
        holder: Option<InteractorId>,
    ) -> Result<(), KnappingError> {
        self.objectives
            .get_mut(objective)
            .ok_or(KnappingError::ObjectiveNotFound(objective))?
            .set_holder(holder);
        Ok(())
    }

    // -- Query API --

    /// Look up an objective.
    pub fn objective(&self, id: ObjectiveId) -> Option<&Objective> {
        self.objectives.get(id)
    }

    /// Iterate over all objectives.
    pub fn objectives(&self) -> impl Iterator<Item = (ObjectiveId, &Objective)> {
        self.objectives.iter()
    }

    /// Look up a flake, attached or detached.
    pub fn flake(&self, id: FlakeId) -> Option<&Flake> {
        self.flakes.get(id)
    }

    /// Iterate over all flakes.
    pub fn flakes(&self) -> impl Iterator<Item = (FlakeId, &Flake)> {
        self.flakes.iter()
    }

    /// True iff every dependency of the flake has been cleared.
    pub fn is_ready(&self, id: FlakeId) -> bool {
        self.graph.is_ready(id)
    }

    /// Initial and remaining dependency counts for a flake.
    pub fn dependency_progress(&self, id: FlakeId) -> DependencyProgress {
        self.graph.progress(id)
    }

    /// Flakes that must still come off before this one.
    pub fn dependencies(&self, id: FlakeId) -> Vec<FlakeId> {
        self.graph.predecessors(id).collect()
    }

    /// Flakes still waiting on this one.
    pub fn dependents(&self, id: FlakeId) -> Vec<FlakeId> {
        self.graph.dependents(id).collect()
    }

    /// The live flake owning `collider` on any objective.
    pub fn flake_for_collider(&self, collider: ColliderId) -> Option<FlakeId> {
        self.objectives
            .values()
            .find_map(|objective| objective.flake_for_collider(collider))
    }

    /// Capability view of a flake, handed to attach points on contact.
    pub fn flake_part(&self, id: FlakeId) -> Option<FlakePart> {
        self.flakes.get(id).map(|flake| FlakePart {
            flake: id,
            node: flake.node,
            attachable: flake.is_attachable(),
        })
    }

    // -- Runtime --

    /// Process a strike on a flake.
    ///
    /// Detached or unknown flakes are ignored without recording anything.
    /// Otherwise the strike is checked for force, dependency ratio, the
    /// objective's cooldown, and angle, in that order; the first failing check
    /// is recorded and nothing is mutated. A strike that passes clears the
    /// flake's edges and adjacent link, marks it detached, and has the
    /// objective move it into its own interactable.
    pub fn handle_impact(
        &mut self,
        id: FlakeId,
        impact: &Impact,
        now: Ticks,
        scene: &mut dyn SceneMutator,
    ) -> ImpactOutcome {
        let Some(flake) = self.flakes.get(id) else {
            return ImpactOutcome::Ignored;
        };
        let Some(objective_id) = flake.objective else {
            return ImpactOutcome::Ignored;
        };
        let Some(objective) = self.objectives.get(objective_id) else {
            return ImpactOutcome::Ignored;
        };

        let pose = scene.world_pose(flake.node);
        let candidates = flake.world_offset_directions(&pose);
        let verdict = ImpactValidator::new(flake.thresholds).evaluate(
            impact.force,
            self.graph.progress(id),
            objective.is_detach_available(now),
            impact.direction,
            &candidates,
        );

        let mut args = FlakeEventArgs {
            objective: objective_id,
            holder: objective.holder(),
            knapper: impact.knapper,
            flake: id,
            impact_point: impact.point,
            impact_force: impact.force,
            impact_angle: f32::NAN,
            tick: now,
        };

        match verdict {
            Verdict::Rejected(rejection) => {
                tracing::debug!(
                    flake = %flake.name,
                    ?rejection,
                    force = impact.force,
                    tick = now,
                    "strike rejected"
                );
                self.events.push(rejection_event(rejection, args));
                ImpactOutcome::Rejected(rejection)
            }
            Verdict::Accepted(matched) => {
                args.impact_angle = matched.angle;
                self.detach(id, objective_id, args, scene, now)
            }
        }
    }

    /// Route a strike on a blank collider to its flake. Returns `None` when
    /// no live flake owns the collider.
    pub fn handle_collider_impact(
        &mut self,
        collider: ColliderId,
        impact: &Impact,
        now: Ticks,
        scene: &mut dyn SceneMutator,
    ) -> Option<(FlakeId, ImpactOutcome)> {
        let id = self.flake_for_collider(collider)?;
        Some((id, self.handle_impact(id, impact, now, scene)))
    }

    /// Take the events recorded since the last drain, oldest first.
    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    /// Events recorded since the last drain, oldest first.
    pub fn pending_events(&self) -> &[Event] {
        &self.events
    }

    fn detach(
        &mut self,
        id: FlakeId,
        objective_id: ObjectiveId,
        args: FlakeEventArgs,
        scene: &mut dyn SceneMutator,
        now: Ticks,
    ) -> ImpactOutcome {
        let unlocked = self.graph.remove_edges(id);
        self.clear_adjacent(id);

        let (Some(flake), Some(objective)) =
            (self.flakes.get_mut(id), self.objectives.get_mut(objective_id))
        else {
            return ImpactOutcome::Ignored;
        };
        // Cleared before the objective finalizes: attachability reads it.
        flake.objective = None;
        let interactable = objective.finalize_detach(id, flake, scene, now);

        tracing::info!(
            flake = %flake.name,
            angle = args.impact_angle,
            force = args.impact_force,
            unlocked = unlocked.len(),
            tick = now,
            "flake detached"
        );
        self.events.push(Event::Detached(args));
        ImpactOutcome::Detached {
            angle: args.impact_angle,
            interactable,
            unlocked,
        }
    }

    fn clear_adjacent(&mut self, id: FlakeId) {
        let Some(twin) = self.flakes.get_mut(id).and_then(|f| f.adjacent.take()) else {
            return;
        };
        if let Some(other) = self.flakes.get_mut(twin)
            && other.adjacent == Some(id)
        {
            other.adjacent = None;
        }
    }
}

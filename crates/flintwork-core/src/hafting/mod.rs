//! Hafting: fixing adhesives and flakes into a handle.
//!
//! Each [`Handle`] owns a set of [`AttachPoint`]s wired into a dependency
//! graph. A point accepts a contact once all its predecessors are filled and
//! the contacting object offers the capability its [`AttachTarget`] asks for.
//! Attaching is terminal: the part is snapped onto the attach transform,
//! reparented, made static, and the point stops listening for contacts.

mod attach_point;
mod handle;

pub use attach_point::{AttachPoint, AttachPointConfig, AttachState, AttachTarget};
pub use handle::{Handle, HandleConfig, Joint};

use crate::capability::{AttachedPart, PartCapabilities};
use crate::dependency::{DependencyGraph, GraphError};
use crate::event::Event;
use crate::id::{AttachPointId, ColliderId, HandleId};
use crate::scene::SceneMutator;
use crate::sim::Ticks;
use slotmap::SlotMap;

/// Configuration errors raised while assembling a haft.
#[derive(Debug, thiserror::Error)]
pub enum HaftingError {
    #[error("handle not found: {0:?}")]
    HandleNotFound(HandleId),

    #[error("attach point not found: {0:?}")]
    AttachPointNotFound(AttachPointId),

    #[error("attach point {0:?} is already attached")]
    AlreadyAttached(AttachPointId),

    #[error("dependency {dependency:?} belongs to a different handle than {handle:?}")]
    CrossHandleDependency {
        handle: HandleId,
        dependency: AttachPointId,
    },

    #[error("trigger {0:?} is already routed to an attach point")]
    DuplicateTrigger(ColliderId),

    #[error("unknown attach target '{0}' (expected 'adhesive' or 'flake')")]
    UnknownTarget(String),

    #[error(transparent)]
    Graph(#[from] GraphError<AttachPointId>),
}

/// What a contact did.
#[derive(Debug, Clone, PartialEq)]
pub enum ContactOutcome {
    /// Unknown attach point.
    Ignored,
    /// Dependencies remain; the point is not listening yet.
    NotReady,
    /// The point already holds a part.
    AlreadyAttached,
    /// The contacting object lacks the capability the point accepts.
    NoMatch,
    /// The offered part is already fixed into a haft.
    PartAlreadyFixed,
    Attached {
        part: AttachedPart,
        /// Attach points that became ready because this one was filled.
        unlocked: Vec<AttachPointId>,
    },
}

impl ContactOutcome {
    /// Whether the contact fixed a part.
    pub fn is_attached(&self) -> bool {
        matches!(self, ContactOutcome::Attached { .. })
    }
}

/// Owns every handle and attach point, the attach point dependency graph,
/// and the `Attached` events recorded since the last drain.
#[derive(Debug, Default)]
pub struct HaftingModule {
    handles: SlotMap<HandleId, Handle>,
    points: SlotMap<AttachPointId, AttachPoint>,
    graph: DependencyGraph<AttachPointId>,
    events: Vec<Event>,
}

impl HaftingModule {
    /// Create an empty hafting module.
    pub fn new() -> Self {
        Self::default()
    }

    // -- Registration API --

    /// Register a handle. Attach points are added to it afterwards.
    pub fn create_handle(&mut self, config: HandleConfig) -> HandleId {
        self.handles.insert(Handle::from_config(config))
    }

    /// Register an attach point on a handle. Dependencies must be pending
    /// points of the same handle. A point that starts with dependencies has
    /// its scene node deactivated until they are filled.
    pub fn add_attach_point(
        &mut self,
        handle_id: HandleId,
        config: AttachPointConfig,
        scene: &mut dyn SceneMutator,
    ) -> Result<AttachPointId, HaftingError> {
        if !self.handles.contains_key(handle_id) {
            return Err(HaftingError::HandleNotFound(handle_id));
        }
        for &dependency in &config.dependencies {
            let point = self
                .points
                .get(dependency)
                .ok_or(HaftingError::AttachPointNotFound(dependency))?;
            if point.handle != handle_id {
                return Err(HaftingError::CrossHandleDependency {
                    handle: handle_id,
                    dependency,
                });
            }
            if point.is_attached() {
                return Err(HaftingError::AlreadyAttached(dependency));
            }
        }
        for &collider in &config.triggers {
            if self.handles.values().any(|h| h.routes_trigger(collider)) {
                return Err(HaftingError::DuplicateTrigger(collider));
            }
        }

        let dependencies = config.dependencies.clone();
        let triggers = config.triggers.clone();
        let node = config.node;
        let id = self.points.insert(AttachPoint::from_config(config, handle_id));
        if let Err(err) = self.graph.insert(id, &dependencies) {
            self.points.remove(id);
            return Err(err.into());
        }
        if let Some(handle) = self.handles.get_mut(handle_id) {
            handle.register_point(id, &triggers);
        }
        if !self.graph.is_ready(id) {
            scene.set_active(node, false);
        }
        Ok(id)
    }

    // -- Query API --

    /// Look up a handle.
    pub fn handle(&self, id: HandleId) -> Option<&Handle> {
        self.handles.get(id)
    }

    /// Iterate over all handles.
    pub fn handles(&self) -> impl Iterator<Item = (HandleId, &Handle)> {
        self.handles.iter()
    }

    /// Look up an attach point, pending or attached.
    pub fn attach_point(&self, id: AttachPointId) -> Option<&AttachPoint> {
        self.points.get(id)
    }

    /// Iterate over all attach points.
    pub fn attach_points(&self) -> impl Iterator<Item = (AttachPointId, &AttachPoint)> {
        self.points.iter()
    }

    /// True iff every dependency of the point has been filled.
    pub fn is_ready(&self, id: AttachPointId) -> bool {
        self.graph.is_ready(id)
    }

    /// Points that must be filled before this one, still outstanding.
    pub fn dependencies(&self, id: AttachPointId) -> Vec<AttachPointId> {
        self.graph.predecessors(id).collect()
    }

    /// Points still waiting on this one.
    pub fn dependents(&self, id: AttachPointId) -> Vec<AttachPointId> {
        self.graph.dependents(id).collect()
    }

    /// The pending attach point fed by `collider` on any handle.
    pub fn point_for_trigger(&self, collider: ColliderId) -> Option<AttachPointId> {
        self.handles
            .values()
            .find_map(|handle| handle.point_for_trigger(collider))
    }

    // -- Runtime --

    /// Process a physical contact between an attach point and another object.
    ///
    /// Unready, already filled, and non-matching contacts are silent no-ops.
    pub fn handle_contact(
        &mut self,
        id: AttachPointId,
        candidate: &dyn PartCapabilities,
        now: Ticks,
        scene: &mut dyn SceneMutator,
    ) -> ContactOutcome {
        let Some(point) = self.points.get(id) else {
            return ContactOutcome::Ignored;
        };
        if point.is_attached() {
            return ContactOutcome::AlreadyAttached;
        }
        if !self.graph.is_ready(id) {
            tracing::debug!(point = %point.name, "contact before dependencies were filled");
            return ContactOutcome::NotReady;
        }
        let Some(part) = point.match_part(candidate) else {
            tracing::debug!(point = %point.name, target = %point.target, "contact has no matching part");
            return ContactOutcome::NoMatch;
        };
        if self.handles.values().any(|h| h.holds_part(part.node())) {
            tracing::debug!(point = %point.name, node = ?part.node(), "part is already fixed");
            return ContactOutcome::PartAlreadyFixed;
        }

        let handle_id = point.handle;
        let transform = point.attach_transform;
        let triggers = point.triggers.clone();

        if let Some(handle) = self.handles.get_mut(handle_id) {
            match part {
                AttachedPart::Adhesive(adhesive) => handle.attach_adhesive(id, adhesive, now),
                AttachedPart::Flake(flake) => handle.attach_flake(id, flake, now),
            }
            handle.drop_triggers(&triggers);
        }

        let node = part.node();
        let snap = scene.world_pose(transform);
        scene.set_world_pose(node, snap);
        scene.reparent(node, Some(transform));
        scene.make_static(node);

        let unlocked = self.graph.remove_edges(id);
        for next in &unlocked {
            if let Some(next) = self.points.get(*next) {
                scene.set_active(next.node, true);
            }
        }

        let Some(point) = self.points.get_mut(id) else {
            return ContactOutcome::Ignored;
        };
        point.state = AttachState::Attached(part);
        tracing::info!(
            point = %point.name,
            target = %point.target,
            unlocked = unlocked.len(),
            tick = now,
            "part attached"
        );

        self.events.push(Event::Attached {
            attach_point: id,
            handle: handle_id,
            part,
            tick: now,
        });
        ContactOutcome::Attached { part, unlocked }
    }

    /// Route a contact on a handle trigger to its attach point. Returns
    /// `None` when no pending point listens on the collider.
    pub fn handle_collider_contact(
        &mut self,
        collider: ColliderId,
        candidate: &dyn PartCapabilities,
        now: Ticks,
        scene: &mut dyn SceneMutator,
    ) -> Option<(AttachPointId, ContactOutcome)> {
        let id = self.point_for_trigger(collider)?;
        Some((id, self.handle_contact(id, candidate, now, scene)))
    }

    /// Take the events recorded since the last drain, oldest first.
    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    /// Events recorded since the last drain, oldest first.
    pub fn pending_events(&self) -> &[Event] {
        &self.events
    }
}

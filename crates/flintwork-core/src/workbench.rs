//! Orchestration of knapping and hafting against one event bus and clock.
//!
//! Inbound callbacks (`on_impact`, `on_contact`) are processed synchronously
//! at the current tick and their outcome events are buffered on the
//! [`EventBus`]. [`Workbench::step`] delivers the buffered events to
//! subscribers and advances the clock, which is what lets an objective's
//! cooldown expire.

use crate::capability::PartCapabilities;
use crate::event::EventBus;
use crate::hafting::{ContactOutcome, HaftingModule};
use crate::id::{AttachPointId, ColliderId, FlakeId};
use crate::impact::Impact;
use crate::knapping::{ImpactOutcome, KnappingModule};
use crate::scene::SceneMutator;
use crate::sim::{SimClock, Ticks};

/// Owns both state machines, the event bus and the simulation tick.
#[derive(Debug, Default)]
pub struct Workbench {
    pub knapping: KnappingModule,
    pub hafting: HaftingModule,
    /// Outcome events, delivered to subscribers on [`Workbench::step`].
    pub event_bus: EventBus,
    clock: SimClock,
}

impl Workbench {
    /// An empty workbench at tick 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble a workbench from already configured modules.
    pub fn from_parts(knapping: KnappingModule, hafting: HaftingModule) -> Self {
        Self {
            knapping,
            hafting,
            event_bus: EventBus::default(),
            clock: SimClock::new(),
        }
    }

    /// The current tick.
    pub fn now(&self) -> Ticks {
        self.clock.now()
    }

    /// Jump the clock forward to `tick`. Moving backwards is refused: every
    /// cooldown assumes time is monotonic.
    pub fn advance_to(&mut self, tick: Ticks) {
        let now = self.clock.now();
        if tick < now {
            tracing::warn!(now, requested = tick, "refusing to move the clock backwards");
            return;
        }
        self.clock.advance_by(tick - now);
    }

    // -- Inbound callbacks --

    /// Strike a flake at the current tick.
    pub fn on_impact(
        &mut self,
        flake: FlakeId,
        impact: &Impact,
        scene: &mut dyn SceneMutator,
    ) -> ImpactOutcome {
        let outcome = self
            .knapping
            .handle_impact(flake, impact, self.clock.now(), scene);
        self.collect_events();
        outcome
    }

    /// Strike whatever live flake owns `collider`. `None` when nothing does.
    pub fn on_collider_impact(
        &mut self,
        collider: ColliderId,
        impact: &Impact,
        scene: &mut dyn SceneMutator,
    ) -> Option<(FlakeId, ImpactOutcome)> {
        let routed = self
            .knapping
            .handle_collider_impact(collider, impact, self.clock.now(), scene);
        self.collect_events();
        routed
    }

    /// Offer a part to an attach point at the current tick.
    pub fn on_contact(
        &mut self,
        point: AttachPointId,
        candidate: &dyn PartCapabilities,
        scene: &mut dyn SceneMutator,
    ) -> ContactOutcome {
        let outcome = self
            .hafting
            .handle_contact(point, candidate, self.clock.now(), scene);
        self.collect_events();
        outcome
    }

    /// Offer a part to whatever pending point listens on `collider`. `None` when nothing does.
    pub fn on_collider_contact(
        &mut self,
        collider: ColliderId,
        candidate: &dyn PartCapabilities,
        scene: &mut dyn SceneMutator,
    ) -> Option<(AttachPointId, ContactOutcome)> {
        let routed = self
            .hafting
            .handle_collider_contact(collider, candidate, self.clock.now(), scene);
        self.collect_events();
        routed
    }

    /// Bring a flake from this workbench into contact with an attach point.
    /// Unknown flakes offer no capability.
    pub fn offer_flake(
        &mut self,
        point: AttachPointId,
        flake: FlakeId,
        scene: &mut dyn SceneMutator,
    ) -> ContactOutcome {
        match self.knapping.flake_part(flake) {
            Some(part) => self.on_contact(point, &part, scene),
            None => self.on_contact(point, &crate::capability::NoCapabilities, scene),
        }
    }

    /// Deliver buffered events to subscribers, then advance one tick.
    /// Returns the number of events delivered.
    pub fn step(&mut self) -> usize {
        let delivered = self.event_bus.deliver();
        self.clock.advance();
        delivered
    }

    fn collect_events(&mut self) {
        self.event_bus.emit_all(self.knapping.drain_events());
        self.event_bus.emit_all(self.hafting.drain_events());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Event, EventKind, SubscriberPriority};
    use crate::geometry::Pose;
    use crate::hafting::{AttachPointConfig, AttachTarget, HandleConfig};
    use crate::id::ObjectiveId;
    use crate::scene::HeadlessScene;
    use crate::test_utils::*;
    use glam::Vec3;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn bench_from(blank: TestBlank) -> (Workbench, HeadlessScene, ObjectiveId) {
        let bench = Workbench::from_parts(blank.knapping, HaftingModule::new());
        (bench, blank.scene, blank.objective)
    }

    #[test]
    fn cooldown_expires_across_steps() {
        let mut blank = TestBlank::new(1);
        let a = blank.add("a", &[]);
        let b = blank.add("b", &[]);
        let (mut bench, mut scene, _) = bench_from(blank);

        let hit = strike(Vec3::NEG_Z, 80.0);
        assert!(bench.on_impact(a, &hit, &mut scene).is_detached());
        assert!(bench.on_impact(b, &hit, &mut scene).rejection().is_some());
        assert_eq!(bench.step(), 2);
        assert!(bench.on_impact(b, &hit, &mut scene).is_detached());
    }

    #[test]
    fn subscribers_see_outcomes_on_step() {
        let mut blank = TestBlank::new(1);
        let a = blank.add("a", &[]);
        let (mut bench, mut scene, objective) = bench_from(blank);

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        bench.event_bus.on_passive_filtered(
            EventKind::WeakImpact,
            SubscriberPriority::Normal,
            None,
            Box::new(move |event: &Event| sink.borrow_mut().push(*event)),
        );

        bench.on_impact(a, &strike(Vec3::NEG_Z, 10.0), &mut scene);
        assert!(seen.borrow().is_empty());
        assert_eq!(bench.event_bus.buffered_count(EventKind::WeakImpact), 1);

        bench.step();
        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].flake_args().unwrap().objective, objective);
        assert_eq!(seen[0].tick(), 0);
    }

    #[test]
    fn detached_flake_can_be_hafted() {
        let mut blank = TestBlank::new(0);
        let mut config = blank.config("point");
        config.attachable = true;
        let point = blank.knapping.add_flake(blank.objective, config).unwrap();
        let (mut bench, mut scene, _) = bench_from(blank);

        let haft_node = scene.spawn("haft", Pose::IDENTITY);
        let handle = bench
            .hafting
            .create_handle(HandleConfig::new("haft", haft_node));
        let slot_node = scene.spawn_child(haft_node, "slot", Pose::IDENTITY);
        let slot = bench
            .hafting
            .add_attach_point(
                handle,
                AttachPointConfig::new("slot", slot_node, AttachTarget::Flake),
                &mut scene,
            )
            .unwrap();

        // Still on the blank: not attachable yet.
        assert_eq!(bench.offer_flake(slot, point, &mut scene), ContactOutcome::NoMatch);

        assert!(bench.on_impact(point, &strike(Vec3::NEG_Z, 80.0), &mut scene).is_detached());
        assert!(bench.offer_flake(slot, point, &mut scene).is_attached());
        let flake_node = bench.knapping.flake(point).unwrap().node();
        assert_eq!(scene.parent_of(flake_node), Some(slot_node));
        assert_eq!(bench.event_bus.buffered_count(EventKind::Attached), 1);
    }

    #[test]
    fn clock_never_moves_backwards() {
        let mut bench = Workbench::new();
        bench.advance_to(10);
        assert_eq!(bench.now(), 10);
        bench.advance_to(3);
        assert_eq!(bench.now(), 10);
        bench.step();
        assert_eq!(bench.now(), 11);
    }
}

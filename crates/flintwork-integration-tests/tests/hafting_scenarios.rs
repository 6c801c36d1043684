//! Integration test: hafting a knapped flake.
//!
//! A blank and a haft share one headless scene. The flake is knapped off,
//! then offered to the haft before and after its adhesive has been pressed
//! in, and the resulting scene hierarchy is checked.

use flintwork_core::capability::{AdhesivePart, AttachedPart, NoCapabilities};
use flintwork_core::event::EventKind;
use flintwork_core::geometry::Pose;
use flintwork_core::hafting::{
    AttachPointConfig, AttachTarget, ContactOutcome, HaftingModule, HandleConfig,
};
use flintwork_core::id::{AttachPointId, ColliderId, FlakeId, HandleId};
use flintwork_core::scene::{HeadlessScene, SceneMutator};
use flintwork_core::test_utils::{TestBlank, TestHaft, strike};
use flintwork_core::workbench::Workbench;
use glam::{Quat, Vec3};

struct Spear {
    bench: Workbench,
    scene: HeadlessScene,
    tip: FlakeId,
    handle: HandleId,
    socket: AttachPointId,
    mount: AttachPointId,
    mount_transform: flintwork_core::id::SceneNodeId,
    pitch: AdhesivePart,
}

const SOCKET_TRIGGER: ColliderId = ColliderId(500);
const MOUNT_TRIGGER: ColliderId = ColliderId(501);

fn spear() -> Spear {
    let mut blank = TestBlank::new(1);
    let mut config = blank.config("tip");
    config.attachable = true;
    let tip = blank.knapping.add_flake(blank.objective, config).unwrap();
    let mut scene = blank.scene;

    let shaft = scene.spawn("shaft", Pose::from_position(Vec3::new(5.0, 0.0, 0.0)));
    let mut hafting = HaftingModule::new();
    let handle = hafting.create_handle(HandleConfig::new("shaft", shaft));

    let socket_node = scene.spawn_child(shaft, "socket", Pose::IDENTITY);
    let mut socket_config = AttachPointConfig::new("socket", socket_node, AttachTarget::Adhesive);
    socket_config.triggers = vec![SOCKET_TRIGGER];
    let socket = hafting
        .add_attach_point(handle, socket_config, &mut scene)
        .unwrap();

    let mount_node = scene.spawn_child(shaft, "mount", Pose::IDENTITY);
    let mount_transform = scene.spawn_child(
        mount_node,
        "mount_attach",
        Pose::new(
            Vec3::new(5.0, 1.0, 0.0),
            Quat::from_rotation_x(std::f32::consts::FRAC_PI_2),
        ),
    );
    let mut mount_config = AttachPointConfig::new("mount", mount_node, AttachTarget::Flake);
    mount_config.attach_transform = Some(mount_transform);
    mount_config.triggers = vec![MOUNT_TRIGGER];
    mount_config.dependencies = vec![socket];
    let mount = hafting
        .add_attach_point(handle, mount_config, &mut scene)
        .unwrap();

    let pitch = AdhesivePart {
        node: scene.spawn("pitch", Pose::from_position(Vec3::new(-3.0, 0.0, 0.0))),
    };

    Spear {
        bench: Workbench::from_parts(blank.knapping, hafting),
        scene,
        tip,
        handle,
        socket,
        mount,
        mount_transform,
        pitch,
    }
}

#[test]
fn blocked_points_stay_inactive_until_unlocked() {
    let mut s = spear();
    let mount_node = s.bench.hafting.attach_point(s.mount).unwrap().node();
    assert!(!s.scene.node(mount_node).unwrap().active);
    // Pending points listen on their triggers even while blocked.
    assert_eq!(s.bench.hafting.point_for_trigger(MOUNT_TRIGGER), Some(s.mount));

    let (point, outcome) = s
        .bench
        .on_collider_contact(SOCKET_TRIGGER, &s.pitch, &mut s.scene)
        .unwrap();
    assert_eq!(point, s.socket);
    assert_eq!(
        outcome,
        ContactOutcome::Attached {
            part: AttachedPart::Adhesive(s.pitch),
            unlocked: vec![s.mount],
        }
    );
    assert!(s.scene.node(mount_node).unwrap().active);
    // The socket's trigger no longer routes.
    assert_eq!(s.bench.hafting.point_for_trigger(SOCKET_TRIGGER), None);
}

#[test]
fn flake_must_be_knapped_before_it_can_be_hafted() {
    let mut s = spear();
    s.bench.on_contact(s.socket, &s.pitch, &mut s.scene);

    // Still part of the blank.
    assert_eq!(
        s.bench.offer_flake(s.mount, s.tip, &mut s.scene),
        ContactOutcome::NoMatch
    );

    assert!(
        s.bench
            .on_impact(s.tip, &strike(Vec3::NEG_Z, 80.0), &mut s.scene)
            .is_detached()
    );
    let tip_node = s.bench.knapping.flake(s.tip).unwrap().node();
    let outcome = s.bench.offer_flake(s.mount, s.tip, &mut s.scene);
    assert!(outcome.is_attached());

    // Snapped onto the attach transform, parented there and frozen.
    let node = s.scene.node(tip_node).unwrap();
    assert_eq!(node.parent, Some(s.mount_transform));
    assert!(!node.dynamic);
    let snapped = s.scene.world_pose(tip_node);
    let target = s.scene.world_pose(s.mount_transform);
    assert!(snapped.position.abs_diff_eq(target.position, 1.0e-5));
    assert!(snapped.rotation.abs_diff_eq(target.rotation, 1.0e-5));

    let handle = s.bench.hafting.handle(s.handle).unwrap();
    assert!(handle.is_complete());
    assert_eq!(handle.flakes().len(), 1);
    assert_eq!(handle.adhesives(), &[s.pitch]);

    s.bench.step();
    assert_eq!(s.bench.event_bus.total_emitted(EventKind::Attached), 2);
    assert_eq!(s.bench.event_bus.total_emitted(EventKind::Detached), 1);
}

#[test]
fn filled_points_ignore_later_contacts() {
    let mut s = spear();
    assert!(s.bench.on_contact(s.socket, &s.pitch, &mut s.scene).is_attached());

    let other = AdhesivePart {
        node: s.scene.spawn("more pitch", Pose::IDENTITY),
    };
    assert_eq!(
        s.bench.on_contact(s.socket, &other, &mut s.scene),
        ContactOutcome::AlreadyAttached
    );
    assert_eq!(
        s.bench.on_contact(s.mount, &NoCapabilities, &mut s.scene),
        ContactOutcome::NoMatch
    );
    assert_eq!(s.bench.event_bus.total_emitted(EventKind::Attached), 1);
}

#[test]
fn one_part_cannot_fill_two_points() {
    let mut haft = TestHaft::new();
    let first = haft.point("first", AttachTarget::Adhesive, &[]);
    let second = haft.point("second", AttachTarget::Adhesive, &[]);
    let lump = haft.adhesive();

    assert!(haft.contact(first, &lump, 0).is_attached());
    assert_eq!(haft.contact(second, &lump, 0), ContactOutcome::PartAlreadyFixed);
    assert!(!haft.hafting.handle(haft.handle).unwrap().is_complete());

    let fresh = haft.adhesive();
    assert!(haft.contact(second, &fresh, 1).is_attached());
    assert!(haft.hafting.handle(haft.handle).unwrap().is_complete());
}

//! Serde data file structs for workbench definitions and replay scripts.
//!
//! These structs define the on-disk format for tool blanks, hafts, loose
//! adhesives and scripted contacts. They are deserialized from RON, JSON, or
//! TOML and then resolved into core types by the loader. Cross-references
//! (dependencies, adjacency, script targets) are by name.

use flintwork_core::geometry::Pose;
use flintwork_core::impact::ImpactThresholds;
use flintwork_core::knapping::DEFAULT_DETACH_COOLDOWN;
use flintwork_core::sim::Ticks;
use glam::{EulerRot, Quat, Vec3};
use serde::Deserialize;

// ===========================================================================
// Poses
// ===========================================================================

/// A pose relative to the parent entry. Rotation is XYZ Euler angles in
/// degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct PoseData {
    #[serde(default)]
    pub position: Vec3,
    #[serde(default)]
    pub rotation: Vec3,
}

impl PoseData {
    /// Convert to a core pose, rotation in radians.
    pub fn to_pose(&self) -> Pose {
        let rotation = Quat::from_euler(
            EulerRot::XYZ,
            self.rotation.x.to_radians(),
            self.rotation.y.to_radians(),
            self.rotation.z.to_radians(),
        );
        Pose::new(self.position, rotation)
    }
}

// ===========================================================================
// Top level
// ===========================================================================

/// A complete workbench definition.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkbenchData {
    #[serde(default)]
    pub blanks: Vec<BlankData>,
    #[serde(default)]
    pub hafts: Vec<HaftData>,
    #[serde(default)]
    pub adhesives: Vec<AdhesiveData>,
}

// ===========================================================================
// Knapping
// ===========================================================================

/// A tool blank and its flakes.
#[derive(Debug, Clone, Deserialize)]
pub struct BlankData {
    pub name: String,
    #[serde(default)]
    pub pose: PoseData,
    /// Prefab instantiated around each detached flake.
    #[serde(default)]
    pub interactable_prefab: u32,
    #[serde(default = "default_cooldown")]
    pub detach_cooldown: Ticks,
    pub flakes: Vec<FlakeData>,
}

fn default_cooldown() -> Ticks {
    DEFAULT_DETACH_COOLDOWN
}

/// One flake. Dependencies may be listed in any order; the loader registers
/// flakes after everything they depend on.
#[derive(Debug, Clone, Deserialize)]
pub struct FlakeData {
    pub name: String,
    /// Relative to the blank.
    #[serde(default)]
    pub pose: PoseData,
    #[serde(default)]
    pub colliders: Vec<u64>,
    #[serde(default)]
    pub offset_directions: Vec<Vec3>,
    #[serde(default = "default_max_angle")]
    pub max_angle: f32,
    #[serde(default = "default_min_force")]
    pub min_force: f32,
    #[serde(default = "default_removal_ratio")]
    pub removal_ratio: f32,
    #[serde(default)]
    pub attachable: bool,
    #[serde(default = "default_attach_direction")]
    pub attach_direction: Vec3,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub adjacent: Option<String>,
}

impl FlakeData {
    /// The strike thresholds for this flake.
    pub fn thresholds(&self) -> ImpactThresholds {
        ImpactThresholds {
            max_angle: self.max_angle,
            min_force: self.min_force,
            removal_ratio: self.removal_ratio,
        }
    }
}

fn default_max_angle() -> f32 {
    ImpactThresholds::default().max_angle
}

fn default_min_force() -> f32 {
    ImpactThresholds::default().min_force
}

fn default_removal_ratio() -> f32 {
    ImpactThresholds::default().removal_ratio
}

fn default_attach_direction() -> Vec3 {
    Vec3::Z
}

// ===========================================================================
// Hafting
// ===========================================================================

/// A haft and its attach points.
#[derive(Debug, Clone, Deserialize)]
pub struct HaftData {
    pub name: String,
    #[serde(default)]
    pub pose: PoseData,
    pub attach_points: Vec<AttachPointData>,
}

/// One attach point. `target` is checked at load time.
#[derive(Debug, Clone, Deserialize)]
pub struct AttachPointData {
    pub name: String,
    /// Relative to the haft.
    #[serde(default)]
    pub pose: PoseData,
    pub target: String,
    /// Separate attach transform, relative to the point. Parts snap onto the
    /// point itself when absent.
    #[serde(default)]
    pub attach_offset: Option<PoseData>,
    #[serde(default)]
    pub triggers: Vec<u64>,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// A loose lump of adhesive lying on the workbench.
#[derive(Debug, Clone, Deserialize)]
pub struct AdhesiveData {
    pub name: String,
    #[serde(default)]
    pub pose: PoseData,
}

// ===========================================================================
// Replay scripts
// ===========================================================================

/// A scripted sequence of callbacks replayed against a loaded workbench.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReplayScript {
    pub steps: Vec<ReplayStep>,
}

/// One scripted callback.
#[derive(Debug, Clone, Deserialize)]
pub enum ReplayStep {
    /// Strike a flake by name.
    Strike {
        blank: String,
        flake: String,
        direction: Vec3,
        force: f32,
        #[serde(default)]
        point: Vec3,
        #[serde(default)]
        knapper: u32,
    },
    /// Strike whatever flake owns a blank collider.
    StrikeCollider {
        collider: u64,
        direction: Vec3,
        force: f32,
        #[serde(default)]
        point: Vec3,
        #[serde(default)]
        knapper: u32,
    },
    /// Bring a part into contact with an attach point by name.
    Offer {
        haft: String,
        point: String,
        part: PartRef,
    },
    /// Bring a part into contact with a haft trigger collider.
    Touch { collider: u64, part: PartRef },
    /// Change who holds a blank.
    Hold {
        blank: String,
        #[serde(default)]
        holder: Option<u32>,
    },
    /// Deliver events and advance the clock.
    Step {
        #[serde(default = "default_step_ticks")]
        ticks: u64,
    },
}

fn default_step_ticks() -> u64 {
    1
}

/// A part offered to an attach point.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub enum PartRef {
    Adhesive { name: String },
    Flake { blank: String, flake: String },
    /// Something with no hafting capability.
    Nothing,
}

//! Strike validation: force, dependency ratio, cooldown and angle.
//!
//! The order of checks is fixed. A weak strike is reported as weak even if
//! dependencies also remain; a strike with dependencies remaining is
//! reported as such even if the blank is cooling down; only a strike that
//! passes every gate is tested for angle.

use crate::dependency::DependencyProgress;
use crate::geometry::angle_degrees;
use crate::id::InteractorId;
use glam::Vec3;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Inbound impact
// ---------------------------------------------------------------------------

/// A strike delivered by the host's physics callback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Impact {
    /// The interactor (hammerstone, hand) that delivered the strike.
    pub knapper: InteractorId,
    /// World-space contact point.
    pub point: Vec3,
    /// World-space direction of travel of the striker.
    pub direction: Vec3,
    /// Impact force, in the same units as [`ImpactThresholds::min_force`].
    pub force: f32,
}

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

/// Errors for thresholds outside their valid range.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ThresholdError {
    #[error("max angle {0} is outside [0, 180] degrees")]
    MaxAngle(f32),
    #[error("min force {0} must be finite and non-negative")]
    MinForce(f32),
    #[error("removal ratio {0} is outside [0, 1]")]
    RemovalRatio(f32),
}

/// Per-flake strike thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImpactThresholds {
    /// Largest angle, in degrees, between the reversed strike direction and
    /// an offset direction that still detaches the flake.
    pub max_angle: f32,
    /// Weakest force that can detach the flake.
    pub min_force: f32,
    /// Share of the flake's initial dependencies that must be cleared first.
    pub removal_ratio: f32,
}

impl ImpactThresholds {
    /// Check that every threshold is in range.
    pub fn validate(&self) -> Result<(), ThresholdError> {
        if !(0.0..=180.0).contains(&self.max_angle) {
            return Err(ThresholdError::MaxAngle(self.max_angle));
        }
        if !self.min_force.is_finite() || self.min_force < 0.0 {
            return Err(ThresholdError::MinForce(self.min_force));
        }
        if !(0.0..=1.0).contains(&self.removal_ratio) {
            return Err(ThresholdError::RemovalRatio(self.removal_ratio));
        }
        Ok(())
    }

    /// Whether `force` falls short of the minimum.
    pub fn is_weak(&self, force: f32) -> bool {
        force < self.min_force
    }

    /// True while fewer than `removal_ratio` of the initial dependencies have
    /// been cleared. Reaching the ratio exactly is enough.
    pub fn dependencies_remaining(&self, progress: DependencyProgress) -> bool {
        progress.initial != 0 && progress.removed_ratio() < self.removal_ratio
    }
}

impl Default for ImpactThresholds {
    fn default() -> Self {
        Self {
            max_angle: 20.0,
            min_force: 50.0,
            removal_ratio: 1.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Angle matching
// ---------------------------------------------------------------------------

/// Result of matching a strike against candidate offset directions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngleMatch {
    pub valid: bool,
    /// Angle to the matched candidate in degrees; NaN when nothing matched.
    pub angle: f32,
    /// The candidate that matched.
    pub direction: Option<Vec3>,
}

impl AngleMatch {
    fn miss() -> Self {
        Self {
            valid: false,
            angle: f32::NAN,
            direction: None,
        }
    }
}

/// Find the first candidate, in the given order, within `max_angle` degrees
/// of the reversed `impact_direction`.
///
/// First match wins even when a later candidate is closer: candidate order is
/// part of the configuration.
pub fn validate_angle<I>(impact_direction: Vec3, candidates: I, max_angle: f32) -> AngleMatch
where
    I: IntoIterator<Item = Vec3>,
{
    let reversed = -impact_direction;
    for candidate in candidates {
        let angle = angle_degrees(reversed, candidate);
        if angle <= max_angle {
            return AngleMatch {
                valid: true,
                angle,
                direction: Some(candidate),
            };
        }
    }
    AngleMatch::miss()
}

// ---------------------------------------------------------------------------
// Validator
// ---------------------------------------------------------------------------

/// Why a strike was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rejection {
    WeakImpact,
    DependenciesRemaining,
    DetachCooldown,
    InvalidAngle,
}

/// Outcome of [`ImpactValidator::evaluate`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    Accepted(AngleMatch),
    Rejected(Rejection),
}

/// Applies the gates of one flake in their contractual order.
#[derive(Debug, Clone, Copy)]
pub struct ImpactValidator {
    thresholds: ImpactThresholds,
}

impl ImpactValidator {
    /// A validator for one flake's thresholds.
    pub fn new(thresholds: ImpactThresholds) -> Self {
        Self { thresholds }
    }

    /// Evaluate a strike: force, then dependency ratio, then the aggregator's
    /// cooldown (`detach_available`), then angle against `candidates`.
    pub fn evaluate(
        &self,
        force: f32,
        progress: DependencyProgress,
        detach_available: bool,
        impact_direction: Vec3,
        candidates: &[Vec3],
    ) -> Verdict {
        if self.thresholds.is_weak(force) {
            return Verdict::Rejected(Rejection::WeakImpact);
        }
        if self.thresholds.dependencies_remaining(progress) {
            return Verdict::Rejected(Rejection::DependenciesRemaining);
        }
        if !detach_available {
            return Verdict::Rejected(Rejection::DetachCooldown);
        }
        let matched = validate_angle(
            impact_direction,
            candidates.iter().copied(),
            self.thresholds.max_angle,
        );
        if matched.valid {
            Verdict::Accepted(matched)
        } else {
            Verdict::Rejected(Rejection::InvalidAngle)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::angle_degrees;

    fn progress(initial: usize, remaining: usize) -> DependencyProgress {
        DependencyProgress { initial, remaining }
    }

    fn validator(max_angle: f32, min_force: f32, removal_ratio: f32) -> ImpactValidator {
        ImpactValidator::new(ImpactThresholds {
            max_angle,
            min_force,
            removal_ratio,
        })
    }

    #[test]
    fn head_on_strike_matches_with_zero_angle() {
        let m = validate_angle(Vec3::NEG_Z, [Vec3::Z], 20.0);
        assert!(m.valid);
        assert_eq!(m.angle, 0.0);
        assert_eq!(m.direction, Some(Vec3::Z));
    }

    #[test]
    fn first_match_wins_over_closer_candidate() {
        let near_edge = Vec3::new(0.3, 0.0, 1.0).normalize();
        let exact = Vec3::Z;
        let m = validate_angle(Vec3::NEG_Z, [near_edge, exact], 20.0);
        assert!(m.valid);
        assert_eq!(m.direction, Some(near_edge));
        assert!(m.angle > 0.0);
    }

    #[test]
    fn candidates_out_of_tolerance_are_skipped() {
        let m = validate_angle(Vec3::NEG_Z, [Vec3::X, Vec3::Z], 20.0);
        assert_eq!(m.direction, Some(Vec3::Z));
    }

    #[test]
    fn exact_max_angle_is_valid_and_epsilon_over_is_not() {
        let candidate = Vec3::new(0.4, 0.1, 1.0).normalize();
        let exact = angle_degrees(Vec3::Z, candidate);

        let at = validate_angle(Vec3::NEG_Z, [candidate], exact);
        assert!(at.valid);
        assert_eq!(at.angle, exact);

        let under = validate_angle(Vec3::NEG_Z, [candidate], exact - 1.0e-3);
        assert!(!under.valid);
    }

    #[test]
    fn no_candidates_never_match() {
        let m = validate_angle(Vec3::NEG_Z, std::iter::empty(), 180.0);
        assert!(!m.valid);
        assert!(m.angle.is_nan());
    }

    #[test]
    fn degenerate_strike_never_matches() {
        let m = validate_angle(Vec3::ZERO, [Vec3::Z], 180.0);
        assert!(!m.valid);
    }

    #[test]
    fn weak_impact_checked_before_everything() {
        let v = validator(20.0, 50.0, 1.0);
        let verdict = v.evaluate(30.0, progress(2, 2), false, Vec3::X, &[]);
        assert_eq!(verdict, Verdict::Rejected(Rejection::WeakImpact));
    }

    #[test]
    fn dependencies_checked_before_cooldown() {
        let v = validator(20.0, 50.0, 1.0);
        let verdict = v.evaluate(80.0, progress(2, 1), false, Vec3::NEG_Z, &[Vec3::Z]);
        assert_eq!(verdict, Verdict::Rejected(Rejection::DependenciesRemaining));
    }

    #[test]
    fn cooldown_checked_before_angle() {
        let v = validator(20.0, 50.0, 1.0);
        let verdict = v.evaluate(80.0, progress(0, 0), false, Vec3::X, &[Vec3::Z]);
        assert_eq!(verdict, Verdict::Rejected(Rejection::DetachCooldown));
    }

    #[test]
    fn angle_checked_last() {
        let v = validator(20.0, 50.0, 1.0);
        let verdict = v.evaluate(80.0, progress(0, 0), true, Vec3::X, &[Vec3::Z]);
        assert_eq!(verdict, Verdict::Rejected(Rejection::InvalidAngle));
    }

    #[test]
    fn accepted_strike_carries_match() {
        let v = validator(20.0, 50.0, 1.0);
        match v.evaluate(50.0, progress(0, 0), true, Vec3::NEG_Z, &[Vec3::Z]) {
            Verdict::Accepted(m) => assert_eq!(m.angle, 0.0),
            other => panic!("expected acceptance, got {other:?}"),
        }
    }

    #[test]
    fn ratio_boundary_passes() {
        let t = ImpactThresholds {
            removal_ratio: 0.5,
            ..ImpactThresholds::default()
        };
        assert!(!t.dependencies_remaining(progress(4, 2)));
        assert!(t.dependencies_remaining(progress(4, 3)));
        assert!(!t.dependencies_remaining(progress(0, 0)));
    }

    #[test]
    fn ratio_boundary_with_thirds() {
        let t = ImpactThresholds {
            removal_ratio: 1.0 / 3.0,
            ..ImpactThresholds::default()
        };
        assert!(!t.dependencies_remaining(progress(3, 2)));
        assert!(t.dependencies_remaining(progress(3, 3)));
    }

    #[test]
    fn zero_ratio_never_waits() {
        let t = ImpactThresholds {
            removal_ratio: 0.0,
            ..ImpactThresholds::default()
        };
        assert!(!t.dependencies_remaining(progress(5, 5)));
    }

    #[test]
    fn thresholds_validate_ranges() {
        assert!(ImpactThresholds::default().validate().is_ok());
        let bad_angle = ImpactThresholds {
            max_angle: 181.0,
            ..ImpactThresholds::default()
        };
        assert_eq!(bad_angle.validate(), Err(ThresholdError::MaxAngle(181.0)));
        let bad_force = ImpactThresholds {
            min_force: -1.0,
            ..ImpactThresholds::default()
        };
        assert!(matches!(bad_force.validate(), Err(ThresholdError::MinForce(_))));
        let bad_ratio = ImpactThresholds {
            removal_ratio: f32::NAN,
            ..ImpactThresholds::default()
        };
        assert!(matches!(bad_ratio.validate(), Err(ThresholdError::RemovalRatio(_))));
    }
}

//! Property-based tests for the flintwork core.
//!
//! Uses proptest to generate random dependency graphs, strike sequences and
//! removal orders, then verify the structural invariants hold.

use flintwork_core::dependency::{DependencyGraph, DependencyProgress};
use flintwork_core::id::FlakeId;
use flintwork_core::impact::{ImpactThresholds, ImpactValidator, Rejection, Verdict};
use flintwork_core::knapping::ImpactOutcome;
use flintwork_core::test_utils::*;
use glam::Vec3;
use proptest::prelude::*;
use proptest::sample::Index;
use slotmap::SlotMap;
use std::collections::BTreeSet;

// ===========================================================================
// Generators
// ===========================================================================

/// A DAG in registration order: node `i` depends only on nodes before it.
/// Paired with an arbitrary clearing order over all nodes.
fn arb_dag(max_nodes: usize) -> impl Strategy<Value = (Vec<Vec<usize>>, Vec<usize>)> {
    (1..=max_nodes).prop_flat_map(|n| {
        let deps = proptest::collection::vec(proptest::collection::vec(any::<Index>(), 0..4), n)
            .prop_map(|raw| {
                raw.into_iter()
                    .enumerate()
                    .map(|(i, picks)| {
                        if i == 0 {
                            return Vec::new();
                        }
                        picks.iter().map(|pick| pick.index(i)).collect()
                    })
                    .collect::<Vec<Vec<usize>>>()
            });
        let order = Just((0..n).collect::<Vec<usize>>()).prop_shuffle();
        (deps, order)
    })
}

fn arb_direction() -> impl Strategy<Value = Vec3> {
    (-1.0f32..1.0, -1.0f32..1.0, -1.0f32..1.0).prop_map(|(x, y, z)| Vec3::new(x, y, z))
}

fn build(deps: &[Vec<usize>]) -> (DependencyGraph<FlakeId>, Vec<FlakeId>) {
    let mut keys: SlotMap<FlakeId, ()> = SlotMap::with_key();
    let mut graph = DependencyGraph::new();
    let mut ids = Vec::with_capacity(deps.len());
    for predecessors in deps {
        let id = keys.insert(());
        let predecessors: Vec<FlakeId> = predecessors.iter().map(|&p| ids[p]).collect();
        graph.insert(id, &predecessors).unwrap();
        ids.push(id);
    }
    (graph, ids)
}

// ===========================================================================
// Properties
// ===========================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// A node is ready exactly when every predecessor it was registered with
    /// has been cleared, whatever order nodes are cleared in.
    #[test]
    fn readiness_tracks_cleared_predecessors((deps, order) in arb_dag(12)) {
        let (mut graph, ids) = build(&deps);
        let original: Vec<BTreeSet<usize>> =
            deps.iter().map(|d| d.iter().copied().collect()).collect();
        let mut cleared = vec![false; ids.len()];

        for &node in &order {
            let unlocked = graph.remove_edges(ids[node]);
            cleared[node] = true;

            // Reported exactly the uncleared dependents that just ran out.
            let expected: BTreeSet<FlakeId> = (0..ids.len())
                .filter(|&i| !cleared[i] && original[i].contains(&node))
                .filter(|&i| original[i].iter().all(|&p| cleared[p]))
                .map(|i| ids[i])
                .collect();
            prop_assert_eq!(unlocked.iter().copied().collect::<BTreeSet<_>>(), expected);

            for (i, &id) in ids.iter().enumerate() {
                let pending = original[i].iter().filter(|&&p| !cleared[p]).count();
                // Clearing a node drops its own predecessors too.
                let expected_remaining = if cleared[i] { 0 } else { pending };
                prop_assert_eq!(graph.remaining(id), expected_remaining);
                prop_assert_eq!(graph.initial(id), original[i].len());
                if !cleared[i] {
                    prop_assert_eq!(graph.is_ready(id), pending == 0);
                }
            }
        }

        // Clearing twice is a no-op.
        for &id in &ids {
            prop_assert!(graph.remove_edges(id).is_empty());
            prop_assert!(graph.is_cleared(id));
        }
    }

    /// Removed ratio never decreases and stays within [0, 1].
    #[test]
    fn removed_ratio_is_monotonic((deps, order) in arb_dag(10)) {
        let (mut graph, ids) = build(&deps);
        let mut last: Vec<f32> = ids.iter().map(|&id| graph.progress(id).removed_ratio()).collect();
        for &node in &order {
            graph.remove_edges(ids[node]);
            for (i, &id) in ids.iter().enumerate() {
                let ratio = graph.progress(id).removed_ratio();
                prop_assert!((0.0..=1.0).contains(&ratio));
                prop_assert!(ratio >= last[i]);
                last[i] = ratio;
            }
        }
    }

    /// A strike below the force threshold is weak no matter what else is
    /// wrong with it.
    #[test]
    fn weak_strikes_are_rejected_first(
        force in 0.0f32..50.0,
        remaining in 0usize..=3,
        available in any::<bool>(),
        direction in arb_direction(),
    ) {
        let validator = ImpactValidator::new(ImpactThresholds::default());
        let progress = DependencyProgress { initial: 3, remaining };
        let verdict = validator.evaluate(force, progress, available, direction, &[Vec3::Z]);
        prop_assert_eq!(verdict, Verdict::Rejected(Rejection::WeakImpact));
    }

    /// Accepted angles never exceed the threshold.
    #[test]
    fn accepted_angles_are_within_threshold(
        max_angle in 0.0f32..=180.0,
        direction in arb_direction(),
        candidates in proptest::collection::vec(arb_direction(), 0..4),
    ) {
        let thresholds = ImpactThresholds { max_angle, ..ImpactThresholds::default() };
        let progress = DependencyProgress { initial: 0, remaining: 0 };
        match ImpactValidator::new(thresholds).evaluate(80.0, progress, true, direction, &candidates) {
            Verdict::Accepted(matched) => {
                prop_assert!(matched.valid);
                prop_assert!(matched.angle <= max_angle);
            }
            Verdict::Rejected(rejection) => prop_assert_eq!(rejection, Rejection::InvalidAngle),
        }
    }

    /// Within one tick at most one flake of a blank comes off, however many
    /// strikes land.
    #[test]
    fn one_detach_per_tick(strikes in proptest::collection::vec((0usize..5, 40.0f32..120.0), 1..20)) {
        let mut blank = TestBlank::new(1);
        let flakes: Vec<FlakeId> = (0..5).map(|i| blank.add(&format!("f{i}"), &[])).collect();
        let detached = strikes
            .iter()
            .map(|&(i, force)| blank.strike(flakes[i], Vec3::NEG_Z, force, 0))
            .filter(ImpactOutcome::is_detached)
            .count();
        prop_assert!(detached <= 1);
        prop_assert_eq!(detached == 1, strikes.iter().any(|&(_, force)| force >= 50.0));
    }
}

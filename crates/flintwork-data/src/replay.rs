//! Scripted replay of inbound callbacks against a loaded workbench.

use crate::loader::{DataLoadError, LoadedWorkbench};
use crate::schema::{PartRef, ReplayScript, ReplayStep};
use flintwork_core::capability::NoCapabilities;
use flintwork_core::hafting::ContactOutcome;
use flintwork_core::id::{AttachPointId, ColliderId, InteractorId};
use flintwork_core::impact::Impact;
use flintwork_core::knapping::ImpactOutcome;
use flintwork_core::sim::Ticks;
use glam::Vec3;

/// Most ticks a single `Step` may advance.
pub const MAX_STEP_TICKS: u64 = 100_000;

/// What one script step did.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Impact(ImpactOutcome),
    /// A collider strike that no live flake owned.
    UnroutedImpact,
    Contact(ContactOutcome),
    /// A trigger contact that no pending attach point listened on.
    UnroutedContact,
    HolderChanged,
    /// Events delivered while stepping.
    Stepped { delivered: usize },
}

/// A step outcome stamped with the tick it ran at.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayRecord {
    pub step: usize,
    pub tick: Ticks,
    pub outcome: StepOutcome,
}

/// Run every step of `script` in order. Steps naming unknown blanks, flakes,
/// hafts, points, or adhesives abort the replay. A `Step` longer than
/// [`MAX_STEP_TICKS`] rejects the whole script before anything runs.
pub fn run_script(
    loaded: &mut LoadedWorkbench,
    script: &ReplayScript,
) -> Result<Vec<ReplayRecord>, DataLoadError> {
    check_step_lengths(script)?;
    let mut records = Vec::with_capacity(script.steps.len());
    for (step, entry) in script.steps.iter().enumerate() {
        let tick = loaded.workbench.now();
        let outcome = run_step(loaded, entry)?;
        tracing::debug!(step, tick, ?outcome, "replayed step");
        records.push(ReplayRecord {
            step,
            tick,
            outcome,
        });
    }
    Ok(records)
}

fn check_step_lengths(script: &ReplayScript) -> Result<(), DataLoadError> {
    for (step, entry) in script.steps.iter().enumerate() {
        if let ReplayStep::Step { ticks } = entry
            && *ticks > MAX_STEP_TICKS
        {
            return Err(DataLoadError::StepTooLong {
                step,
                ticks: *ticks,
                limit: MAX_STEP_TICKS,
            });
        }
    }
    Ok(())
}

fn impact(direction: Vec3, force: f32, point: Vec3, knapper: u32) -> Impact {
    Impact {
        knapper: InteractorId(knapper),
        point,
        direction,
        force,
    }
}

fn run_step(loaded: &mut LoadedWorkbench, step: &ReplayStep) -> Result<StepOutcome, DataLoadError> {
    let outcome = match step {
        ReplayStep::Strike {
            blank,
            flake,
            direction,
            force,
            point,
            knapper,
        } => {
            let id = loaded.flake(blank, flake)?;
            let hit = impact(*direction, *force, *point, *knapper);
            StepOutcome::Impact(loaded.workbench.on_impact(id, &hit, &mut loaded.scene))
        }
        ReplayStep::StrikeCollider {
            collider,
            direction,
            force,
            point,
            knapper,
        } => {
            let hit = impact(*direction, *force, *point, *knapper);
            match loaded
                .workbench
                .on_collider_impact(ColliderId(*collider), &hit, &mut loaded.scene)
            {
                Some((_, outcome)) => StepOutcome::Impact(outcome),
                None => StepOutcome::UnroutedImpact,
            }
        }
        ReplayStep::Offer { haft, point, part } => {
            let id = loaded.attach_point(haft, point)?;
            StepOutcome::Contact(offer(loaded, id, part)?)
        }
        ReplayStep::Touch { collider, part } => {
            match loaded.workbench.hafting.point_for_trigger(ColliderId(*collider)) {
                Some(id) => StepOutcome::Contact(offer(loaded, id, part)?),
                None => StepOutcome::UnroutedContact,
            }
        }
        ReplayStep::Hold { blank, holder } => {
            let objective = loaded.objective(blank)?;
            loaded
                .workbench
                .knapping
                .set_holder(objective, holder.map(InteractorId))?;
            StepOutcome::HolderChanged
        }
        ReplayStep::Step { ticks } => {
            let mut delivered = 0;
            for _ in 0..*ticks {
                delivered += loaded.workbench.step();
            }
            StepOutcome::Stepped { delivered }
        }
    };
    Ok(outcome)
}

fn offer(
    loaded: &mut LoadedWorkbench,
    point: AttachPointId,
    part: &PartRef,
) -> Result<ContactOutcome, DataLoadError> {
    let outcome = match part {
        PartRef::Adhesive { name } => {
            let adhesive = loaded.adhesive(name)?;
            loaded.workbench.on_contact(point, &adhesive, &mut loaded.scene)
        }
        PartRef::Flake { blank, flake } => {
            let id = loaded.flake(blank, flake)?;
            loaded.workbench.offer_flake(point, id, &mut loaded.scene)
        }
        PartRef::Nothing => loaded
            .workbench
            .on_contact(point, &NoCapabilities, &mut loaded.scene),
    };
    Ok(outcome)
}

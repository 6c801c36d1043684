//! Simulation time.
//!
//! Every gate in the core compares against a monotonic tick counter, never
//! wall-clock time, so that several contacts delivered within one physics
//! step all observe the same "now".

/// Ticks are the atomic unit of simulation time.
pub type Ticks = u64;

/// Monotonic simulation clock owned by the [`crate::workbench::Workbench`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SimClock {
    tick: Ticks,
}

impl SimClock {
    /// Create a clock starting at tick 0.
    pub fn new() -> Self {
        Self { tick: 0 }
    }

    /// Create a clock starting at the given tick.
    pub fn starting_at(tick: Ticks) -> Self {
        Self { tick }
    }

    /// The current tick.
    pub fn now(&self) -> Ticks {
        self.tick
    }

    /// Advance by one tick and return the new value.
    pub fn advance(&mut self) -> Ticks {
        self.advance_by(1)
    }

    /// Advance by `ticks` and return the new value. Saturates at `u64::MAX`.
    pub fn advance_by(&mut self, ticks: Ticks) -> Ticks {
        self.tick = self.tick.saturating_add(ticks);
        self.tick
    }
}

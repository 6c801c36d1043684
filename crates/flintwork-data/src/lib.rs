//! Data-driven workbench definitions for Flintwork.
//!
//! Blanks, hafts and loose adhesives are authored in RON, JSON, or TOML
//! ([`schema`]), resolved by name and built into a
//! [`flintwork_core::workbench::Workbench`] on a headless scene ([`loader`]).
//! Scripted callbacks can then be replayed against it ([`replay`]).

pub mod loader;
pub mod replay;
pub mod schema;

pub use loader::{DataLoadError, LoadedWorkbench, build_workbench, load_workbench};
pub use replay::{MAX_STEP_TICKS, ReplayRecord, StepOutcome, run_script};

//! Headless replay runner.
//!
//! Loads a workbench definition and a replay script, runs the script on a
//! headless scene, and reports what happened to every blank and haft.

use clap::Parser;
use flintwork_core::event::{Event, EventKind};
use flintwork_data::loader::deserialize_file;
use flintwork_data::schema::ReplayScript;
use flintwork_data::{DataLoadError, LoadedWorkbench, load_workbench, run_script};
use std::cell::RefCell;
use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;

/// Replay scripted strikes and contacts against a workbench definition
#[derive(Parser, Debug)]
#[command(name = "flintwork-replay")]
#[command(about = "Replay scripted strikes and contacts against a knapping/hafting workbench")]
struct Args {
    /// Workbench definition (.ron, .json or .toml)
    workbench: PathBuf,

    /// Replay script (.ron, .json or .toml)
    script: PathBuf,

    /// Print every step outcome, not just the summary
    #[arg(long, short = 'v')]
    verbose: bool,

    /// Event buffer capacity per event kind
    #[arg(long, default_value_t = 256)]
    event_capacity: usize,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(%err, "replay failed");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), DataLoadError> {
    let mut loaded = load_workbench(&args.workbench)?;
    let script: ReplayScript = deserialize_file(&args.script)?;
    loaded.workbench.event_bus = flintwork_core::event::EventBus::new(args.event_capacity);

    let tally = Rc::new(RefCell::new([0usize; EventKind::ALL.len()]));
    for (slot, kind) in EventKind::ALL.into_iter().enumerate() {
        let tally = Rc::clone(&tally);
        loaded.workbench.event_bus.on_passive(
            kind,
            Box::new(move |_: &Event| {
                tally.borrow_mut()[slot] += 1;
            }),
        );
    }

    tracing::info!(steps = script.steps.len(), "replaying {}", args.script.display());
    let records = run_script(&mut loaded, &script)?;
    // Flush whatever the last steps produced.
    loaded.workbench.step();

    if args.verbose {
        for record in &records {
            println!("[{:>4}] tick {:>5}  {:?}", record.step, record.tick, record.outcome);
        }
    }

    print_summary(&loaded);
    println!("events:");
    for (kind, count) in EventKind::ALL.iter().zip(tally.borrow().iter()) {
        println!("  {kind:?}: {count}");
    }
    Ok(())
}

fn print_summary(loaded: &LoadedWorkbench) {
    let knapping = &loaded.workbench.knapping;
    let mut blanks: Vec<_> = loaded.blanks.iter().collect();
    blanks.sort_by_key(|(name, _)| name.as_str());
    for (name, blank) in blanks {
        let Some(objective) = knapping.objective(blank.objective) else {
            continue;
        };
        println!(
            "blank {name}: {}/{} flakes detached",
            blank.flakes.len() - objective.flakes().len(),
            blank.flakes.len()
        );
    }

    let hafting = &loaded.workbench.hafting;
    let mut hafts: Vec<_> = loaded.hafts.iter().collect();
    hafts.sort_by_key(|(name, _)| name.as_str());
    for (name, haft) in hafts {
        let Some(handle) = hafting.handle(haft.handle) else {
            continue;
        };
        let status = if handle.is_complete() { "complete" } else { "incomplete" };
        println!(
            "haft {name}: {}/{} attach points filled ({status})",
            handle.joints().len(),
            handle.attach_points().len()
        );
    }
}

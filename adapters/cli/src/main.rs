#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that runs a Snake Ensemble session in the terminal.

mod board;
mod config;
mod cues;
mod presenter;

use std::{io, path::PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use snake_ensemble_core::{EdgePolicy, GridSize};
use snake_ensemble_system_autopilot::{DeadlineDecisions, DecisionSource, GreedyHeuristic};
use snake_ensemble_system_conductor::Conductor;
use snake_ensemble_world::query;
use tracing::info;

use crate::{
    config::FileConfig,
    presenter::{Output, Presenter},
};

const INPUT_SLOTS: [&str; 2] = ["WASD", "arrows"];

#[derive(Parser, Debug)]
#[command(
    name = "snake-ensemble",
    version,
    about = "Run a Snake Ensemble session and print every tick"
)]
struct Cli {
    /// TOML file with `[session]` and `[timing]` tables.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Number of ticks to run.
    #[arg(long, default_value_t = 32)]
    ticks: u64,
    /// Seed for every random placement.
    #[arg(long)]
    seed: Option<u64>,
    /// Side length of the grid.
    #[arg(long)]
    grid_size: Option<u32>,
    /// Boundary behaviour.
    #[arg(long, value_enum)]
    edge_policy: Option<EdgePolicyArg>,
    /// Ticks a dead agent waits before respawning.
    #[arg(long)]
    respawn_ticks: Option<u32>,
    /// Tempo in beats per minute, one tick per beat.
    #[arg(long, conflicts_with = "interval_ms")]
    bpm: Option<u32>,
    /// Milliseconds between ticks.
    #[arg(long)]
    interval_ms: Option<u64>,
    /// Milliseconds the decision worker may spend per agent.
    #[arg(long)]
    decision_budget_ms: Option<u64>,
    /// Evaluate decisions on a worker thread under the decision budget.
    #[arg(long)]
    decision_worker: bool,
    /// Hand every human agent to the autopilot before the first tick.
    #[arg(long)]
    all_autonomous: bool,
    /// Sleep for the tick interval between ticks.
    #[arg(long)]
    realtime: bool,
    /// Skip the board drawing.
    #[arg(long)]
    no_board: bool,
    /// Skip the musical cues.
    #[arg(long)]
    no_cues: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EdgePolicyArg {
    Wrap,
    Lethal,
}

impl From<EdgePolicyArg> for EdgePolicy {
    fn from(value: EdgePolicyArg) -> Self {
        match value {
            EdgePolicyArg::Wrap => EdgePolicy::Wrap,
            EdgePolicyArg::Lethal => EdgePolicy::Lethal,
        }
    }
}

impl Cli {
    fn apply_overrides(&self, file: &mut FileConfig) {
        let session = &mut file.session;
        if let Some(seed) = self.seed {
            session.seed = Some(seed);
        }
        if let Some(size) = self.grid_size {
            session.grid_size = Some(GridSize::new(size));
        }
        if let Some(policy) = self.edge_policy {
            session.edge_policy = Some(policy.into());
        }
        if let Some(ticks) = self.respawn_ticks {
            session.respawn_ticks = Some(ticks);
        }

        let timing = &mut file.timing;
        if let Some(bpm) = self.bpm {
            timing.bpm = Some(bpm);
        }
        if let Some(interval) = self.interval_ms {
            timing.bpm = None;
            timing.tick_interval_ms = Some(interval);
        }
        if let Some(budget) = self.decision_budget_ms {
            timing.decision_budget_ms = Some(budget);
        }
    }
}

/// Entry point for the Snake Ensemble command-line interface.
fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut file = match &cli.config {
        Some(path) => config::load(path)?,
        None => FileConfig::default(),
    };
    cli.apply_overrides(&mut file);
    let session = file.session.resolve();
    let timing = file.timing.resolve()?;

    let source: Box<dyn DecisionSource> = if cli.decision_worker {
        Box::new(DeadlineDecisions::spawn(
            GreedyHeuristic::new(),
            timing.decision_budget(),
        ))
    } else {
        Box::new(GreedyHeuristic::new())
    };
    let mut conductor =
        Conductor::new(session, timing, source).context("failed to build the session")?;

    println!("{}", query::welcome_banner(conductor.world()));
    if cli.all_autonomous {
        for agent in query::human_control(conductor.world()) {
            let _ = conductor.set_human_control(agent, false);
        }
    }
    print_bindings(&conductor);

    let stdout = io::stdout();
    let mut presenter = Presenter::new(
        stdout.lock(),
        Output {
            board: !cli.no_board,
            cues: !cli.no_cues,
        },
    );
    info!(
        ticks = cli.ticks,
        interval_ms = timing.tick_interval_ms,
        "starting session"
    );
    conductor.start_ticking();
    conductor.run(cli.ticks, &mut presenter, cli.realtime);

    let (deaths, growths) = presenter.totals();
    info!(ticks = cli.ticks, deaths, growths, "session finished");
    Ok(())
}

fn print_bindings(conductor: &Conductor) {
    let view = conductor.agent_view();
    for (slot, agent) in INPUT_SLOTS
        .iter()
        .zip(query::input_bindings(conductor.world()))
    {
        if let Some(snapshot) = agent.and_then(|agent| view.get(agent)) {
            println!(
                "{slot}: {}#{}",
                snapshot.role.label(),
                snapshot.id.get()
            );
        }
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

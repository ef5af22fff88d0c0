//! Tick sink that prints boards and cues to a writer.

use std::io::{self, Write};

use snake_ensemble_core::{ControlMode, Event, Transition};
use snake_ensemble_system_conductor::{TickDigest, TickSink};
use tracing::warn;

use crate::{board, cues};

/// What the presenter prints for every tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Output {
    pub(crate) board: bool,
    pub(crate) cues: bool,
}

/// Writes a text summary of each digest.
#[derive(Debug)]
pub(crate) struct Presenter<W> {
    out: W,
    output: Output,
    deaths: u64,
    growths: u64,
}

impl<W: Write> Presenter<W> {
    pub(crate) fn new(out: W, output: Output) -> Self {
        Self {
            out,
            output,
            deaths: 0,
            growths: 0,
        }
    }

    /// Deaths and growths seen so far.
    pub(crate) fn totals(&self) -> (u64, u64) {
        (self.deaths, self.growths)
    }

    fn write_digest(&mut self, digest: &TickDigest) -> io::Result<()> {
        writeln!(self.out, "tick {}", digest.tick)?;
        if self.output.board {
            writeln!(self.out, "{}", board::render(&digest.view, digest.grid_size))?;
        }

        for tick in &digest.agents {
            let control = match tick.control {
                ControlMode::Human => "human",
                ControlMode::Autonomous => "auto",
            };
            let mut line = format!(
                "  {}#{} {control} len {}",
                tick.role.label(),
                tick.agent.get(),
                tick.length
            );
            match tick.transition {
                Some(Transition::Died) => line.push_str(" died"),
                Some(Transition::Respawned) => line.push_str(" respawned"),
                None if tick.grew => line.push_str(" ate"),
                None => {}
            }
            if self.output.cues {
                if let Some(cue) = cues::cue_for(tick, digest.grid_size) {
                    line.push_str(&format!(" [{cue}]"));
                }
            }
            writeln!(self.out, "{line}")?;
        }

        for event in &digest.events {
            if let Event::Fault { agent, fault } = event {
                writeln!(self.out, "  fault {fault:?} agent {agent:?}")?;
            }
        }
        self.out.flush()
    }
}

impl<W: Write> TickSink for Presenter<W> {
    fn consume(&mut self, digest: &TickDigest) {
        for tick in &digest.agents {
            if tick.transition == Some(Transition::Died) {
                self.deaths += 1;
            }
            if tick.grew {
                self.growths += 1;
            }
        }
        if let Err(error) = self.write_digest(digest) {
            warn!(%error, "failed to print tick");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snake_ensemble_system_autopilot::GreedyHeuristic;
    use snake_ensemble_system_conductor::{Conductor, ConductorConfig};
    use snake_ensemble_world::SessionConfig;

    #[test]
    fn prints_one_block_per_tick() {
        let mut conductor = Conductor::new(
            SessionConfig::default(),
            ConductorConfig::default(),
            Box::new(GreedyHeuristic::new()),
        )
        .expect("default session");
        let mut presenter = Presenter::new(
            Vec::new(),
            Output {
                board: true,
                cues: true,
            },
        );

        let digest = conductor.advance();
        presenter.consume(&digest);

        let text = String::from_utf8(presenter.out).expect("utf8 output");
        assert!(text.starts_with("tick 1\n"));
        assert!(text.contains("LEAD#2 human len"));
        assert!(text.contains("[perc kick]"), "perc starts on the bottom row");
        let board_rows = text.lines().filter(|line| line.len() == 8).count();
        assert_eq!(board_rows, 8);
    }
}

#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Autonomous steering for agents that are not under human control.
//!
//! The autopilot is a pure system: it reads an [`AgentView`] snapshot, asks a
//! [`DecisionSource`] for every live autonomous agent and turns the answers
//! into [`Command::RequestDirection`] values. It never touches the world, so
//! decision sources cannot mutate simulation state either.

mod deadline;
mod greedy;

use snake_ensemble_core::{
    AgentSnapshot, AgentView, Command, ControlMode, Direction, EdgePolicy, GridPosition, GridSize,
};
use thiserror::Error;
use tracing::{debug, warn};

pub use deadline::DeadlineDecisions;
pub use greedy::GreedyHeuristic;

/// Read-only inputs handed to a decision source for one agent.
#[derive(Clone, Copy, Debug)]
pub struct DecisionContext<'a> {
    /// Agent being steered.
    pub agent: &'a AgentSnapshot,
    /// Cell the agent currently seeks.
    pub target: GridPosition,
    /// Every agent of the session, including the one being steered.
    pub agents: &'a AgentView,
    /// Side length of the grid.
    pub grid_size: GridSize,
    /// Boundary behaviour of the session.
    pub edge_policy: EdgePolicy,
}

/// Answer produced by a decision source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Decision {
    /// Requests a heading for the next tick.
    Turn(Direction),
    /// Leaves the agent on its current heading.
    NoOpinion,
}

/// Errors a decision source may report instead of a decision.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DecisionError {
    /// The source has no policy to evaluate, for example because no model is loaded.
    #[error("decision source is unavailable")]
    Unavailable,
    /// Evaluating the policy failed.
    #[error("decision source failed: {0}")]
    Failed(String),
    /// No answer arrived within the per-tick budget.
    #[error("decision source missed its budget of {budget_ms} ms")]
    TimedOut {
        /// Budget that elapsed, in milliseconds.
        budget_ms: u64,
    },
}

/// Policy that proposes headings for autonomous agents.
pub trait DecisionSource {
    /// Proposes a heading for `ctx.agent`.
    fn decide(&mut self, ctx: &DecisionContext<'_>) -> Result<Decision, DecisionError>;
}

impl<S> DecisionSource for Box<S>
where
    S: DecisionSource + ?Sized,
{
    fn decide(&mut self, ctx: &DecisionContext<'_>) -> Result<Decision, DecisionError> {
        (**self).decide(ctx)
    }
}

/// Counters describing the most recent planning pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlanStats {
    /// Agents the decision source was asked about.
    pub consulted: usize,
    /// Direction requests emitted.
    pub turns: usize,
    /// Answers that left the heading unchanged.
    pub unchanged: usize,
    /// Answers discarded because they reversed the heading.
    pub reversals: usize,
    /// Errors and timeouts reported by the source.
    pub failures: usize,
}

/// Pure system that steers every live autonomous agent.
#[derive(Debug, Default)]
pub struct Autopilot {
    last: PlanStats,
}

impl Autopilot {
    /// Creates an autopilot with empty statistics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Consults `source` for each live autonomous agent in `view` and emits
    /// direction requests into `out`, in ascending agent id order.
    ///
    /// Human agents and agents waiting to respawn are skipped. A failing
    /// source, a reversal or an answer matching the current heading all
    /// leave the agent going straight.
    pub fn plan<S>(
        &mut self,
        view: &AgentView,
        grid_size: GridSize,
        edge_policy: EdgePolicy,
        source: &mut S,
        out: &mut Vec<Command>,
    ) where
        S: DecisionSource + ?Sized,
    {
        let mut stats = PlanStats::default();

        for agent in view.iter() {
            if agent.control != ControlMode::Autonomous || !agent.is_alive() {
                continue;
            }

            stats.consulted += 1;
            let ctx = DecisionContext {
                agent,
                target: agent.target,
                agents: view,
                grid_size,
                edge_policy,
            };

            match source.decide(&ctx) {
                Ok(Decision::Turn(direction)) if direction.is_reverse_of(agent.heading) => {
                    stats.reversals += 1;
                    debug!(agent = agent.id.get(), ?direction, "discarding reversal");
                }
                Ok(Decision::Turn(direction)) if direction == agent.pending_heading => {
                    stats.unchanged += 1;
                }
                Ok(Decision::Turn(direction)) => {
                    stats.turns += 1;
                    out.push(Command::RequestDirection {
                        agent: agent.id,
                        direction,
                    });
                }
                Ok(Decision::NoOpinion) => stats.unchanged += 1,
                Err(error) => {
                    stats.failures += 1;
                    warn!(agent = agent.id.get(), %error, "decision source failed; going straight");
                }
            }
        }

        self.last = stats;
    }

    /// Statistics of the most recent call to [`Autopilot::plan`].
    #[must_use]
    pub fn last_stats(&self) -> PlanStats {
        self.last
    }
}

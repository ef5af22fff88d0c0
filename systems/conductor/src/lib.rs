#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Session loop that linearises control intents and drives world ticks.
//!
//! The [`Conductor`] owns the [`World`] for a session. Every tick it drains
//! queued [`Intent`] values, lets the [`Autopilot`] steer autonomous agents,
//! advances the world once and folds the resulting events into a
//! [`TickDigest`] for presentation sinks. Nothing else mutates the world, so
//! ticks never overlap and intents from other threads are ordered before the
//! tick that observes them.

use std::{
    sync::mpsc::{self, Receiver, Sender, TryRecvError},
    thread,
    time::Duration,
};

use serde::{Deserialize, Serialize};
use snake_ensemble_core::{
    AgentId, AgentTick, AgentView, Command, Direction, Event, GridSize, Role,
};
use snake_ensemble_system_autopilot::{Autopilot, DecisionSource, PlanStats};
use snake_ensemble_world::{self as world, query, SessionConfig, World, WorldError};
use thiserror::Error;
use tracing::{debug, info, warn};

const DEFAULT_TICK_INTERVAL_MS: u64 = 500;
const DEFAULT_DECISION_BUDGET_MS: u64 = 50;
const MILLIS_PER_MINUTE: u64 = 60_000;

/// Most events carried from paused timer periods into the next digest.
///
/// Older events are dropped first.
pub const PENDING_EVENT_LIMIT: usize = 1024;

/// Errors raised while assembling a conductor.
#[derive(Debug, Error)]
pub enum ConductorError {
    /// The session configuration was rejected by the world.
    #[error("invalid session: {0}")]
    Session(#[from] WorldError),
    /// A tempo of zero beats per minute was requested.
    #[error("tempo must be at least one beat per minute, got {bpm}")]
    InvalidTempo {
        /// Requested tempo.
        bpm: u32,
    },
}

/// Timing parameters of the session loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConductorConfig {
    /// Milliseconds between two ticks.
    pub tick_interval_ms: u64,
    /// Milliseconds a decision source may spend on one agent.
    pub decision_budget_ms: u64,
}

impl ConductorConfig {
    /// Derives the tick interval from a tempo, one tick per beat.
    pub fn from_bpm(bpm: u32) -> Result<Self, ConductorError> {
        if bpm == 0 {
            return Err(ConductorError::InvalidTempo { bpm });
        }
        Ok(Self {
            tick_interval_ms: MILLIS_PER_MINUTE / u64::from(bpm),
            ..Self::default()
        })
    }

    /// Time between two ticks.
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Budget granted to a decision source per agent.
    #[must_use]
    pub fn decision_budget(&self) -> Duration {
        Duration::from_millis(self.decision_budget_ms)
    }
}

impl Default for ConductorConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            decision_budget_ms: DEFAULT_DECISION_BUDGET_MS,
        }
    }
}

/// Control-surface requests that may arrive from any thread.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Intent {
    /// Stages a heading for a human-controlled agent.
    RequestDirection {
        /// Agent to steer.
        agent: AgentId,
        /// Requested heading.
        direction: Direction,
    },
    /// Adds an autonomous agent with the given role.
    AddAgent {
        /// Role of the new agent.
        role: Role,
    },
    /// Removes an agent.
    RemoveAgent {
        /// Agent to remove.
        agent: AgentId,
    },
    /// Grants or revokes human control.
    SetHumanControl {
        /// Agent whose control changes.
        agent: AgentId,
        /// `true` to grant human control.
        enabled: bool,
    },
    /// Flips an agent between human and autonomous control.
    ToggleControl {
        /// Agent whose control flips.
        agent: AgentId,
    },
    /// Resumes periodic ticking.
    StartTicking,
    /// Pauses periodic ticking.
    StopTicking,
    /// Rebuilds the session from configuration and pauses ticking.
    ResetSession,
}

impl Intent {
    fn into_command(self) -> Option<Command> {
        let command = match self {
            Intent::RequestDirection { agent, direction } => {
                Command::RequestDirection { agent, direction }
            }
            Intent::AddAgent { role } => Command::AddAgent { role },
            Intent::RemoveAgent { agent } => Command::RemoveAgent { agent },
            Intent::SetHumanControl { agent, enabled } => {
                Command::SetHumanControl { agent, enabled }
            }
            Intent::ToggleControl { agent } => Command::ToggleControl { agent },
            Intent::ResetSession => Command::ResetSession,
            Intent::StartTicking | Intent::StopTicking => return None,
        };
        Some(command)
    }
}

/// Cloneable handle that queues intents for the next tick.
#[derive(Clone, Debug)]
pub struct IntentSender {
    sender: Sender<Intent>,
}

impl IntentSender {
    /// Queues `intent`. Returns `false` once the conductor is gone.
    pub fn send(&self, intent: Intent) -> bool {
        match self.sender.send(intent) {
            Ok(()) => true,
            Err(mpsc::SendError(intent)) => {
                warn!(?intent, "conductor disconnected; dropping intent");
                false
            }
        }
    }
}

/// Everything that happened during one tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TickDigest {
    /// Tick number, starting at one after a reset.
    pub tick: u64,
    /// One report per agent, in ascending id order.
    pub agents: Vec<AgentTick>,
    /// Every event of the tick, including those of drained intents.
    pub events: Vec<Event>,
    /// Autopilot activity that preceded the tick.
    pub plan: PlanStats,
    /// Side length of the grid the tick ran on.
    pub grid_size: GridSize,
    /// Every agent as it stands after the tick.
    pub view: AgentView,
}

impl TickDigest {
    /// Report for a single agent, if it took part in the tick.
    #[must_use]
    pub fn agent(&self, agent: AgentId) -> Option<&AgentTick> {
        self.agents.iter().find(|tick| tick.agent == agent)
    }
}

/// Consumer of tick digests, such as a renderer or an audio bridge.
pub trait TickSink {
    /// Receives the digest of a completed tick.
    fn consume(&mut self, digest: &TickDigest);
}

/// Owns a session and advances it one tick at a time.
pub struct Conductor {
    world: World,
    autopilot: Autopilot,
    source: Box<dyn DecisionSource>,
    config: ConductorConfig,
    ticking: bool,
    pending: Vec<Event>,
    intents: Receiver<Intent>,
    sender: Sender<Intent>,
}

impl std::fmt::Debug for Conductor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conductor")
            .field("world", &self.world)
            .field("autopilot", &self.autopilot)
            .field("config", &self.config)
            .field("ticking", &self.ticking)
            .finish_non_exhaustive()
    }
}

impl Conductor {
    /// Builds the session described by `session`, paused.
    pub fn new(
        session: SessionConfig,
        config: ConductorConfig,
        source: Box<dyn DecisionSource>,
    ) -> Result<Self, ConductorError> {
        let world = World::new(session)?;
        let (sender, intents) = mpsc::channel();
        info!(
            grid_size = query::grid_size(&world).get(),
            agents = query::agent_view(&world).len(),
            "session ready"
        );

        Ok(Self {
            world,
            autopilot: Autopilot::new(),
            source,
            config,
            ticking: false,
            pending: Vec::new(),
            intents,
            sender,
        })
    }

    /// Read-only access to the session.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Snapshot of every agent.
    #[must_use]
    pub fn agent_view(&self) -> AgentView {
        query::agent_view(&self.world)
    }

    /// Timing parameters of the loop.
    #[must_use]
    pub fn config(&self) -> ConductorConfig {
        self.config
    }

    /// Handle for queuing intents from other threads.
    #[must_use]
    pub fn intent_sender(&self) -> IntentSender {
        IntentSender {
            sender: self.sender.clone(),
        }
    }

    /// Stages a heading for `agent`.
    pub fn request_direction(&mut self, agent: AgentId, direction: Direction) -> Vec<Event> {
        self.execute(Command::RequestDirection { agent, direction })
    }

    /// Adds an autonomous agent carrying `role`.
    pub fn add_agent(&mut self, role: Role) -> Vec<Event> {
        self.execute(Command::AddAgent { role })
    }

    /// Removes `agent` and releases its human slot.
    pub fn remove_agent(&mut self, agent: AgentId) -> Vec<Event> {
        self.execute(Command::RemoveAgent { agent })
    }

    /// Grants or revokes human control for `agent`.
    pub fn set_human_control(&mut self, agent: AgentId, enabled: bool) -> Vec<Event> {
        self.execute(Command::SetHumanControl { agent, enabled })
    }

    /// Flips `agent` between human and autonomous control.
    pub fn toggle_control(&mut self, agent: AgentId) -> Vec<Event> {
        self.execute(Command::ToggleControl { agent })
    }

    /// Rebuilds the session from configuration and pauses ticking.
    pub fn reset_session(&mut self) -> Vec<Event> {
        self.execute(Command::ResetSession)
    }

    /// Resumes periodic ticking.
    pub fn start_ticking(&mut self) {
        self.set_ticking(true);
    }

    /// Pauses periodic ticking.
    pub fn stop_ticking(&mut self) {
        self.set_ticking(false);
    }

    /// Reports whether timer callbacks advance the session.
    #[must_use]
    pub fn is_ticking(&self) -> bool {
        self.ticking
    }

    fn set_ticking(&mut self, ticking: bool) {
        if self.ticking != ticking {
            info!(ticking, "ticking changed");
        }
        self.ticking = ticking;
    }

    fn execute(&mut self, command: Command) -> Vec<Event> {
        let mut events = Vec::new();
        self.apply(command, &mut events);
        events
    }

    fn apply(&mut self, command: Command, out_events: &mut Vec<Event>) {
        if command == Command::ResetSession {
            self.set_ticking(false);
        }
        let start = out_events.len();
        world::apply(&mut self.world, command, out_events);
        log_events(&out_events[start..]);
    }

    fn drain_intents(&mut self) {
        let mut events = std::mem::take(&mut self.pending);
        loop {
            match self.intents.try_recv() {
                Ok(intent) => {
                    debug!(?intent, "applying queued intent");
                    match intent {
                        Intent::StartTicking => self.set_ticking(true),
                        Intent::StopTicking => self.set_ticking(false),
                        other => {
                            if let Some(command) = other.into_command() {
                                self.apply(command, &mut events);
                            }
                        }
                    }
                }
                // the conductor holds a sender, so the channel never disconnects
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        if events.len() > PENDING_EVENT_LIMIT {
            let dropped = events.len() - PENDING_EVENT_LIMIT;
            let _ = events.drain(..dropped);
            warn!(dropped, "discarding oldest events held while paused");
        }
        self.pending = events;
    }

    /// Timer callback: applies queued intents and ticks when running.
    pub fn on_timer(&mut self) -> Option<TickDigest> {
        self.drain_intents();
        if self.ticking {
            Some(self.advance())
        } else {
            None
        }
    }

    /// Advances the session by exactly one tick, whether or not it is running.
    pub fn advance(&mut self) -> TickDigest {
        self.drain_intents();
        let mut events = std::mem::take(&mut self.pending);

        let mut commands = Vec::new();
        self.autopilot.plan(
            &query::agent_view(&self.world),
            query::grid_size(&self.world),
            query::edge_policy(&self.world),
            self.source.as_mut(),
            &mut commands,
        );
        for command in commands {
            self.apply(command, &mut events);
        }
        self.apply(Command::Tick, &mut events);

        let agents = events
            .iter()
            .filter_map(|event| match event {
                Event::AgentTicked(tick) => Some(*tick),
                _ => None,
            })
            .collect();
        let digest = TickDigest {
            tick: query::tick_index(&self.world),
            agents,
            events,
            plan: self.autopilot.last_stats(),
            grid_size: query::grid_size(&self.world),
            view: query::agent_view(&self.world),
        };
        debug!(tick = digest.tick, agents = digest.agents.len(), "tick complete");
        digest
    }

    /// Runs `ticks` timer periods, handing every digest to `sink`.
    ///
    /// When `realtime` is set the loop sleeps for the tick interval between
    /// periods. Periods that fire while paused still drain intents.
    pub fn run<K>(&mut self, ticks: u64, sink: &mut K, realtime: bool)
    where
        K: TickSink + ?Sized,
    {
        for _ in 0..ticks {
            if let Some(digest) = self.on_timer() {
                sink.consume(&digest);
            }
            if realtime {
                thread::sleep(self.config.tick_interval());
            }
        }
    }
}

fn log_events(events: &[Event]) {
    for event in events {
        match event {
            Event::DirectionRejected {
                agent,
                direction,
                reason,
            } => debug!(agent = agent.get(), ?direction, ?reason, "direction rejected"),
            Event::ControlRejected { agent, reason } => {
                debug!(agent = agent.get(), ?reason, "control request rejected");
            }
            Event::AddAgentRejected { role, fault } => {
                warn!(role = role.label(), ?fault, "agent could not be placed");
            }
            Event::Fault { agent, fault } => {
                warn!(agent = ?agent.map(|agent| agent.get()), ?fault, "tick fault");
            }
            Event::ControlChanged {
                agent,
                mode,
                evicted,
            } => info!(agent = agent.get(), ?mode, evicted, "control changed"),
            Event::SessionReset { grid_size } => {
                info!(grid_size = grid_size.get(), "session reset");
            }
            _ => {}
        }
    }
}

#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state management for the Snake Ensemble.
//!
//! The world exclusively owns every agent of a session. All mutation goes
//! through [`apply`], which executes one [`Command`] as a single logical unit
//! and reports what happened as [`Event`] values. A [`Command::Tick`] advances
//! every agent exactly once, in ascending id order, so two worlds built from
//! the same configuration and fed the same commands stay identical.

pub mod arbitration;
pub mod grid;

mod agent;

use std::collections::{HashMap, HashSet};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use snake_ensemble_core::{
    AgentId, Command, ControlMode, ControlRejection, Direction, DirectionRejection, EdgePolicy,
    Event, Fault, GridPosition, GridSize, Role, DEFAULT_GRID_SIZE, DEFAULT_HEADING,
    DEFAULT_RESPAWN_TICKS, WELCOME_BANNER,
};
use thiserror::Error;

use self::{
    agent::{Agent, StepRules},
    arbitration::{Grant, HumanControlQueue},
    grid::GridError,
};

const DEFAULT_SESSION_SEED: u64 = 0x5eed_0f5c_a1e5_2024;
const MIN_GRID_SIZE: u32 = 2;
const MAX_GRID_SIZE: u32 = 4096;

/// Errors raised while building a session from configuration.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WorldError {
    /// The configured grid cannot hold an agent and its target, or is too large.
    #[error("grid size {size} is outside {}..={}", MIN_GRID_SIZE, MAX_GRID_SIZE)]
    InvalidGridSize {
        /// Configured side length.
        size: u32,
    },
    /// A roster entry pins cells that the grid cannot hold.
    #[error("roster entry {entry} is invalid: {reason}")]
    InvalidRoster {
        /// Zero-based index of the offending entry.
        entry: usize,
        /// Human readable description of the problem.
        reason: &'static str,
    },
    /// The roster does not fit on the grid.
    #[error(transparent)]
    Grid(#[from] GridError),
}

/// Describes one agent of the initial roster.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    /// Role carried by the agent.
    pub role: Role,
    /// Control mode requested at session start.
    #[serde(default = "autonomous")]
    pub control: ControlMode,
    /// Pinned body cells, head first. Empty means a random free cell.
    #[serde(default)]
    pub body: Vec<GridPosition>,
    /// Pinned starting heading. Defaults to the standard heading.
    #[serde(default)]
    pub heading: Option<Direction>,
    /// Pinned first target. Defaults to a random cell off the body.
    #[serde(default)]
    pub target: Option<GridPosition>,
}

impl RosterEntry {
    /// Creates an autonomous entry placed at a random cell.
    #[must_use]
    pub fn new(role: Role) -> Self {
        Self {
            role,
            control: ControlMode::Autonomous,
            body: Vec::new(),
            heading: None,
            target: None,
        }
    }

    /// Pins the body, head first.
    #[must_use]
    pub fn with_body<I>(mut self, body: I) -> Self
    where
        I: IntoIterator<Item = GridPosition>,
    {
        self.body = body.into_iter().collect();
        self
    }

    /// Pins the starting heading.
    #[must_use]
    pub fn with_heading(mut self, heading: Direction) -> Self {
        self.heading = Some(heading);
        self
    }

    /// Pins the first target.
    #[must_use]
    pub fn with_target(mut self, target: GridPosition) -> Self {
        self.target = Some(target);
        self
    }

    /// Requests human control at session start.
    #[must_use]
    pub fn human(mut self) -> Self {
        self.control = ControlMode::Human;
        self
    }
}

fn autonomous() -> ControlMode {
    ControlMode::Autonomous
}

/// Parameters that define a session. A reset rebuilds the session from them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Side length of the square grid.
    pub grid_size: GridSize,
    /// Boundary behaviour applied for the whole session.
    pub edge_policy: EdgePolicy,
    /// Ticks a dead agent waits before respawning.
    pub respawn_ticks: u32,
    /// Seed for every random placement of the session.
    pub seed: u64,
    /// Agents created when the session starts or resets.
    pub roster: Vec<RosterEntry>,
}

impl SessionConfig {
    /// Creates a configuration with the given grid and an empty roster.
    #[must_use]
    pub fn empty(grid_size: GridSize, edge_policy: EdgePolicy) -> Self {
        Self {
            grid_size,
            edge_policy,
            respawn_ticks: DEFAULT_RESPAWN_TICKS,
            seed: DEFAULT_SESSION_SEED,
            roster: Vec::new(),
        }
    }

    /// Checks the grid bounds and that every pinned cell fits the grid.
    pub fn validate(&self) -> Result<(), WorldError> {
        let size = self.grid_size;
        if !(MIN_GRID_SIZE..=MAX_GRID_SIZE).contains(&size.get()) {
            return Err(WorldError::InvalidGridSize { size: size.get() });
        }

        for (entry, roster) in self.roster.iter().enumerate() {
            let invalid = |reason| WorldError::InvalidRoster { entry, reason };
            if roster.body.iter().any(|cell| !grid::contains(size, *cell)) {
                return Err(invalid("body leaves the grid"));
            }
            let distinct: HashSet<GridPosition> = roster.body.iter().copied().collect();
            if distinct.len() != roster.body.len() {
                return Err(invalid("body overlaps itself"));
            }
            if let Some(target) = roster.target {
                if !grid::contains(size, target) {
                    return Err(invalid("target leaves the grid"));
                }
                if distinct.contains(&target) {
                    return Err(invalid("target lies on the body"));
                }
            }
        }

        Ok(())
    }
}

impl SessionConfig {
    /// Creates the four-voice roster with one agent in each grid corner.
    ///
    /// The two agents on the bottom row start under human control.
    #[must_use]
    pub fn four_corners(grid_size: GridSize, edge_policy: EdgePolicy) -> Self {
        let corner = grid_size.get().saturating_sub(1);
        Self {
            roster: vec![
                RosterEntry::new(Role::Bass)
                    .with_body([GridPosition::new(0, 0)])
                    .with_heading(Direction::Right),
                RosterEntry::new(Role::Pad)
                    .with_body([GridPosition::new(corner, 0)])
                    .with_heading(Direction::Down),
                RosterEntry::new(Role::Lead)
                    .with_body([GridPosition::new(0, corner)])
                    .with_heading(Direction::Up)
                    .human(),
                RosterEntry::new(Role::Perc)
                    .with_body([GridPosition::new(corner, corner)])
                    .with_heading(Direction::Left)
                    .human(),
            ],
            ..Self::empty(grid_size, edge_policy)
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::four_corners(DEFAULT_GRID_SIZE, EdgePolicy::default())
    }
}

/// Represents the authoritative Snake Ensemble world state.
#[derive(Clone, Debug)]
pub struct World {
    banner: &'static str,
    config: SessionConfig,
    agents: Vec<Agent>,
    control: HumanControlQueue,
    rng: ChaCha8Rng,
    next_agent_id: u32,
    tick_index: u64,
}

impl World {
    /// Creates a world populated with the configured roster.
    pub fn new(config: SessionConfig) -> Result<Self, WorldError> {
        config.validate()?;
        let mut world = Self {
            banner: WELCOME_BANNER,
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            config,
            agents: Vec::new(),
            control: HumanControlQueue::new(),
            next_agent_id: 0,
            tick_index: 0,
        };
        let mut discarded = Vec::new();
        world.populate(&mut discarded)?;
        Ok(world)
    }

    fn populate(&mut self, out_events: &mut Vec<Event>) -> Result<(), GridError> {
        self.agents.clear();
        self.control.clear();
        self.tick_index = 0;
        self.rng = ChaCha8Rng::seed_from_u64(self.config.seed);

        let size = self.config.grid_size;
        let mut occupied: HashSet<GridPosition> = self
            .config
            .roster
            .iter()
            .flat_map(|entry| entry.body.iter().copied())
            .collect();
        let roster = self.config.roster.clone();

        for entry in roster {
            let body = if entry.body.is_empty() {
                let head = grid::sample_point(size, &occupied, &mut self.rng)?;
                let _ = occupied.insert(head);
                vec![head]
            } else {
                entry.body
            };
            let target = match entry.target {
                Some(target) => target,
                None => {
                    let excluding: HashSet<GridPosition> = body.iter().copied().collect();
                    grid::sample_point(size, &excluding, &mut self.rng)?
                }
            };

            let id = self.allocate_id();
            let heading = entry.heading.unwrap_or(DEFAULT_HEADING);
            let agent = Agent::spawn(id, entry.role, body, heading, target);
            out_events.push(Event::AgentAdded {
                agent: id,
                role: agent.role,
                head: agent.head(),
                target: agent.target(),
            });
            self.agents.push(agent);

            if entry.control == ControlMode::Human {
                self.grant_human(id, out_events);
            }
        }

        Ok(())
    }

    fn allocate_id(&mut self) -> AgentId {
        let id = AgentId::new(self.next_agent_id);
        self.next_agent_id = self.next_agent_id.saturating_add(1);
        id
    }

    fn agent_index(&self, agent: AgentId) -> Option<usize> {
        self.agents
            .binary_search_by_key(&agent, |candidate| candidate.id)
            .ok()
    }

    fn agent_mut(&mut self, agent: AgentId) -> Option<&mut Agent> {
        let index = self.agent_index(agent)?;
        self.agents.get_mut(index)
    }

    fn rules(&self) -> StepRules {
        StepRules {
            size: self.config.grid_size,
            policy: self.config.edge_policy,
            respawn_ticks: self.config.respawn_ticks,
        }
    }

    fn occupancy(&self) -> HashMap<GridPosition, AgentId> {
        self.agents
            .iter()
            .flat_map(|agent| agent.body().map(move |cell| (cell, agent.id)))
            .collect()
    }

    fn add_agent(&mut self, role: Role, out_events: &mut Vec<Event>) {
        let size = self.config.grid_size;
        let occupied: HashSet<GridPosition> = self.occupancy().into_keys().collect();
        let placement = grid::sample_point(size, &occupied, &mut self.rng).and_then(|head| {
            let target = grid::sample_point(size, &HashSet::from([head]), &mut self.rng)?;
            Ok((head, target))
        });
        let Ok((head, target)) = placement else {
            out_events.push(Event::AddAgentRejected {
                role,
                fault: Fault::ExhaustedGrid,
            });
            return;
        };

        let id = self.allocate_id();
        self.agents
            .push(Agent::spawn(id, role, vec![head], DEFAULT_HEADING, target));
        out_events.push(Event::AgentAdded {
            agent: id,
            role,
            head,
            target,
        });
    }

    fn remove_agent(&mut self, agent: AgentId, out_events: &mut Vec<Event>) {
        let Some(index) = self.agent_index(agent) else {
            out_events.push(Event::ControlRejected {
                agent,
                reason: ControlRejection::UnknownAgent,
            });
            return;
        };

        let _ = self.control.revoke(agent);
        let _ = self.agents.remove(index);
        out_events.push(Event::AgentRemoved { agent });
    }

    fn grant_human(&mut self, agent: AgentId, out_events: &mut Vec<Event>) {
        let Some(index) = self.agent_index(agent) else {
            out_events.push(Event::ControlRejected {
                agent,
                reason: ControlRejection::UnknownAgent,
            });
            return;
        };
        if self.agents[index].control == ControlMode::Human && self.control.contains(agent) {
            return;
        }

        if let Grant::Granted {
            evicted: Some(evicted),
        } = self.control.grant(agent)
        {
            if let Some(displaced) = self.agent_mut(evicted) {
                displaced.control = ControlMode::Autonomous;
                out_events.push(Event::ControlChanged {
                    agent: evicted,
                    mode: ControlMode::Autonomous,
                    evicted: true,
                });
            }
        }

        self.agents[index].control = ControlMode::Human;
        out_events.push(Event::ControlChanged {
            agent,
            mode: ControlMode::Human,
            evicted: false,
        });
    }

    fn revoke_human(&mut self, agent: AgentId, out_events: &mut Vec<Event>) {
        let _ = self.control.revoke(agent);
        let Some(held) = self.agent_mut(agent) else {
            out_events.push(Event::ControlRejected {
                agent,
                reason: ControlRejection::UnknownAgent,
            });
            return;
        };
        if held.control == ControlMode::Autonomous {
            return;
        }

        held.control = ControlMode::Autonomous;
        out_events.push(Event::ControlChanged {
            agent,
            mode: ControlMode::Autonomous,
            evicted: false,
        });
    }

    fn purge_orphaned_control(&mut self, out_events: &mut Vec<Event>) {
        let agents = &self.agents;
        let orphans = self.control.purge(|agent| {
            agents
                .binary_search_by_key(&agent, |candidate| candidate.id)
                .is_ok()
        });
        for agent in orphans {
            out_events.push(Event::Fault {
                agent: Some(agent),
                fault: Fault::OrphanedControl,
            });
        }
    }

    fn tick(&mut self, out_events: &mut Vec<Event>) {
        self.purge_orphaned_control(out_events);
        self.tick_index = self.tick_index.saturating_add(1);
        out_events.push(Event::TimeAdvanced {
            tick: self.tick_index,
        });

        let rules = self.rules();
        let occupancy = self.occupancy();
        for agent in &mut self.agents {
            let outcome = agent.advance(rules, &occupancy, &mut self.rng);
            out_events.push(Event::AgentTicked(outcome.tick));
            if let Some(fault) = outcome.fault {
                out_events.push(Event::Fault {
                    agent: Some(agent.id),
                    fault,
                });
            }
        }
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::RequestDirection { agent, direction } => {
            let result = match world.agent_mut(agent) {
                Some(target) => target.request_direction(direction),
                None => Err(DirectionRejection::UnknownAgent),
            };
            if let Err(reason) = result {
                out_events.push(Event::DirectionRejected {
                    agent,
                    direction,
                    reason,
                });
            }
        }
        Command::AddAgent { role } => world.add_agent(role, out_events),
        Command::RemoveAgent { agent } => world.remove_agent(agent, out_events),
        Command::SetHumanControl { agent, enabled } => {
            if enabled {
                world.grant_human(agent, out_events);
            } else {
                world.revoke_human(agent, out_events);
            }
        }
        Command::ToggleControl { agent } => {
            match world.agent_index(agent).map(|index| world.agents[index].control) {
                Some(ControlMode::Human) => world.revoke_human(agent, out_events),
                Some(ControlMode::Autonomous) => world.grant_human(agent, out_events),
                None => out_events.push(Event::ControlRejected {
                    agent,
                    reason: ControlRejection::UnknownAgent,
                }),
            }
        }
        Command::Tick => world.tick(out_events),
        Command::ResetSession => {
            out_events.push(Event::SessionReset {
                grid_size: world.config.grid_size,
            });
            if world.populate(out_events).is_err() {
                out_events.push(Event::Fault {
                    agent: None,
                    fault: Fault::ExhaustedGrid,
                });
            }
        }
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use snake_ensemble_core::{
        AgentId, AgentSnapshot, AgentView, ControlMode, EdgePolicy, GridSize,
        HUMAN_CONTROL_CAPACITY,
    };

    use super::World;

    /// Retrieves the welcome banner that adapters may display to players.
    #[must_use]
    pub fn welcome_banner(world: &World) -> &'static str {
        world.banner
    }

    /// Side length of the session grid.
    #[must_use]
    pub fn grid_size(world: &World) -> GridSize {
        world.config.grid_size
    }

    /// Boundary behaviour of the session.
    #[must_use]
    pub fn edge_policy(world: &World) -> EdgePolicy {
        world.config.edge_policy
    }

    /// Number of ticks applied since the session was built or reset.
    #[must_use]
    pub fn tick_index(world: &World) -> u64 {
        world.tick_index
    }

    /// Captures a read-only view of every agent.
    #[must_use]
    pub fn agent_view(world: &World) -> AgentView {
        AgentView::from_snapshots(world.agents.iter().map(|agent| agent.snapshot()).collect())
    }

    /// Captures a single agent, if it exists.
    #[must_use]
    pub fn agent(world: &World, agent: AgentId) -> Option<AgentSnapshot> {
        world
            .agent_index(agent)
            .map(|index| world.agents[index].snapshot())
    }

    /// Agents holding human control, oldest grant first.
    #[must_use]
    pub fn human_control(world: &World) -> Vec<AgentId> {
        world.control.iter().collect()
    }

    /// Human-controlled agents mapped to local input slots.
    ///
    /// Slot one is the human agent with the lowest id, slot two the next one.
    #[must_use]
    pub fn input_bindings(world: &World) -> [Option<AgentId>; HUMAN_CONTROL_CAPACITY] {
        let mut bindings = [None; HUMAN_CONTROL_CAPACITY];
        let humans = world
            .agents
            .iter()
            .filter(|agent| agent.control == ControlMode::Human)
            .map(|agent| agent.id);
        for (slot, agent) in bindings.iter_mut().zip(humans) {
            *slot = Some(agent);
        }
        bindings
    }
}

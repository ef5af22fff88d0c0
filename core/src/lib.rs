#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Snake Ensemble engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and pure systems. Adapters and systems submit
//! [`Command`] values describing desired mutations, the world executes those
//! commands via its `apply` entry point, and then broadcasts [`Event`] values.
//! Systems query immutable [`AgentView`] snapshots and respond exclusively with
//! new command batches; presentation collaborators only ever see events.

use serde::{Deserialize, Serialize};

/// Canonical banner emitted when the experience boots.
pub const WELCOME_BANNER: &str = "Welcome to the Snake Ensemble.";

/// Grid size used when a session does not configure one.
pub const DEFAULT_GRID_SIZE: GridSize = GridSize::new(8);

/// Number of ticks a dead agent waits before it respawns.
pub const DEFAULT_RESPAWN_TICKS: u32 = 2;

/// Maximum number of agents that may hold human control at once.
pub const HUMAN_CONTROL_CAPACITY: usize = 2;

/// Heading assigned to freshly created and respawned agents.
pub const DEFAULT_HEADING: Direction = Direction::Right;

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Stages a new heading for the agent, subject to the reversal rule.
    RequestDirection {
        /// Agent whose heading should change.
        agent: AgentId,
        /// Heading requested for the next tick.
        direction: Direction,
    },
    /// Creates a new autonomous agent at a random free cell.
    AddAgent {
        /// Role assigned to the new agent.
        role: Role,
    },
    /// Destroys an agent and releases any human control it held.
    RemoveAgent {
        /// Agent targeted for removal.
        agent: AgentId,
    },
    /// Grants or revokes human control for an agent.
    SetHumanControl {
        /// Agent whose control mode should change.
        agent: AgentId,
        /// `true` to grant human control, `false` to hand it back to autopilot.
        enabled: bool,
    },
    /// Flips an agent between human and autonomous control.
    ToggleControl {
        /// Agent whose control mode should flip.
        agent: AgentId,
    },
    /// Advances every agent by exactly one discrete step.
    Tick,
    /// Rebuilds the initial roster from the session configuration.
    ResetSession,
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// Indicates that a tick started; followed by one `AgentTicked` per agent.
    TimeAdvanced {
        /// Sequence number of the tick, starting at one after a reset.
        tick: u64,
    },
    /// Describes the outcome of a single agent's step within a tick.
    AgentTicked(AgentTick),
    /// Confirms that an agent joined the session.
    AgentAdded {
        /// Identifier assigned to the new agent.
        agent: AgentId,
        /// Role carried by the agent.
        role: Role,
        /// Cell occupied by the agent's head.
        head: GridPosition,
        /// Cell the agent seeks.
        target: GridPosition,
    },
    /// Reports that an agent could not be created.
    AddAgentRejected {
        /// Role requested for the agent.
        role: Role,
        /// Fault that prevented placement.
        fault: Fault,
    },
    /// Confirms that an agent left the session.
    AgentRemoved {
        /// Identifier of the removed agent.
        agent: AgentId,
    },
    /// Confirms that an agent's control mode changed.
    ControlChanged {
        /// Agent whose control mode changed.
        agent: AgentId,
        /// Control mode now in effect.
        mode: ControlMode,
        /// Whether the change was forced by another agent taking a human slot.
        evicted: bool,
    },
    /// Reports that a control change request referenced an unknown agent.
    ControlRejected {
        /// Agent referenced by the rejected request.
        agent: AgentId,
        /// Reason the request was rejected.
        reason: ControlRejection,
    },
    /// Reports that a heading request was ignored.
    DirectionRejected {
        /// Agent referenced by the request.
        agent: AgentId,
        /// Heading that was requested.
        direction: Direction,
        /// Reason the request was ignored.
        reason: DirectionRejection,
    },
    /// Reports a structural problem that was corrected or deferred.
    Fault {
        /// Agent affected by the fault, if any.
        agent: Option<AgentId>,
        /// Kind of fault observed.
        fault: Fault,
    },
    /// Confirms that the session was rebuilt from configuration.
    SessionReset {
        /// Size of the rebuilt grid.
        grid_size: GridSize,
    },
}

/// Outcome of one agent's transition during a tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentTick {
    /// Agent that was advanced.
    pub agent: AgentId,
    /// Role carried by the agent.
    pub role: Role,
    /// Control mode in effect while the agent was advanced.
    pub control: ControlMode,
    /// Head cell after the step. Frozen while the agent is respawning.
    pub head: GridPosition,
    /// Cell the agent seeks after the step.
    pub target: GridPosition,
    /// Number of body segments after the step.
    pub length: usize,
    /// Lifecycle state after the step.
    pub lifecycle: Lifecycle,
    /// Lifecycle transition that happened during the step, if any.
    pub transition: Option<Transition>,
    /// Whether the agent consumed its target and grew.
    pub grew: bool,
    /// Edge row the live head currently touches, if any.
    pub edge: Option<EdgeRow>,
}

/// Lifecycle transitions reported in an [`AgentTick`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Transition {
    /// The agent hit a wall or itself and started its respawn countdown.
    Died,
    /// The agent finished its countdown and re-entered the grid.
    Respawned,
}

/// Horizontal grid edges used for rhythm mapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeRow {
    /// Row zero.
    Top,
    /// Last row of the grid.
    Bottom,
}

/// Lifecycle state of an agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Lifecycle {
    /// The agent moves every tick.
    Alive,
    /// The agent is frozen until its countdown elapses.
    Respawning {
        /// Ticks left before the respawn happens.
        remaining: u32,
    },
}

impl Lifecycle {
    /// Reports whether the agent is alive.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        matches!(self, Self::Alive)
    }
}

/// Who decides where an agent goes next.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlMode {
    /// Staged by external input requests.
    Human,
    /// Staged by the decision source each tick.
    Autonomous,
}

/// Closed set of ensemble roles. Only presentation collaborators care.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Low register voice.
    Bass,
    /// Sustained chord voice.
    Pad,
    /// Melodic voice.
    Lead,
    /// Percussion voice.
    Perc,
}

impl Role {
    /// Every role in declaration order.
    pub const ALL: [Role; 4] = [Role::Bass, Role::Pad, Role::Lead, Role::Perc];

    /// Upper-case label used by text adapters.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Bass => "BASS",
            Self::Pad => "PAD",
            Self::Lead => "LEAD",
            Self::Perc => "PERC",
        }
    }
}

/// Cardinal headings available to agents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Toward decreasing row indices.
    Up,
    /// Toward increasing row indices.
    Down,
    /// Toward decreasing column indices.
    Left,
    /// Toward increasing column indices.
    Right,
}

impl Direction {
    /// Every heading in declaration order.
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    /// Returns the heading pointing the other way.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }

    /// Reports whether `self` is the exact reverse of `heading`.
    #[must_use]
    pub fn is_reverse_of(self, heading: Direction) -> bool {
        self.opposite() == heading
    }
}

/// How movement behaves at the grid boundary. Fixed for a whole session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgePolicy {
    /// Leaving the grid re-enters on the opposite edge.
    Wrap,
    /// Leaving the grid is a wall collision.
    #[default]
    Lethal,
}

/// Unique identifier assigned to an agent. Never reused within a process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(u32);

impl AgentId {
    /// Creates a new agent identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Side length of the square grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GridSize(u32);

impl GridSize {
    /// Creates a new grid size wrapper.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the number of cells along each axis.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

impl Default for GridSize {
    fn default() -> Self {
        DEFAULT_GRID_SIZE
    }
}

/// Location of a single grid cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPosition {
    x: u32,
    y: u32,
}

impl GridPosition {
    /// Creates a new grid position.
    #[must_use]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Zero-based column index of the cell.
    #[must_use]
    pub const fn x(&self) -> u32 {
        self.x
    }

    /// Zero-based row index of the cell.
    #[must_use]
    pub const fn y(&self) -> u32 {
        self.y
    }
}

/// Reasons a heading request may be ignored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DirectionRejection {
    /// The request was the exact reverse of the committed heading.
    Reversal,
    /// No agent with the provided identifier exists.
    UnknownAgent,
    /// The agent is waiting to respawn.
    Respawning,
}

/// Reasons a control change may be rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlRejection {
    /// No agent with the provided identifier exists.
    UnknownAgent,
}

/// Structural problems detected while mutating the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Fault {
    /// Every cell was excluded when sampling a free position.
    ExhaustedGrid,
    /// The human control queue referenced an agent that no longer exists.
    OrphanedControl,
}

/// Immutable representation of a single agent's state used for queries.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AgentSnapshot {
    /// Unique identifier assigned to the agent.
    pub id: AgentId,
    /// Role carried by the agent.
    pub role: Role,
    /// Control mode currently in effect.
    pub control: ControlMode,
    /// Body cells, head first.
    pub body: Vec<GridPosition>,
    /// Heading committed by the last tick.
    pub heading: Direction,
    /// Heading staged for the next tick.
    pub pending_heading: Direction,
    /// Lifecycle state.
    pub lifecycle: Lifecycle,
    /// Cell the agent seeks.
    pub target: GridPosition,
}

impl AgentSnapshot {
    /// Cell occupied by the head segment.
    #[must_use]
    pub fn head(&self) -> GridPosition {
        self.body[0]
    }

    /// Reports whether the agent is alive.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.lifecycle.is_alive()
    }
}

/// Read-only snapshot describing every agent in the session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct AgentView {
    snapshots: Vec<AgentSnapshot>,
}

impl AgentView {
    /// Creates a new agent view from the provided snapshots.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<AgentSnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.id);
        Self { snapshots }
    }

    /// Iterator over the captured snapshots in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &AgentSnapshot> {
        self.snapshots.iter()
    }

    /// Looks up the snapshot of a single agent.
    #[must_use]
    pub fn get(&self, agent: AgentId) -> Option<&AgentSnapshot> {
        self.snapshots
            .binary_search_by_key(&agent, |snapshot| snapshot.id)
            .ok()
            .map(|index| &self.snapshots[index])
    }

    /// Number of agents captured by the view.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Reports whether the view holds no agents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Consumes the view, yielding the underlying snapshots.
    #[must_use]
    pub fn into_vec(self) -> Vec<AgentSnapshot> {
        self.snapshots
    }
}

use std::collections::{HashMap, HashSet, VecDeque};

use rand::Rng;
use snake_ensemble_core::{
    AgentId, AgentSnapshot, AgentTick, ControlMode, Direction, DirectionRejection, EdgePolicy,
    Fault, GridPosition, GridSize, Lifecycle, Role, Transition, DEFAULT_HEADING,
};

use crate::grid;

/// Session-wide parameters every agent transition reads.
#[derive(Clone, Copy, Debug)]
pub(crate) struct StepRules {
    pub(crate) size: GridSize,
    pub(crate) policy: EdgePolicy,
    pub(crate) respawn_ticks: u32,
}

/// Result of advancing one agent by a tick.
#[derive(Clone, Copy, Debug)]
pub(crate) struct StepOutcome {
    pub(crate) tick: AgentTick,
    pub(crate) fault: Option<Fault>,
}

#[derive(Clone, Debug)]
pub(crate) struct Agent {
    pub(crate) id: AgentId,
    pub(crate) role: Role,
    pub(crate) control: ControlMode,
    body: VecDeque<GridPosition>,
    heading: Direction,
    pending_heading: Direction,
    lifecycle: Lifecycle,
    target: GridPosition,
}

impl Agent {
    /// Creates a live, autonomous agent. `body` must hold at least one cell.
    pub(crate) fn spawn(
        id: AgentId,
        role: Role,
        body: Vec<GridPosition>,
        heading: Direction,
        target: GridPosition,
    ) -> Self {
        debug_assert!(!body.is_empty(), "agents need a head");
        Self {
            id,
            role,
            control: ControlMode::Autonomous,
            body: body.into(),
            heading,
            pending_heading: heading,
            lifecycle: Lifecycle::Alive,
            target,
        }
    }

    pub(crate) fn head(&self) -> GridPosition {
        self.body[0]
    }

    pub(crate) fn body(&self) -> impl Iterator<Item = GridPosition> + '_ {
        self.body.iter().copied()
    }

    pub(crate) fn target(&self) -> GridPosition {
        self.target
    }

    /// Stages `direction` for the next tick unless it reverses the heading.
    pub(crate) fn request_direction(
        &mut self,
        direction: Direction,
    ) -> Result<(), DirectionRejection> {
        if !self.lifecycle.is_alive() {
            return Err(DirectionRejection::Respawning);
        }
        if direction.is_reverse_of(self.heading) {
            return Err(DirectionRejection::Reversal);
        }
        self.pending_heading = direction;
        Ok(())
    }

    /// Advances the agent through exactly one lifecycle transition.
    ///
    /// `occupancy` maps every body cell to its owner as of the start of the
    /// tick and is only consulted when picking a respawn cell.
    pub(crate) fn advance<R>(
        &mut self,
        rules: StepRules,
        occupancy: &HashMap<GridPosition, AgentId>,
        rng: &mut R,
    ) -> StepOutcome
    where
        R: Rng + ?Sized,
    {
        match self.lifecycle {
            Lifecycle::Alive => self.step(rules, rng),
            Lifecycle::Respawning { remaining } if remaining > 0 => {
                self.lifecycle = Lifecycle::Respawning {
                    remaining: remaining - 1,
                };
                self.outcome(rules, None, false, None)
            }
            Lifecycle::Respawning { .. } => self.respawn(rules, occupancy, rng),
        }
    }

    fn step<R>(&mut self, rules: StepRules, rng: &mut R) -> StepOutcome
    where
        R: Rng + ?Sized,
    {
        let Some(next) = grid::step(self.head(), self.pending_heading, rules.size, rules.policy)
        else {
            return self.die(rules);
        };

        // the tail only blocks when it stays put, i.e. when the agent grows
        let grows = next == self.target;
        let blocking = if grows {
            self.body.len()
        } else {
            self.body.len() - 1
        };
        if self.body.iter().take(blocking).any(|cell| *cell == next) {
            return self.die(rules);
        }

        self.body.push_front(next);
        self.heading = self.pending_heading;

        if !grows {
            let _ = self.body.pop_back();
            return self.outcome(rules, None, false, None);
        }

        let excluding: HashSet<GridPosition> = self.body.iter().copied().collect();
        let fault = match grid::sample_point(rules.size, &excluding, rng) {
            Ok(target) => {
                self.target = target;
                None
            }
            Err(_) => Some(Fault::ExhaustedGrid),
        };
        self.outcome(rules, None, true, fault)
    }

    fn die(&mut self, rules: StepRules) -> StepOutcome {
        self.lifecycle = Lifecycle::Respawning {
            remaining: rules.respawn_ticks,
        };
        self.outcome(rules, Some(Transition::Died), false, None)
    }

    fn respawn<R>(
        &mut self,
        rules: StepRules,
        occupancy: &HashMap<GridPosition, AgentId>,
        rng: &mut R,
    ) -> StepOutcome
    where
        R: Rng + ?Sized,
    {
        let occupied: HashSet<GridPosition> = occupancy
            .iter()
            .filter(|(_, owner)| **owner != self.id)
            .map(|(cell, _)| *cell)
            .collect();
        let Ok(head) = grid::sample_point(rules.size, &occupied, rng) else {
            return self.outcome(rules, None, false, Some(Fault::ExhaustedGrid));
        };
        let Ok(target) = grid::sample_point(rules.size, &HashSet::from([head]), rng) else {
            return self.outcome(rules, None, false, Some(Fault::ExhaustedGrid));
        };

        self.body.clear();
        self.body.push_back(head);
        self.heading = DEFAULT_HEADING;
        self.pending_heading = DEFAULT_HEADING;
        self.target = target;
        self.lifecycle = Lifecycle::Alive;
        self.outcome(rules, Some(Transition::Respawned), false, None)
    }

    fn outcome(
        &self,
        rules: StepRules,
        transition: Option<Transition>,
        grew: bool,
        fault: Option<Fault>,
    ) -> StepOutcome {
        let head = self.head();
        let edge = if self.lifecycle.is_alive() {
            grid::edge_row(rules.size, head)
        } else {
            None
        };

        StepOutcome {
            tick: AgentTick {
                agent: self.id,
                role: self.role,
                control: self.control,
                head,
                target: self.target,
                length: self.body.len(),
                lifecycle: self.lifecycle,
                transition,
                grew,
                edge,
            },
            fault,
        }
    }

    pub(crate) fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            id: self.id,
            role: self.role,
            control: self.control,
            body: self.body.iter().copied().collect(),
            heading: self.heading,
            pending_heading: self.pending_heading,
            lifecycle: self.lifecycle,
            target: self.target,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    const RULES: StepRules = StepRules {
        size: GridSize::new(8),
        policy: EdgePolicy::Lethal,
        respawn_ticks: 2,
    };

    fn agent(body: &[(u32, u32)], heading: Direction, target: (u32, u32)) -> Agent {
        Agent::spawn(
            AgentId::new(0),
            Role::Bass,
            body.iter().map(|&(x, y)| GridPosition::new(x, y)).collect(),
            heading,
            GridPosition::new(target.0, target.1),
        )
    }

    #[test]
    fn growing_step_keeps_the_tail_and_relocates_the_target() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut agent = agent(&[(2, 2), (1, 2)], Direction::Right, (3, 2));

        let outcome = agent.advance(RULES, &HashMap::new(), &mut rng);

        assert!(outcome.tick.grew);
        assert_eq!(outcome.tick.length, 3);
        assert!(agent.body().all(|cell| cell != agent.target()));
    }

    #[test]
    fn growing_into_the_tail_is_a_collision() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        // a square loop whose tail cell also holds the target
        let mut agent = agent(&[(2, 2), (2, 3), (3, 3), (3, 2)], Direction::Up, (3, 2));
        assert!(agent.request_direction(Direction::Right).is_ok());

        let outcome = agent.advance(RULES, &HashMap::new(), &mut rng);

        assert_eq!(outcome.tick.transition, Some(Transition::Died));
    }

    #[test]
    fn respawning_agents_refuse_direction_requests() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut agent = agent(&[(7, 0)], Direction::Right, (0, 0));

        let outcome = agent.advance(RULES, &HashMap::new(), &mut rng);
        assert_eq!(outcome.tick.transition, Some(Transition::Died));
        assert_eq!(
            agent.request_direction(Direction::Down),
            Err(DirectionRejection::Respawning)
        );
    }
}

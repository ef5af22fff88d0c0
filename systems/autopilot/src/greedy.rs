use snake_ensemble_core::Direction;

use crate::{Decision, DecisionContext, DecisionError, DecisionSource};

/// Greedy steering toward the target, one axis at a time.
///
/// The horizontal axis wins when it is strictly farther away. A move that
/// would reverse the heading is skipped in favour of the other axis; when
/// neither axis helps the agent turns `Up`, or `Right` while heading `Up`.
#[derive(Clone, Copy, Debug, Default)]
pub struct GreedyHeuristic;

impl GreedyHeuristic {
    /// Creates the heuristic.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn choose(heading: Direction, dx: i64, dy: i64) -> Direction {
        let allowed = |direction: Direction| !direction.is_reverse_of(heading);

        if dx.abs() > dy.abs() {
            if dx > 0 && allowed(Direction::Right) {
                return Direction::Right;
            }
            if dx < 0 && allowed(Direction::Left) {
                return Direction::Left;
            }
        }

        if dy > 0 && allowed(Direction::Down) {
            return Direction::Down;
        }
        if dy < 0 && allowed(Direction::Up) {
            return Direction::Up;
        }

        if heading == Direction::Up {
            Direction::Right
        } else {
            Direction::Up
        }
    }
}

impl DecisionSource for GreedyHeuristic {
    fn decide(&mut self, ctx: &DecisionContext<'_>) -> Result<Decision, DecisionError> {
        let head = ctx.agent.head();
        let dx = i64::from(ctx.target.x()) - i64::from(head.x());
        let dy = i64::from(ctx.target.y()) - i64::from(head.y());
        Ok(Decision::Turn(Self::choose(ctx.agent.heading, dx, dy)))
    }
}

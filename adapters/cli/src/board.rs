//! Text rendering of the grid.

use snake_ensemble_core::{AgentSnapshot, AgentView, GridPosition, GridSize, Role};

const EMPTY: char = '.';
const TARGET: char = '*';
const FROZEN: char = '~';

fn head_glyph(role: Role) -> char {
    match role {
        Role::Bass => 'B',
        Role::Pad => 'P',
        Role::Lead => 'L',
        Role::Perc => 'X',
    }
}

/// Draws every agent and its target, one text row per grid row.
///
/// Later agents overwrite earlier ones; bodies always cover targets.
pub(crate) fn render(view: &AgentView, grid_size: GridSize) -> String {
    let size = usize::try_from(grid_size.get()).unwrap_or(0);
    let mut cells = vec![vec![EMPTY; size]; size];
    let mut put = |cell: GridPosition, glyph: char| {
        let row = usize::try_from(cell.y()).ok();
        let column = usize::try_from(cell.x()).ok();
        if let Some(slot) = row
            .and_then(|row| cells.get_mut(row))
            .and_then(|line| column.and_then(|column| line.get_mut(column)))
        {
            *slot = glyph;
        }
    };

    for agent in view.iter() {
        put(agent.target, TARGET);
    }
    for agent in view.iter() {
        draw_agent(agent, &mut put);
    }

    cells
        .into_iter()
        .map(|line| line.into_iter().collect::<String>())
        .collect::<Vec<_>>()
        .join("\n")
}

fn draw_agent(agent: &AgentSnapshot, put: &mut impl FnMut(GridPosition, char)) {
    let head = head_glyph(agent.role);
    for (index, cell) in agent.body.iter().enumerate() {
        let glyph = if !agent.is_alive() {
            FROZEN
        } else if index == 0 {
            head
        } else {
            head.to_ascii_lowercase()
        };
        put(*cell, glyph);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snake_ensemble_core::{AgentId, ControlMode, Direction, Lifecycle};

    fn agent(
        id: u32,
        role: Role,
        body: &[(u32, u32)],
        target: (u32, u32),
        lifecycle: Lifecycle,
    ) -> AgentSnapshot {
        AgentSnapshot {
            id: AgentId::new(id),
            role,
            control: ControlMode::Autonomous,
            body: body.iter().map(|&(x, y)| GridPosition::new(x, y)).collect(),
            heading: Direction::Right,
            pending_heading: Direction::Right,
            lifecycle,
            target: GridPosition::new(target.0, target.1),
        }
    }

    #[test]
    fn draws_heads_bodies_and_targets() {
        let view = AgentView::from_snapshots(vec![
            agent(0, Role::Bass, &[(2, 0), (1, 0)], (3, 2), Lifecycle::Alive),
            agent(
                1,
                Role::Perc,
                &[(0, 3)],
                (1, 0),
                Lifecycle::Respawning { remaining: 1 },
            ),
        ]);

        let board = render(&view, GridSize::new(4));

        assert_eq!(board, ".bB.\n....\n...*\n~...");
    }
}

//! Pure coordinate math for the square session grid.

use std::collections::HashSet;

use rand::Rng;
use snake_ensemble_core::{Direction, EdgePolicy, EdgeRow, GridPosition, GridSize};
use thiserror::Error;

const REJECTION_ATTEMPTS: usize = 32;

/// Errors produced by grid sampling.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum GridError {
    /// Every cell of the grid was excluded from sampling.
    #[error("no free cell left on the {size}x{size} grid")]
    ExhaustedGrid {
        /// Side length of the exhausted grid.
        size: u32,
    },
}

/// Applies one unit of movement along `direction`.
///
/// Under [`EdgePolicy::Wrap`] a move across the boundary re-enters on the
/// opposite edge. Under [`EdgePolicy::Lethal`] the same move yields `None`,
/// which callers treat as a wall collision. The position is never clipped.
#[must_use]
pub fn step(
    position: GridPosition,
    direction: Direction,
    size: GridSize,
    policy: EdgePolicy,
) -> Option<GridPosition> {
    let bound = size.get();
    if bound == 0 {
        return None;
    }

    let last = bound - 1;
    let wraps = policy == EdgePolicy::Wrap;
    let (x, y) = (position.x(), position.y());
    let (x, y) = match direction {
        Direction::Up if y == 0 => (x, wraps.then_some(last)?),
        Direction::Up => (x, y - 1),
        Direction::Down if y >= last => (x, wraps.then_some(0)?),
        Direction::Down => (x, y + 1),
        Direction::Left if x == 0 => (wraps.then_some(last)?, y),
        Direction::Left => (x - 1, y),
        Direction::Right if x >= last => (wraps.then_some(0)?, y),
        Direction::Right => (x + 1, y),
    };

    Some(GridPosition::new(x, y))
}

/// Reports whether the position lies inside the grid.
#[must_use]
pub fn contains(size: GridSize, position: GridPosition) -> bool {
    position.x() < size.get() && position.y() < size.get()
}

/// Total number of cells on the grid.
#[must_use]
pub fn cell_count(size: GridSize) -> usize {
    let side = usize::try_from(size.get()).unwrap_or(usize::MAX);
    side.saturating_mul(side)
}

/// Iterates every cell in row-major order.
pub fn cells(size: GridSize) -> impl Iterator<Item = GridPosition> {
    let side = size.get();
    (0..side).flat_map(move |y| (0..side).map(move |x| GridPosition::new(x, y)))
}

/// Uniformly samples a cell that is not contained in `excluding`.
///
/// Sparse grids draw random cells and reject excluded ones. Once half the
/// grid is excluded, or the draws keep missing, the free cells are enumerated.
pub fn sample_point<R>(
    size: GridSize,
    excluding: &HashSet<GridPosition>,
    rng: &mut R,
) -> Result<GridPosition, GridError>
where
    R: Rng + ?Sized,
{
    let side = size.get();
    if side > 0 && excluding.len() < cell_count(size) / 2 {
        for _ in 0..REJECTION_ATTEMPTS {
            let cell = GridPosition::new(rng.gen_range(0..side), rng.gen_range(0..side));
            if !excluding.contains(&cell) {
                return Ok(cell);
            }
        }
    }

    let free: Vec<GridPosition> = cells(size)
        .filter(|cell| !excluding.contains(cell))
        .collect();
    if free.is_empty() {
        return Err(GridError::ExhaustedGrid { size: side });
    }

    Ok(free[rng.gen_range(0..free.len())])
}

/// Edge row touched by the position, used for rhythm mapping.
#[must_use]
pub fn edge_row(size: GridSize, position: GridPosition) -> Option<EdgeRow> {
    if position.y() == 0 {
        Some(EdgeRow::Top)
    } else if position.y().saturating_add(1) == size.get() {
        Some(EdgeRow::Bottom)
    } else {
        None
    }
}

use blastgrid_core::snapshot::{Cell, Direction};

use crate::board::Board;

/// Cells touched by one detonation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Blast {
    /// Every burning cell, origin first, then each arm outward.
    pub cells: Vec<(i32, i32)>,
    /// Destructible cells this blast turned into open ground.
    pub destroyed: Vec<(i32, i32)>,
}

/// Propagate a cross-shaped blast from `origin`.
///
/// Each arm walks up to `radius` cells. It stops before a solid cell or the
/// board edge, and stops on (and clears) the first destructible cell.
pub fn detonate(board: &mut Board, origin: (i32, i32), radius: u32) -> Blast {
    let mut blast = Blast {
        cells: vec![origin],
        destroyed: Vec::new(),
    };
    for dir in Direction::ALL {
        let (dx, dy) = dir.delta();
        for r in 1..=radius as i32 {
            let (x, y) = (origin.0 + dx * r, origin.1 + dy * r);
            match board.get(x, y) {
                None | Some(Cell::Solid) => break,
                Some(Cell::Destructible) => {
                    board.set(x, y, Cell::Open);
                    blast.cells.push((x, y));
                    blast.destroyed.push((x, y));
                    break;
                },
                Some(Cell::Open) => blast.cells.push((x, y)),
            }
        }
    }
    blast
}

use rand::Rng;

use blastgrid_core::snapshot::Cell;

pub const MIN_BOARD_SIZE: usize = 9;
pub const MAX_BOARD_SIZE: usize = 21;
pub const DEFAULT_BOARD_SIZE: usize = 13;

/// Clamp a requested side length to `[MIN_BOARD_SIZE, MAX_BOARD_SIZE]` and
/// round even values up to the next odd one.
pub fn normalize_board_size(requested: usize) -> usize {
    let size = requested.clamp(MIN_BOARD_SIZE, MAX_BOARD_SIZE);
    if size % 2 == 0 { size + 1 } else { size }
}

/// Square grid of cells, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    size: usize,
    cells: Vec<Cell>,
}

impl Board {
    /// Generate a fresh board: solid border and even/even pillars, with
    /// destructible cells seeded at `density` outside the spawn corners.
    pub fn generate<R: Rng + ?Sized>(size: usize, density: f64, rng: &mut R) -> Self {
        let size = normalize_board_size(size);
        let mut cells = Vec::with_capacity(size * size);
        for y in 0..size {
            for x in 0..size {
                let cell = if is_skeleton(x, y, size) {
                    Cell::Solid
                } else if !is_spawn_reserved(x, y, size) && rng.random_bool(density) {
                    Cell::Destructible
                } else {
                    Cell::Open
                };
                cells.push(cell);
            }
        }
        Self { size, cells }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 {
            return None;
        }
        let (x, y) = (x as usize, y as usize);
        (x < self.size && y < self.size).then_some(y * self.size + x)
    }

    /// Cell at `(x, y)`, or `None` off the board.
    pub fn get(&self, x: i32, y: i32) -> Option<Cell> {
        self.index(x, y).map(|i| self.cells[i])
    }

    pub fn set(&mut self, x: i32, y: i32, cell: Cell) {
        if let Some(i) = self.index(x, y) {
            self.cells[i] = cell;
        }
    }

    /// Whether `(x, y)` lies inside the border ring.
    pub fn is_inner(&self, x: i32, y: i32) -> bool {
        let max = self.size as i32 - 2;
        (1..=max).contains(&x) && (1..=max).contains(&y)
    }

    /// The four spawn corners in assignment order.
    pub fn spawn_points(&self) -> [(i32, i32); 4] {
        let far = self.size as i32 - 2;
        [(1, 1), (far, 1), (1, far), (far, far)]
    }

    /// Rows of cells for a snapshot, indexed `[y][x]`.
    pub fn rows(&self) -> Vec<Vec<Cell>> {
        self.cells.chunks(self.size).map(<[Cell]>::to_vec).collect()
    }
}

fn is_skeleton(x: usize, y: usize, size: usize) -> bool {
    x == 0 || y == 0 || x == size - 1 || y == size - 1 || (x % 2 == 0 && y % 2 == 0)
}

/// Spawn corners plus their two inner neighbours. Never seeded with bricks.
fn is_spawn_reserved(x: usize, y: usize, size: usize) -> bool {
    let near = |v: usize| v == 1 || v == 2;
    let far = |v: usize| v == size - 2 || v == size - 3;
    let corner = |v: usize, first: bool| if first { v == 1 } else { v == size - 2 };
    [(true, true), (false, true), (true, false), (false, false)]
        .into_iter()
        .any(|(left, top)| {
            let in_x = if left { near(x) } else { far(x) };
            let in_y = if top { near(y) } else { far(y) };
            in_x && in_y && (corner(x, left) || corner(y, top))
        })
}

use serde::{Deserialize, Serialize};

use crate::player::{PlayerColor, PlayerId};

/// Contents of a single board cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cell {
    Open,
    Solid,
    Destructible,
}

/// Movement direction on the board. Y grows downward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    /// Unit step `(dx, dy)` for this direction.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }
}

/// Kind of collectible dropped by a destroyed cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerUpKind {
    ExtraBomb,
    ExtraFlame,
    ExtraSpeed,
}

impl PowerUpKind {
    pub const ALL: [PowerUpKind; 3] = [
        PowerUpKind::ExtraBomb,
        PowerUpKind::ExtraFlame,
        PowerUpKind::ExtraSpeed,
    ];
}

/// Lifecycle of a single match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchState {
    #[default]
    Waiting,
    Playing,
    Ended,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub alive: bool,
    pub bombs: u32,
    pub max_bombs: u32,
    pub flame: u32,
    pub speed: f32,
    pub kills: u32,
    pub color: PlayerColor,
}

/// An armed bomb.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bomb {
    pub owner: PlayerId,
    pub x: i32,
    pub y: i32,
    /// Remaining fuse in milliseconds.
    pub fuse_ms: u32,
    pub radius: u32,
}

/// A single burning cell of a blast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Explosion {
    pub x: i32,
    pub y: i32,
    /// Owner of the bomb that produced this cell.
    pub owner: PlayerId,
    /// Simulation time (ms) at which the cell stops burning.
    pub expires_at_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerUp {
    pub x: i32,
    pub y: i32,
    pub kind: PowerUpKind,
}

/// Immutable view of one match, broadcast to every connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub board_size: usize,
    /// Rows of cells, indexed `grid[y][x]`.
    pub grid: Vec<Vec<Cell>>,
    pub players: Vec<PlayerView>,
    pub bombs: Vec<Bomb>,
    pub explosions: Vec<Explosion>,
    pub powerups: Vec<PowerUp>,
    pub state: MatchState,
    pub winner: Option<PlayerId>,
}

impl GameSnapshot {
    pub fn player(&self, id: PlayerId) -> Option<&PlayerView> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn cell(&self, x: i32, y: i32) -> Option<Cell> {
        if x < 0 || y < 0 {
            return None;
        }
        self.grid.get(y as usize)?.get(x as usize).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_deltas_are_unit_steps() {
        for dir in Direction::ALL {
            let (dx, dy) = dir.delta();
            assert_eq!(dx.abs() + dy.abs(), 1);
        }
    }

    #[test]
    fn direction_uses_uppercase_names() {
        let json = serde_json::to_string(&Direction::Left).unwrap();
        assert_eq!(json, "\"LEFT\"");
        let dir: Direction = serde_json::from_str("\"UP\"").unwrap();
        assert_eq!(dir, Direction::Up);
    }

    #[test]
    fn snapshot_cell_lookup_is_bounds_checked() {
        let snap = crate::test_helpers::empty_snapshot(9);
        assert_eq!(snap.cell(0, 0), Some(Cell::Open));
        assert_eq!(snap.cell(-1, 0), None);
        assert_eq!(snap.cell(9, 0), None);
    }
}

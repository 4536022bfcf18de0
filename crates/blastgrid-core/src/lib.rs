pub mod net;
pub mod player;
pub mod session;
pub mod snapshot;
pub mod time;
pub mod tournament;

#[cfg(test)]
pub mod test_helpers {
    use crate::snapshot::{Cell, GameSnapshot, MatchState};
    use crate::tournament::{Tournament, TournamentMode};

    /// An empty Waiting snapshot of the given side length.
    pub fn empty_snapshot(board_size: usize) -> GameSnapshot {
        GameSnapshot {
            board_size,
            grid: vec![vec![Cell::Open; board_size]; board_size],
            players: Vec::new(),
            bombs: Vec::new(),
            explosions: Vec::new(),
            powerups: Vec::new(),
            state: MatchState::Waiting,
            winner: None,
        }
    }

    /// A registration-phase tournament with `n` participants named `P1..Pn`.
    pub fn make_tournament(mode: TournamentMode, n: usize) -> Tournament {
        let mut t = Tournament::new(mode, 32, "TEST42".to_string());
        for i in 1..=n {
            t.add_participant(&format!("P{i}"))
                .expect("test participant should register");
        }
        t
    }
}

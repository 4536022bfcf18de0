pub mod blast;
pub mod board;
pub mod config;

use std::time::Instant;

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};

use blastgrid_core::player::{PlayerColor, PlayerId};
use blastgrid_core::snapshot::{
    Bomb, Cell, Direction, Explosion, GameSnapshot, MatchState, PlayerView, PowerUp, PowerUpKind,
};

use board::Board;
use config::{GameRules, STARTING_SPEED};

/// Per-player simulation state. Exposed read-only through [`GridGame::player`].
#[derive(Debug, Clone)]
pub struct Player {
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
    pub spawn_index: usize,
    last_move: Option<Instant>,
}

impl Player {
    fn view(&self) -> PlayerView {
        PlayerView {
            id: self.id,
            name: self.name.clone(),
            x: self.x,
            y: self.y,
            alive: self.alive,
            bombs: self.bombs,
            max_bombs: self.max_bombs,
            flame: self.flame,
            speed: self.speed,
            kills: self.kills,
            color: self.color,
        }
    }
}

/// One grid combat match: board, players, bombs, blasts and power-ups.
///
/// The engine has no clock of its own. The owner calls [`GridGame::tick`]
/// every `rules.tick_ms` while the match is [`MatchState::Playing`].
pub struct GridGame {
    rules: GameRules,
    board: Board,
    players: Vec<Player>,
    bombs: Vec<Bomb>,
    explosions: Vec<Explosion>,
    powerups: Vec<PowerUp>,
    state: MatchState,
    winner: Option<PlayerId>,
    /// Simulation time, advanced by `tick_ms` per tick.
    elapsed_ms: u64,
    rng: StdRng,
}

impl GridGame {
    pub fn new(board_size: usize, rules: GameRules) -> Self {
        Self::with_rng(board_size, rules, StdRng::from_rng(&mut rand::rng()))
    }

    /// Deterministic engine for tests and replays.
    pub fn with_seed(board_size: usize, rules: GameRules, seed: u64) -> Self {
        Self::with_rng(board_size, rules, StdRng::seed_from_u64(seed))
    }

    fn with_rng(board_size: usize, rules: GameRules, mut rng: StdRng) -> Self {
        let rules = rules.sanitized();
        let board = Board::generate(board_size, rules.brick_density, &mut rng);
        Self {
            rules,
            board,
            players: Vec::new(),
            bombs: Vec::new(),
            explosions: Vec::new(),
            powerups: Vec::new(),
            state: MatchState::Waiting,
            winner: None,
            elapsed_ms: 0,
            rng,
        }
    }

    pub fn rules(&self) -> &GameRules {
        &self.rules
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn board_size(&self) -> usize {
        self.board.size()
    }

    pub fn state(&self) -> MatchState {
        self.state
    }

    pub fn winner(&self) -> Option<PlayerId> {
        self.winner
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    /// Add a player at the least-occupied spawn corner (ties go to the
    /// lowest corner index). Returns false if the id is already present.
    pub fn add_player(&mut self, id: PlayerId, name: String) -> bool {
        if self.player(id).is_some() {
            return false;
        }
        let mut occupancy = [0usize; 4];
        for p in &self.players {
            occupancy[p.spawn_index] += 1;
        }
        let spawn_index = (0..4).min_by_key(|&i| (occupancy[i], i)).unwrap_or(0);
        let (x, y) = self.board.spawn_points()[spawn_index];
        let color = PlayerColor::for_index(self.players.len());
        self.players.push(Player {
            id,
            name,
            x,
            y,
            alive: true,
            bombs: self.rules.starting_bombs,
            max_bombs: self.rules.starting_bombs,
            flame: self.rules.starting_flame,
            speed: STARTING_SPEED,
            kills: 0,
            color,
            spawn_index,
            last_move: None,
        });
        true
    }

    /// Remove a player. Bombs it already placed stay armed.
    pub fn remove_player(&mut self, id: PlayerId) -> bool {
        let before = self.players.len();
        self.players.retain(|p| p.id != id);
        self.players.len() != before
    }

    /// Waiting -> Playing on a fresh board.
    pub fn start(&mut self) -> bool {
        if self.state != MatchState::Waiting {
            return false;
        }
        self.rebuild();
        self.state = MatchState::Playing;
        true
    }

    /// Ended or Waiting -> Waiting on a fresh board.
    pub fn reset(&mut self) -> bool {
        if self.state == MatchState::Playing {
            return false;
        }
        self.rebuild();
        self.state = MatchState::Waiting;
        true
    }

    fn rebuild(&mut self) {
        self.board = Board::generate(self.board.size(), self.rules.brick_density, &mut self.rng);
        self.bombs.clear();
        self.explosions.clear();
        self.powerups.clear();
        self.winner = None;
        self.elapsed_ms = 0;
        let spawns = self.board.spawn_points();
        for (i, p) in self.players.iter_mut().enumerate() {
            let spawn_index = i % spawns.len();
            (p.x, p.y) = spawns[spawn_index];
            p.spawn_index = spawn_index;
            p.alive = true;
            p.bombs = self.rules.starting_bombs;
            p.max_bombs = self.rules.starting_bombs;
            p.flame = self.rules.starting_flame;
            p.speed = STARTING_SPEED;
            p.kills = 0;
            p.last_move = None;
        }
    }

    pub fn move_player(&mut self, id: PlayerId, direction: Direction) -> bool {
        self.move_player_at(id, direction, Instant::now())
    }

    /// Step one cell. `now` is compared against the player's previous move
    /// to enforce `move_cooldown_ms / speed`.
    pub fn move_player_at(&mut self, id: PlayerId, direction: Direction, now: Instant) -> bool {
        if self.state != MatchState::Playing {
            return false;
        }
        let Some(player) = self.player(id) else {
            return false;
        };
        if !player.alive {
            return false;
        }
        if let Some(last) = player.last_move
            && !self.rules.move_ready(now.saturating_duration_since(last), player.speed)
        {
            return false;
        }

        let (dx, dy) = direction.delta();
        let (nx, ny) = (player.x + dx, player.y + dy);
        if !self.board.is_inner(nx, ny) || self.board.get(nx, ny) != Some(Cell::Open) {
            return false;
        }
        if self.bombs.iter().any(|b| b.x == nx && b.y == ny) {
            return false;
        }
        if self
            .players
            .iter()
            .any(|p| p.id != id && p.alive && p.x == nx && p.y == ny)
        {
            return false;
        }

        let pickup = self
            .powerups
            .iter()
            .position(|pu| pu.x == nx && pu.y == ny)
            .map(|i| self.powerups.swap_remove(i).kind);
        let (speed_step, max_speed) = (self.rules.speed_step, self.rules.max_speed);
        let Some(player) = self.player_mut(id) else {
            return false;
        };
        player.x = nx;
        player.y = ny;
        player.last_move = Some(now);
        match pickup {
            Some(PowerUpKind::ExtraBomb) => {
                player.max_bombs += 1;
                player.bombs += 1;
            },
            Some(PowerUpKind::ExtraFlame) => player.flame += 1,
            Some(PowerUpKind::ExtraSpeed) => {
                player.speed = (player.speed + speed_step).min(max_speed);
            },
            None => {},
        }
        true
    }

    /// Arm a bomb on the player's cell with the player's current flame.
    pub fn place_bomb(&mut self, id: PlayerId) -> bool {
        if self.state != MatchState::Playing {
            return false;
        }
        let fuse_ms = self.rules.fuse_ms;
        let Some(player) = self.players.iter().find(|p| p.id == id) else {
            return false;
        };
        if !player.alive || player.bombs == 0 {
            return false;
        }
        let (x, y) = (player.x, player.y);
        if self.bombs.iter().any(|b| b.x == x && b.y == y) {
            return false;
        }
        let Some(player) = self.player_mut(id) else {
            return false;
        };
        player.bombs -= 1;
        let radius = player.flame;
        self.bombs.push(Bomb {
            owner: id,
            x,
            y,
            fuse_ms,
            radius,
        });
        true
    }

    /// Advance the simulation by one `tick_ms` step. Returns true if the
    /// match ended during this tick.
    pub fn tick(&mut self) -> bool {
        if self.state != MatchState::Playing {
            return false;
        }
        let tick_ms = self.rules.tick_ms;
        self.elapsed_ms += tick_ms;

        for bomb in &mut self.bombs {
            bomb.fuse_ms = bomb.fuse_ms.saturating_sub(tick_ms as u32);
        }
        let (due, armed): (Vec<Bomb>, Vec<Bomb>) =
            self.bombs.drain(..).partition(|b| b.fuse_ms == 0);
        self.bombs = armed;
        for bomb in due {
            self.detonate(bomb);
        }

        let now = self.elapsed_ms;
        self.explosions.retain(|e| e.expires_at_ms > now);
        self.resolve_deaths();
        self.check_winner()
    }

    fn detonate(&mut self, bomb: Bomb) {
        if let Some(owner) = self.player_mut(bomb.owner) {
            owner.bombs += 1;
        }
        let result = blast::detonate(&mut self.board, (bomb.x, bomb.y), bomb.radius);
        for &(x, y) in &result.destroyed {
            if self.rng.random_bool(self.rules.powerup_chance)
                && let Some(&kind) = PowerUpKind::ALL.choose(&mut self.rng)
            {
                self.powerups.push(PowerUp { x, y, kind });
            }
        }
        let expires_at_ms = self.elapsed_ms + self.rules.explosion_ms;
        self.explosions
            .extend(result.cells.into_iter().map(|(x, y)| Explosion {
                x,
                y,
                owner: bomb.owner,
                expires_at_ms,
            }));
    }

    fn resolve_deaths(&mut self) {
        let mut credits = Vec::new();
        for player in self.players.iter_mut().filter(|p| p.alive) {
            let Some(hit) = self
                .explosions
                .iter()
                .find(|e| e.x == player.x && e.y == player.y)
            else {
                continue;
            };
            player.alive = false;
            tracing::debug!(player_id = player.id, killer = hit.owner, "Player caught in blast");
            if hit.owner != player.id {
                credits.push(hit.owner);
            }
        }
        for killer in credits {
            if let Some(p) = self.player_mut(killer) {
                p.kills += 1;
            }
        }
    }

    fn check_winner(&mut self) -> bool {
        let total = self.players.len();
        let mut alive = self.players.iter().filter(|p| p.alive);
        let first = alive.next().map(|p| p.id);
        let alive_count = first.map_or(0, |_| 1 + alive.count());
        if (alive_count <= 1 && total > 1) || alive_count == 0 {
            self.state = MatchState::Ended;
            self.winner = if alive_count == 1 { first } else { None };
            return true;
        }
        false
    }

    /// Broadcast view of the match.
    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            board_size: self.board.size(),
            grid: self.board.rows(),
            players: self.players.iter().map(Player::view).collect(),
            bombs: self.bombs.clone(),
            explosions: self.explosions.clone(),
            powerups: self.powerups.clone(),
            state: self.state,
            winner: self.winner,
        }
    }
}

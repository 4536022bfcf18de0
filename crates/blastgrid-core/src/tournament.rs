//! Single-elimination tournament bracket.
//!
//! A tournament moves `Registration -> Running -> Completed` and never goes
//! back. The bracket is padded with [`BYE`] slots up to a power of two (at
//! least 4); Bye matches resolve themselves as soon as both slots are known.

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::time::unix_millis;

/// Sentinel slot name for an empty bracket position.
pub const BYE: &str = "Bye";
/// Maximum participant name length, in characters.
pub const MAX_PARTICIPANT_NAME_LEN: usize = 30;
pub const MIN_PARTICIPANTS: usize = 2;
pub const MAX_PARTICIPANTS: usize = 32;
pub const DEFAULT_MAX_PARTICIPANTS: usize = 28;
/// Smallest bracket size; fewer participants are padded with Byes.
pub const MIN_BRACKET_SIZE: usize = 4;

pub const JOIN_CODE_LEN: usize = 6;
/// Join-code alphabet without easily confused characters (I, O, 0, 1).
const JOIN_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TournamentError {
    Validation(String),
    NotFound(String),
    Conflict(String),
    IllegalTransition(String),
}

impl std::fmt::Display for TournamentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(m)
            | Self::NotFound(m)
            | Self::Conflict(m)
            | Self::IllegalTransition(m) => write!(f, "{m}"),
        }
    }
}

impl std::error::Error for TournamentError {}

/// Whether matches of a round are played one after another or all at once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TournamentMode {
    #[default]
    Sequential,
    Parallel,
}

impl TournamentMode {
    /// Lenient parse: anything other than `"parallel"` is sequential.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(m) if m.eq_ignore_ascii_case("parallel") => Self::Parallel,
            _ => Self::Sequential,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TournamentStatus {
    Registration,
    Running,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Pending,
    Live,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub id: String,
    pub player1: Option<String>,
    pub player2: Option<String>,
    pub winner: Option<String>,
    pub status: MatchStatus,
    /// Code of the session this match is being played in, once started.
    pub session_code: Option<String>,
}

impl Match {
    fn new(id: String, player1: Option<String>, player2: Option<String>) -> Self {
        Self {
            id,
            player1,
            player2,
            winner: None,
            status: MatchStatus::Pending,
            session_code: None,
        }
    }

    /// Both slots hold real participants and nobody has won yet.
    pub fn is_playable(&self) -> bool {
        self.status == MatchStatus::Pending && self.has_two_real_players()
    }

    fn has_two_real_players(&self) -> bool {
        matches!(
            (self.player1.as_deref(), self.player2.as_deref()),
            (Some(a), Some(b)) if a != BYE && b != BYE
        )
    }

    /// Whether `name` occupies one of the two (non-Bye) slots.
    pub fn has_participant(&self, name: &str) -> bool {
        name != BYE
            && (self.player1.as_deref() == Some(name) || self.player2.as_deref() == Some(name))
    }

    /// Complete a match whose opponent is a Bye. Two Byes produce a Bye.
    fn resolve_bye(&mut self) {
        if self.status == MatchStatus::Completed {
            return;
        }
        let winner = match (self.player1.as_deref(), self.player2.as_deref()) {
            (Some(BYE), Some(other)) | (Some(other), Some(BYE)) => other.to_string(),
            _ => return,
        };
        self.winner = Some(winner);
        self.status = MatchStatus::Completed;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    pub name: String,
    pub matches: Vec<Match>,
}

impl Round {
    pub fn is_complete(&self) -> bool {
        self.matches.iter().all(|m| m.status == MatchStatus::Completed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standing {
    pub name: String,
    pub points: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tournament {
    pub id: String,
    pub join_code: String,
    /// Registered names in registration order.
    pub participants: Vec<String>,
    pub max_participants: usize,
    pub mode: TournamentMode,
    pub status: TournamentStatus,
    pub rounds: Vec<Round>,
    pub current_round: usize,
    pub created_at: u64,
}

impl Tournament {
    /// Create a tournament in registration. `max_participants` is clamped
    /// to `[MIN_PARTICIPANTS, MAX_PARTICIPANTS]`.
    pub fn new(mode: TournamentMode, max_participants: usize, join_code: String) -> Self {
        Self {
            id: format!("t-{}", Uuid::new_v4().simple()),
            join_code,
            participants: Vec::new(),
            max_participants: max_participants.clamp(MIN_PARTICIPANTS, MAX_PARTICIPANTS),
            mode,
            status: TournamentStatus::Registration,
            rounds: Vec::new(),
            current_round: 0,
            created_at: unix_millis(),
        }
    }

    /// Register a participant. Returns the stored (trimmed, truncated) name.
    pub fn add_participant(&mut self, raw_name: &str) -> Result<String, TournamentError> {
        if self.status != TournamentStatus::Registration {
            return Err(TournamentError::IllegalTransition(
                "tournament has already started".to_string(),
            ));
        }
        let name: String = raw_name
            .trim()
            .chars()
            .take(MAX_PARTICIPANT_NAME_LEN)
            .collect();
        let name = name.trim_end().to_string();
        if name.is_empty() {
            return Err(TournamentError::Validation("name is required".to_string()));
        }
        if name == BYE {
            return Err(TournamentError::Validation(format!(
                "'{BYE}' is a reserved name"
            )));
        }
        if self.participants.len() >= self.max_participants {
            return Err(TournamentError::Conflict("tournament is full".to_string()));
        }
        if self.participants.contains(&name) {
            return Err(TournamentError::Conflict(format!(
                "'{name}' is already registered"
            )));
        }
        self.participants.push(name.clone());
        Ok(name)
    }

    /// Build the bracket and start round one.
    pub fn start(&mut self) -> Result<(), TournamentError> {
        self.start_with_rng(&mut rand::rng())
    }

    pub fn start_with_rng<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), TournamentError> {
        if self.status != TournamentStatus::Registration {
            return Err(TournamentError::IllegalTransition(
                "tournament has already started".to_string(),
            ));
        }
        if self.participants.len() < MIN_PARTICIPANTS {
            return Err(TournamentError::Validation(format!(
                "at least {MIN_PARTICIPANTS} participants are required"
            )));
        }
        self.rounds = build_bracket(&self.participants, rng);
        self.status = TournamentStatus::Running;
        self.current_round = 0;
        self.resolve_rounds();
        tracing::info!(
            tournament_id = %self.id,
            participants = self.participants.len(),
            rounds = self.rounds.len(),
            "Tournament started"
        );
        Ok(())
    }

    pub fn current_round(&self) -> Option<&Round> {
        if self.status == TournamentStatus::Running {
            self.rounds.get(self.current_round)
        } else {
            None
        }
    }

    /// Pending matches of the current round with two real players: the first
    /// one in sequential mode, all of them in parallel mode.
    pub fn next_matches(&self) -> Vec<&Match> {
        let Some(round) = self.current_round() else {
            return Vec::new();
        };
        let playable = round.matches.iter().filter(|m| m.is_playable());
        match self.mode {
            TournamentMode::Sequential => playable.take(1).collect(),
            TournamentMode::Parallel => playable.collect(),
        }
    }

    pub fn find_match(&self, match_id: &str) -> Option<&Match> {
        self.rounds
            .iter()
            .flat_map(|r| r.matches.iter())
            .find(|m| m.id == match_id)
    }

    /// Look up a match of the current round for mutation, distinguishing an
    /// unknown id from one that belongs to another round.
    fn current_match_mut(&mut self, match_id: &str) -> Result<&mut Match, TournamentError> {
        if self.status != TournamentStatus::Running {
            return Err(TournamentError::IllegalTransition(
                "tournament is not running".to_string(),
            ));
        }
        if self.find_match(match_id).is_none() {
            return Err(TournamentError::NotFound(format!(
                "match '{match_id}' not found"
            )));
        }
        self.rounds
            .get_mut(self.current_round)
            .and_then(|r| r.matches.iter_mut().find(|m| m.id == match_id))
            .ok_or_else(|| {
                TournamentError::IllegalTransition(format!(
                    "match '{match_id}' is not in the current round"
                ))
            })
    }

    /// Mark a match live in the given session. A live match may be rebound
    /// to a new session (e.g. after its previous session was torn down).
    pub fn start_match(
        &mut self,
        match_id: &str,
        session_code: &str,
    ) -> Result<(), TournamentError> {
        let m = self.current_match_mut(match_id)?;
        if m.status == MatchStatus::Completed {
            return Err(TournamentError::IllegalTransition(format!(
                "match '{match_id}' is already completed"
            )));
        }
        if !m.has_two_real_players() {
            return Err(TournamentError::IllegalTransition(format!(
                "match '{match_id}' is not ready to be played"
            )));
        }
        m.status = MatchStatus::Live;
        m.session_code = Some(session_code.to_string());
        Ok(())
    }

    /// Record a match result and advance the bracket as far as possible.
    pub fn advance_winner(&mut self, match_id: &str, winner: &str) -> Result<(), TournamentError> {
        let m = self.current_match_mut(match_id)?;
        if m.status == MatchStatus::Completed {
            return Err(TournamentError::IllegalTransition(format!(
                "match '{match_id}' is not pending"
            )));
        }
        if !m.has_participant(winner) {
            return Err(TournamentError::Validation(format!(
                "'{winner}' is not playing in match '{match_id}'"
            )));
        }
        m.winner = Some(winner.to_string());
        m.status = MatchStatus::Completed;
        tracing::info!(tournament_id = %self.id, match_id, winner, "Match result recorded");

        self.resolve_rounds();
        if self.status == TournamentStatus::Completed {
            tracing::info!(
                tournament_id = %self.id,
                champion = ?self.champion(),
                "Tournament completed"
            );
        }
        Ok(())
    }

    /// Resolve Byes in the current round and, while the current round is
    /// complete, seed the next one with its winners.
    fn resolve_rounds(&mut self) {
        loop {
            let Some(round) = self.rounds.get_mut(self.current_round) else {
                self.status = TournamentStatus::Completed;
                return;
            };
            for m in &mut round.matches {
                m.resolve_bye();
            }
            if !round.is_complete() {
                return;
            }
            let winners: Vec<Option<String>> =
                round.matches.iter().map(|m| m.winner.clone()).collect();

            let next = self.current_round + 1;
            let Some(next_round) = self.rounds.get_mut(next) else {
                self.status = TournamentStatus::Completed;
                return;
            };
            for (i, m) in next_round.matches.iter_mut().enumerate() {
                m.player1 = winners.get(i * 2).cloned().flatten();
                m.player2 = winners.get(i * 2 + 1).cloned().flatten();
                m.status = MatchStatus::Pending;
            }
            self.current_round = next;
        }
    }

    /// Winner of the final, once the tournament is completed.
    pub fn champion(&self) -> Option<&str> {
        if self.status != TournamentStatus::Completed {
            return None;
        }
        self.rounds.last()?.matches.first()?.winner.as_deref()
    }

    /// Three points per won match; sorted by points, ties in roster order.
    pub fn standings(&self) -> Vec<Standing> {
        let mut standings: Vec<Standing> = self
            .participants
            .iter()
            .filter(|name| name.as_str() != BYE)
            .map(|name| {
                let wins = self
                    .rounds
                    .iter()
                    .flat_map(|r| r.matches.iter())
                    .filter(|m| {
                        m.status == MatchStatus::Completed
                            && m.winner.as_deref() == Some(name.as_str())
                    })
                    .count() as u32;
                Standing {
                    name: name.clone(),
                    points: wins * 3,
                }
            })
            .collect();
        standings.sort_by(|a, b| b.points.cmp(&a.points));
        standings
    }
}

/// Generate a join code from the unambiguous alphabet.
pub fn generate_join_code() -> String {
    let mut rng = rand::rng();
    (0..JOIN_CODE_LEN)
        .map(|_| JOIN_CODE_ALPHABET[rng.random_range(0..JOIN_CODE_ALPHABET.len())] as char)
        .collect()
}

/// Display name for a round holding `match_count` matches.
fn round_name(index: usize, match_count: usize) -> String {
    match match_count {
        1 => "Final".to_string(),
        2 => "Semifinal".to_string(),
        _ => format!("Round {}", index + 1),
    }
}

/// Pad, shuffle and pair the roster; later rounds start with empty slots.
fn build_bracket<R: Rng + ?Sized>(participants: &[String], rng: &mut R) -> Vec<Round> {
    let size = participants.len().max(MIN_BRACKET_SIZE).next_power_of_two();
    let mut slots: Vec<String> = participants.to_vec();
    slots.resize(size, BYE.to_string());
    slots.shuffle(rng);

    let first: Vec<Match> = slots
        .chunks(2)
        .enumerate()
        .map(|(i, pair)| {
            Match::new(
                format!("m-0-{i}"),
                pair.first().cloned(),
                pair.get(1).cloned(),
            )
        })
        .collect();

    let mut rounds = vec![Round {
        name: round_name(0, first.len()),
        matches: first,
    }];
    let mut match_count = size / 4;
    let mut index = 1;
    while match_count >= 1 {
        let matches = (0..match_count)
            .map(|i| Match::new(format!("m-{index}-{i}"), None, None))
            .collect();
        rounds.push(Round {
            name: round_name(index, match_count),
            matches,
        });
        match_count /= 2;
        index += 1;
    }
    rounds
}

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use blastgrid_core::net::messages::{InputAction, ServerMessage, SessionEndedMsg};
use blastgrid_core::net::protocol::encode_server_message;
use blastgrid_core::player::{PlayerId, sanitize_display_name};
use blastgrid_core::session::{MAX_SESSIONS, generate_session_code, normalize_session_code};
use blastgrid_core::snapshot::{GameSnapshot, MatchState};
use blastgrid_core::time::unix_millis;
use blastgrid_engine::GridGame;
use blastgrid_engine::config::GameRules;

use crate::game_loop::{
    ConnId, PlayerSender, SessionCommand, SessionHandle, SharedSenders, broadcast, encode_state,
    lock_senders, spawn_session,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    NotFound(String),
    Conflict(String),
    Validation(String),
    Forbidden(String),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(m) => write!(f, "not found: {m}"),
            Self::Conflict(m) => write!(f, "conflict: {m}"),
            Self::Validation(m) => write!(f, "invalid: {m}"),
            Self::Forbidden(m) => write!(f, "forbidden: {m}"),
        }
    }
}

impl std::error::Error for SessionError {}

/// Binds a session to one tournament match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchLink {
    pub tournament_id: String,
    pub match_id: String,
    /// The only names admitted as players.
    pub participants: [String; 2],
}

/// A decisive result of a linked session, ready to report to its bracket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchOutcome {
    pub code: String,
    pub tournament_id: String,
    pub match_id: String,
    pub winner: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub code: String,
    pub board_size: usize,
    pub player_count: usize,
    pub spectator_count: usize,
    pub state: MatchState,
    pub created_at: u64,
}

struct SessionEntry {
    board_size: usize,
    created_at: u64,
    /// WebSocket player connections.
    players: HashMap<ConnId, PlayerId>,
    spectators: HashSet<ConnId>,
    /// Socketless players driven through the controller API.
    controller_players: HashSet<PlayerId>,
    /// Display names of every player that ever joined, for winner
    /// resolution after the winner has left.
    player_names: HashMap<PlayerId, String>,
    senders: SharedSenders,
    cmd_tx: mpsc::UnboundedSender<SessionCommand>,
    snapshot_rx: watch::Receiver<GameSnapshot>,
    task: JoinHandle<()>,
    link: Option<MatchLink>,
}

impl SessionEntry {
    fn send(&self, code: &str, cmd: SessionCommand) {
        if let Err(e) = self.cmd_tx.send(cmd) {
            tracing::debug!(session = code, error = %e, "Session loop gone");
        }
    }

    fn player_count(&self) -> usize {
        self.players.len() + self.controller_players.len()
    }

    /// Take the link of a decided match, resolving the winner's name.
    /// Draws and undecided matches keep their link.
    fn take_outcome(&mut self, code: &str) -> Option<MatchOutcome> {
        let snapshot = self.snapshot_rx.borrow().clone();
        if snapshot.state != MatchState::Ended || self.link.is_none() {
            return None;
        }
        let winner_id = snapshot.winner?;
        let winner = self
            .player_names
            .get(&winner_id)
            .cloned()
            .or_else(|| snapshot.player(winner_id).map(|p| p.name.clone()))?;
        let link = self.link.take()?;
        tracing::info!(
            session = code,
            tournament_id = %link.tournament_id,
            match_id = %link.match_id,
            winner = %winner,
            "Match result ready"
        );
        Some(MatchOutcome {
            code: code.to_string(),
            tournament_id: link.tournament_id,
            match_id: link.match_id,
            winner,
        })
    }

    /// Stop the clock and tell every connection the session is over.
    fn shutdown(self, code: &str) {
        let msg = ServerMessage::SessionEnded(SessionEndedMsg {
            code: code.to_string(),
        });
        match encode_server_message(&msg) {
            Ok(data) => broadcast(&self.senders, &Bytes::from(data), code),
            Err(e) => tracing::error!(session = code, error = %e, "Failed to encode SessionEnded"),
        }
        self.task.abort();
        lock_senders(&self.senders).clear();
    }
}

/// Registry of live sessions. Each session's engine is owned by its own
/// actor task; this struct only holds the handles and connection sets.
pub struct SessionManager {
    sessions: HashMap<String, SessionEntry>,
    next_player_id: PlayerId,
    next_conn_id: ConnId,
    rules: GameRules,
    max_sessions: usize,
    /// Results of linked sessions torn down before a sweep saw them.
    pending_outcomes: Vec<MatchOutcome>,
}

impl SessionManager {
    pub fn new(rules: GameRules, max_sessions: usize) -> Self {
        Self {
            sessions: HashMap::new(),
            next_player_id: 1,
            next_conn_id: 1,
            rules,
            max_sessions: max_sessions.min(MAX_SESSIONS),
            pending_outcomes: Vec::new(),
        }
    }

    fn alloc_player_id(&mut self) -> PlayerId {
        let id = self.next_player_id;
        self.next_player_id += 1;
        id
    }

    fn alloc_conn_id(&mut self) -> ConnId {
        let id = self.next_conn_id;
        self.next_conn_id += 1;
        id
    }

    fn entry(&self, code: &str) -> Result<&SessionEntry, SessionError> {
        self.sessions
            .get(code)
            .ok_or_else(|| SessionError::NotFound(format!("session '{code}'")))
    }

    fn entry_mut(&mut self, code: &str) -> Result<&mut SessionEntry, SessionError> {
        self.sessions
            .get_mut(code)
            .ok_or_else(|| SessionError::NotFound(format!("session '{code}'")))
    }

    /// Create a session and spawn its actor. Returns the code and the
    /// normalized board size.
    pub fn create_session(
        &mut self,
        requested_code: Option<&str>,
        board_size: usize,
        link: Option<MatchLink>,
    ) -> Result<(String, usize), SessionError> {
        if self.sessions.len() >= self.max_sessions {
            return Err(SessionError::Validation(format!(
                "session limit of {} reached",
                self.max_sessions
            )));
        }

        let code = match requested_code {
            Some(raw) => {
                let code = normalize_session_code(raw).ok_or_else(|| {
                    SessionError::Validation("session code must not be empty".to_string())
                })?;
                if self.sessions.contains_key(&code) {
                    return Err(SessionError::Conflict(format!(
                        "session '{code}' already exists"
                    )));
                }
                code
            },
            None => loop {
                let code = generate_session_code();
                if !self.sessions.contains_key(&code) {
                    break code;
                }
            },
        };

        let game = GridGame::new(board_size, self.rules.clone());
        let board_size = game.board_size();
        let senders: SharedSenders = Arc::new(Mutex::new(HashMap::new()));
        let SessionHandle {
            cmd_tx,
            snapshot_rx,
            task,
        } = spawn_session(code.clone(), game, Arc::clone(&senders));

        tracing::info!(
            session = %code,
            board_size,
            linked = link.is_some(),
            "Session created"
        );

        self.sessions.insert(
            code.clone(),
            SessionEntry {
                board_size,
                created_at: unix_millis(),
                players: HashMap::new(),
                spectators: HashSet::new(),
                controller_players: HashSet::new(),
                player_names: HashMap::new(),
                senders,
                cmd_tx,
                snapshot_rx,
                task,
                link,
            },
        );
        Ok((code, board_size))
    }

    /// Tear a session down, notifying its connections.
    pub fn end_session(&mut self, code: &str) -> Result<(), SessionError> {
        let entry = self
            .sessions
            .remove(code)
            .ok_or_else(|| SessionError::NotFound(format!("session '{code}'")))?;
        self.retire(code, entry);
        tracing::info!(session = code, "Session ended");
        Ok(())
    }

    fn retire(&mut self, code: &str, mut entry: SessionEntry) {
        if let Some(outcome) = entry.take_outcome(code) {
            self.pending_outcomes.push(outcome);
        }
        entry.shutdown(code);
    }

    pub fn contains(&self, code: &str) -> bool {
        self.sessions.contains_key(code)
    }

    fn admit_name(entry: &SessionEntry, name: &str) -> Result<(), SessionError> {
        match &entry.link {
            Some(link) if !link.participants.iter().any(|p| p == name) => {
                Err(SessionError::Forbidden(format!(
                    "'{name}' is not a participant of match {}",
                    link.match_id
                )))
            },
            _ => Ok(()),
        }
    }

    /// Attach a WebSocket player. The actor replies `Joined` on `sender`
    /// and then broadcasts fresh state.
    pub fn attach_player(
        &mut self,
        code: &str,
        requested_name: Option<&str>,
        sender: PlayerSender,
    ) -> Result<(ConnId, PlayerId), SessionError> {
        self.entry(code)?;
        let player_id = self.alloc_player_id();
        let name = sanitize_display_name(requested_name, || format!("Player {player_id}"));
        Self::admit_name(self.entry(code)?, &name)?;
        let conn_id = self.alloc_conn_id();

        let entry = self.entry_mut(code)?;
        entry.players.insert(conn_id, player_id);
        entry.player_names.insert(player_id, name.clone());
        entry.send(
            code,
            SessionCommand::AddPlayer {
                player_id,
                name: name.clone(),
                conn: Some((conn_id, sender)),
            },
        );
        tracing::info!(session = code, player_id, name = %name, "Player joined");
        Ok((conn_id, player_id))
    }

    /// Attach a read-only connection.
    pub fn attach_spectator(
        &mut self,
        code: &str,
        sender: PlayerSender,
    ) -> Result<ConnId, SessionError> {
        self.entry(code)?;
        let conn_id = self.alloc_conn_id();
        let entry = self.entry_mut(code)?;
        entry.spectators.insert(conn_id);
        entry.send(code, SessionCommand::AddSpectator { conn_id, sender });
        tracing::info!(session = code, conn_id, "Spectator joined");
        Ok(conn_id)
    }

    /// Add a socketless player driven through the controller API.
    pub fn attach_controller(
        &mut self,
        code: &str,
        requested_name: Option<&str>,
    ) -> Result<(PlayerId, String), SessionError> {
        self.entry(code)?;
        let player_id = self.alloc_player_id();
        let name = sanitize_display_name(requested_name, || format!("Controller {player_id}"));
        Self::admit_name(self.entry(code)?, &name)?;

        let entry = self.entry_mut(code)?;
        entry.controller_players.insert(player_id);
        entry.player_names.insert(player_id, name.clone());
        entry.send(
            code,
            SessionCommand::AddPlayer {
                player_id,
                name: name.clone(),
                conn: None,
            },
        );
        tracing::info!(session = code, player_id, name = %name, "Controller joined");
        Ok((player_id, name))
    }

    /// Route a WebSocket player's action. Illegal actions are silent no-ops.
    pub fn dispatch_input(&self, code: &str, player_id: PlayerId, action: InputAction) {
        if let Some(entry) = self.sessions.get(code) {
            entry.send(code, SessionCommand::Input { player_id, action });
        }
    }

    /// Route a controller player's action.
    pub fn controller_input(
        &self,
        code: &str,
        player_id: PlayerId,
        action: InputAction,
    ) -> Result<(), SessionError> {
        let entry = self.entry(code)?;
        if !entry.controller_players.contains(&player_id) {
            return Err(SessionError::Forbidden(format!(
                "player {player_id} is not a controller of session '{code}'"
            )));
        }
        entry.send(code, SessionCommand::Input { player_id, action });
        Ok(())
    }

    pub fn request_start(&self, code: &str) {
        if let Some(entry) = self.sessions.get(code) {
            entry.send(code, SessionCommand::Start);
        }
    }

    pub fn request_reset(&self, code: &str) {
        if let Some(entry) = self.sessions.get(code) {
            entry.send(code, SessionCommand::Reset);
        }
    }

    /// Drop a connection. Returns true if the session was torn down
    /// because no WebSocket players or spectators remain. Connections the
    /// session does not hold (e.g. from an earlier session under the same
    /// code) are ignored.
    pub fn detach_connection(&mut self, code: &str, conn_id: ConnId) -> bool {
        let Some(entry) = self.sessions.get_mut(code) else {
            return false;
        };

        if let Some(player_id) = entry.players.remove(&conn_id) {
            entry.send(code, SessionCommand::RemovePlayer { player_id });
            tracing::info!(session = code, player_id, "Player left");
        } else if entry.spectators.remove(&conn_id) {
            tracing::info!(session = code, conn_id, "Spectator left");
        } else {
            return false;
        }
        lock_senders(&entry.senders).remove(&conn_id);

        if entry.players.is_empty() && entry.spectators.is_empty() {
            if let Some(entry) = self.sessions.remove(code) {
                self.retire(code, entry);
            }
            tracing::info!(session = code, "Session closed, no connections left");
            return true;
        }
        false
    }

    /// Summaries of every session, oldest first.
    pub fn list(&self) -> Vec<SessionSummary> {
        let mut out: Vec<SessionSummary> = self
            .sessions
            .iter()
            .map(|(code, e)| SessionSummary {
                code: code.clone(),
                board_size: e.board_size,
                player_count: e.player_count(),
                spectator_count: e.spectators.len(),
                state: e.snapshot_rx.borrow().state,
                created_at: e.created_at,
            })
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.code.cmp(&b.code)));
        out
    }

    /// (active sessions, attached players)
    pub fn stats(&self) -> (usize, usize) {
        let players = self.sessions.values().map(SessionEntry::player_count).sum();
        (self.sessions.len(), players)
    }

    /// Latest published snapshot of a session.
    pub fn snapshot(&self, code: &str) -> Option<GameSnapshot> {
        self.sessions
            .get(code)
            .map(|e| e.snapshot_rx.borrow().clone())
    }

    /// Periodic pass: re-broadcast every Playing or Ended session with
    /// connections, and collect decisive results of linked sessions.
    /// Each outcome is returned once; a draw keeps its link for a replay.
    pub fn sweep(&mut self) -> Vec<MatchOutcome> {
        let mut outcomes = std::mem::take(&mut self.pending_outcomes);
        for (code, entry) in &mut self.sessions {
            let snapshot = entry.snapshot_rx.borrow().clone();
            if snapshot.state == MatchState::Waiting {
                continue;
            }

            let has_connections = !lock_senders(&entry.senders).is_empty();
            if has_connections && let Some(data) = encode_state(&snapshot) {
                broadcast(&entry.senders, &data, code);
            }

            outcomes.extend(entry.take_outcome(code));
        }
        outcomes
    }
}

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use blastgrid_core::net::messages::{
    InputAction, JoinedMsg, ServerMessage, SpectatingMsg, StateMsg,
};
use blastgrid_core::net::protocol::encode_server_message;
use blastgrid_core::player::PlayerId;
use blastgrid_core::snapshot::{GameSnapshot, MatchState};
use blastgrid_engine::GridGame;

/// Identifies one WebSocket connection within the server.
pub type ConnId = u64;

/// Per-connection sender for outbound WebSocket binary frames.
/// Bounded so a slow client cannot grow memory without limit.
pub type PlayerSender = mpsc::Sender<Bytes>;

/// Sender map shared between a session's actor and the session manager,
/// which removes departed connections and reads it during the sweep.
pub type SharedSenders = Arc<Mutex<HashMap<ConnId, PlayerSender>>>;

/// Commands sent to a session actor. All engine mutations go through here,
/// so a tick never interleaves with an input.
#[derive(Debug)]
pub enum SessionCommand {
    AddPlayer {
        player_id: PlayerId,
        name: String,
        /// None for controller players, which have no socket.
        conn: Option<(ConnId, PlayerSender)>,
    },
    AddSpectator {
        conn_id: ConnId,
        sender: PlayerSender,
    },
    RemovePlayer {
        player_id: PlayerId,
    },
    Input {
        player_id: PlayerId,
        action: InputAction,
    },
    Start,
    Reset,
}

/// Handles kept by the session manager for a running actor.
pub struct SessionHandle {
    pub cmd_tx: mpsc::UnboundedSender<SessionCommand>,
    pub snapshot_rx: watch::Receiver<GameSnapshot>,
    pub task: JoinHandle<()>,
}

/// Lock the sender map, recovering the data if a holder panicked.
pub fn lock_senders(
    senders: &SharedSenders,
) -> std::sync::MutexGuard<'_, HashMap<ConnId, PlayerSender>> {
    senders.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Push an encoded frame to every connection of a session. Full channels
/// skip the frame for that connection only.
pub fn broadcast(senders: &SharedSenders, data: &Bytes, code: &str) {
    for (conn_id, sender) in lock_senders(senders).iter() {
        if let Err(e) = sender.try_send(data.clone()) {
            tracing::debug!(conn_id, session = code, error = %e, "Broadcast skipped");
        }
    }
}

/// Encode a `State` frame for the given snapshot.
pub fn encode_state(snapshot: &GameSnapshot) -> Option<Bytes> {
    let msg = ServerMessage::State(StateMsg {
        snapshot: snapshot.clone(),
    });
    match encode_server_message(&msg) {
        Ok(data) => Some(Bytes::from(data)),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode State");
            None
        },
    }
}

/// Spawn the actor owning `game` for session `code`.
pub fn spawn_session(code: String, game: GridGame, senders: SharedSenders) -> SessionHandle {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (snapshot_tx, snapshot_rx) = watch::channel(game.snapshot());

    let task = tokio::spawn(async move {
        run_session_loop(code, game, senders, cmd_rx, snapshot_tx).await;
    });

    SessionHandle {
        cmd_tx,
        snapshot_rx,
        task,
    }
}

struct SessionActor {
    code: String,
    game: GridGame,
    senders: SharedSenders,
    snapshot_tx: watch::Sender<GameSnapshot>,
}

impl SessionActor {
    /// Publish the current snapshot to the manager and, optionally, to
    /// every attached connection.
    fn publish(&self, broadcast_now: bool) {
        let snapshot = self.game.snapshot();
        if broadcast_now && let Some(data) = encode_state(&snapshot) {
            broadcast(&self.senders, &data, &self.code);
        }
        self.snapshot_tx.send_replace(snapshot);
    }

    fn send_direct(&self, sender: &PlayerSender, msg: &ServerMessage) {
        match encode_server_message(msg) {
            Ok(data) => {
                if let Err(e) = sender.try_send(Bytes::from(data)) {
                    tracing::debug!(session = %self.code, error = %e, "Direct send failed");
                }
            },
            Err(e) => tracing::error!(session = %self.code, error = %e, "Failed to encode reply"),
        }
    }

    /// Apply one command. Returns true if the clock should restart.
    fn handle(&mut self, cmd: SessionCommand) -> bool {
        match cmd {
            SessionCommand::AddPlayer {
                player_id,
                name,
                conn,
            } => {
                self.game.add_player(player_id, name);
                if let Some((conn_id, sender)) = conn {
                    let joined = ServerMessage::Joined(JoinedMsg {
                        player_id,
                        code: self.code.clone(),
                        snapshot: self.game.snapshot(),
                    });
                    self.send_direct(&sender, &joined);
                    lock_senders(&self.senders).insert(conn_id, sender);
                }
                self.publish(true);
                false
            },
            SessionCommand::AddSpectator { conn_id, sender } => {
                let spectating = ServerMessage::Spectating(SpectatingMsg {
                    code: self.code.clone(),
                    snapshot: self.game.snapshot(),
                });
                self.send_direct(&sender, &spectating);
                lock_senders(&self.senders).insert(conn_id, sender);
                false
            },
            SessionCommand::RemovePlayer { player_id } => {
                if self.game.remove_player(player_id) {
                    self.publish(true);
                }
                false
            },
            SessionCommand::Input { player_id, action } => {
                let changed = match action {
                    InputAction::Move { direction } => self.game.move_player(player_id, direction),
                    InputAction::Bomb => self.game.place_bomb(player_id),
                };
                if changed {
                    self.publish(true);
                }
                false
            },
            SessionCommand::Start => {
                if !self.game.start() {
                    return false;
                }
                tracing::info!(
                    session = %self.code,
                    players = self.game.player_count(),
                    "Match started"
                );
                self.publish(true);
                true
            },
            SessionCommand::Reset => {
                if self.game.reset() {
                    tracing::info!(session = %self.code, "Match reset");
                    self.publish(true);
                }
                false
            },
        }
    }

    fn on_tick(&mut self) {
        if self.game.tick() {
            tracing::info!(
                session = %self.code,
                winner = ?self.game.winner(),
                "Match ended"
            );
            self.publish(true);
        } else {
            self.publish(false);
        }
    }
}

/// Drive one session: ticks while Playing, commands always. Exits when
/// the manager drops the command sender.
async fn run_session_loop(
    code: String,
    game: GridGame,
    senders: SharedSenders,
    mut cmd_rx: mpsc::UnboundedReceiver<SessionCommand>,
    snapshot_tx: watch::Sender<GameSnapshot>,
) {
    let tick = Duration::from_millis(game.rules().tick_ms);
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut actor = SessionActor {
        code,
        game,
        senders,
        snapshot_tx,
    };

    loop {
        let playing = actor.game.state() == MatchState::Playing;
        tokio::select! {
            _ = interval.tick(), if playing => actor.on_tick(),
            cmd = cmd_rx.recv() => match cmd {
                Some(cmd) => {
                    if actor.handle(cmd) {
                        interval.reset();
                    }
                },
                None => break,
            },
        }
    }

    tracing::debug!(session = %actor.code, "Session loop stopped");
}

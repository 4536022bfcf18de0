use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::RwLock;

use blastgrid_engine::config::GameRules;

use crate::config::ServerConfig;
use crate::session_manager::SessionManager;
use crate::tournament_registry::TournamentRegistry;

pub type SharedSessionManager = Arc<RwLock<SessionManager>>;
pub type SharedTournamentRegistry = Arc<RwLock<TournamentRegistry>>;

/// State shared by every handler. Lock order when both are needed:
/// tournaments first, then sessions.
#[derive(Clone)]
pub struct AppState {
    pub sessions: SharedSessionManager,
    pub tournaments: SharedTournamentRegistry,
    pub config: Arc<ServerConfig>,
    pub ws_connection_count: Arc<AtomicUsize>,
}

impl AppState {
    pub fn new(config: ServerConfig, rules: GameRules) -> Self {
        let sessions = SessionManager::new(rules, config.sessions.max_sessions);
        Self {
            sessions: Arc::new(RwLock::new(sessions)),
            tournaments: Arc::new(RwLock::new(TournamentRegistry::new())),
            config: Arc::new(config),
            ws_connection_count: Arc::new(AtomicUsize::new(0)),
        }
    }
}

/// Counts a live WebSocket connection for as long as it is held.
pub struct ConnectionGuard {
    counter: Arc<AtomicUsize>,
}

impl ConnectionGuard {
    pub fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self { counter }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::Relaxed);
    }
}

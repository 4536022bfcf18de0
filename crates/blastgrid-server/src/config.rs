use serde::Deserialize;

use blastgrid_core::session::MAX_SESSIONS;
use blastgrid_core::tournament::DEFAULT_MAX_PARTICIPANTS;
use blastgrid_engine::board::DEFAULT_BOARD_SIZE;

/// Top-level server configuration, loaded from `blastgrid.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub web_root: String,
    pub auth: AuthFileConfig,
    pub limits: LimitsConfig,
    pub sessions: SessionsConfig,
    pub tournaments: TournamentsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            web_root: "public".to_string(),
            auth: AuthFileConfig::default(),
            limits: LimitsConfig::default(),
            sessions: SessionsConfig::default(),
            tournaments: TournamentsConfig::default(),
        }
    }
}

/// Auth section of the config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthFileConfig {
    /// Bearer token guarding `/api/admin/*`. None = open.
    pub admin_token: Option<String>,
}

/// Connection caps, buffer sizes and rate limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_ws_connections: usize,
    pub ws_rate_limit_per_sec: f64,
    pub player_message_buffer: usize,
    /// Largest inbound WebSocket frame, in bytes.
    pub max_message_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_ws_connections: 200,
            ws_rate_limit_per_sec: 30.0,
            player_message_buffer: 256,
            max_message_size: 4096,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    pub default_board_size: usize,
    /// Period of the state sweep that re-broadcasts live sessions.
    pub broadcast_interval_ms: u64,
    pub max_sessions: usize,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            default_board_size: DEFAULT_BOARD_SIZE,
            broadcast_interval_ms: 50,
            max_sessions: 64,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TournamentsConfig {
    pub default_max_participants: usize,
}

impl Default for TournamentsConfig {
    fn default() -> Self {
        Self {
            default_max_participants: DEFAULT_MAX_PARTICIPANTS,
        }
    }
}

impl ServerConfig {
    /// Validate configuration, exiting on values the server cannot run with.
    pub fn validate(&self) {
        if self.auth.admin_token.is_some() {
            tracing::warn!(
                "admin_token is set in config file, prefer BLASTGRID_ADMIN_TOKEN in production"
            );
        }
        if let Err(problem) = self.check() {
            tracing::error!("{problem}");
            std::process::exit(1);
        }
    }

    /// First value the server cannot run with, if any.
    pub fn check(&self) -> Result<(), String> {
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(format!(
                "listen_addr '{}' is not a valid socket address",
                self.listen_addr
            ));
        }
        if self.limits.max_ws_connections == 0 {
            return Err("limits.max_ws_connections must be > 0".to_string());
        }
        if self.limits.ws_rate_limit_per_sec <= 0.0 {
            return Err("limits.ws_rate_limit_per_sec must be > 0".to_string());
        }
        if self.limits.player_message_buffer == 0 {
            return Err("limits.player_message_buffer must be > 0".to_string());
        }
        if self.limits.max_message_size == 0 {
            return Err("limits.max_message_size must be > 0".to_string());
        }
        if self.sessions.broadcast_interval_ms == 0 {
            return Err("sessions.broadcast_interval_ms must be > 0".to_string());
        }
        if self.sessions.max_sessions == 0 || self.sessions.max_sessions > MAX_SESSIONS {
            return Err(format!("sessions.max_sessions must be in 1..={MAX_SESSIONS}"));
        }
        Ok(())
    }

    /// Load config from `blastgrid.toml` if it exists, then apply env var overrides.
    pub fn load() -> Self {
        let mut config = match std::fs::read_to_string("blastgrid.toml") {
            Ok(content) => match toml::from_str::<ServerConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!("Loaded configuration from blastgrid.toml");
                    cfg
                },
                Err(e) => {
                    tracing::warn!("Failed to parse blastgrid.toml: {e}, using defaults");
                    ServerConfig::default()
                },
            },
            Err(_) => {
                tracing::info!("No blastgrid.toml found, using defaults");
                ServerConfig::default()
            },
        };

        if let Ok(addr) = std::env::var("BLASTGRID_LISTEN_ADDR")
            && !addr.is_empty()
        {
            config.listen_addr = addr;
        }
        if let Ok(root) = std::env::var("BLASTGRID_WEB_ROOT")
            && !root.is_empty()
        {
            config.web_root = root;
        }
        if let Ok(token) = std::env::var("BLASTGRID_ADMIN_TOKEN")
            && !token.is_empty()
        {
            config.auth.admin_token = Some(token);
        }
        if let Ok(val) = std::env::var("BLASTGRID_MAX_WS_CONNECTIONS")
            && let Ok(n) = val.parse::<usize>()
        {
            config.limits.max_ws_connections = n;
        }
        if let Ok(val) = std::env::var("BLASTGRID_WS_RATE_LIMIT")
            && let Ok(n) = val.parse::<f64>()
        {
            config.limits.ws_rate_limit_per_sec = n;
        }
        if let Ok(val) = std::env::var("BLASTGRID_BROADCAST_INTERVAL_MS")
            && let Ok(n) = val.parse::<u64>()
        {
            config.sessions.broadcast_interval_ms = n;
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.listen_addr, "0.0.0.0:8080");
        assert_eq!(cfg.web_root, "public");
        assert!(cfg.auth.admin_token.is_none());
        assert_eq!(cfg.sessions.default_board_size, 13);
        assert_eq!(cfg.sessions.broadcast_interval_ms, 50);
        assert_eq!(cfg.tournaments.default_max_participants, 28);
    }

    #[test]
    fn validate_accepts_default_config() {
        assert_eq!(ServerConfig::default().check(), Ok(()));
        ServerConfig::default().validate();
    }

    #[test]
    fn invalid_addr_is_detected() {
        let cfg = ServerConfig {
            listen_addr: "not-an-address".to_string(),
            ..ServerConfig::default()
        };
        assert!(cfg.check().unwrap_err().contains("listen_addr"));
    }

    #[test]
    fn session_limit_must_leave_free_codes() {
        let mut cfg = ServerConfig::default();
        cfg.sessions.max_sessions = MAX_SESSIONS;
        assert_eq!(cfg.check(), Ok(()));
        cfg.sessions.max_sessions = 9000;
        assert!(cfg.check().unwrap_err().contains("max_sessions"));
        cfg.sessions.max_sessions = 0;
        assert!(cfg.check().is_err());
    }

    #[test]
    fn parse_minimal_toml() {
        let toml_str = r#"
listen_addr = "127.0.0.1:9090"

[auth]
admin_token = "secret123"
"#;
        let cfg: ServerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.listen_addr, "127.0.0.1:9090");
        assert_eq!(cfg.web_root, "public");
        assert_eq!(cfg.auth.admin_token.as_deref(), Some("secret123"));
        assert_eq!(cfg.limits.max_ws_connections, 200);
    }

    #[test]
    fn parse_full_toml() {
        let toml_str = r#"
listen_addr = "0.0.0.0:3000"
web_root = "dist"

[limits]
max_ws_connections = 50
ws_rate_limit_per_sec = 10.0
player_message_buffer = 64
max_message_size = 1024

[sessions]
default_board_size = 15
broadcast_interval_ms = 100
max_sessions = 8

[tournaments]
default_max_participants = 16
"#;
        let cfg: ServerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.web_root, "dist");
        assert_eq!(cfg.limits.max_ws_connections, 50);
        assert!((cfg.limits.ws_rate_limit_per_sec - 10.0).abs() < f64::EPSILON);
        assert_eq!(cfg.limits.max_message_size, 1024);
        assert_eq!(cfg.sessions.default_board_size, 15);
        assert_eq!(cfg.sessions.max_sessions, 8);
        assert_eq!(cfg.tournaments.default_max_participants, 16);
    }
}

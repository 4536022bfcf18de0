use serde::{Deserialize, Serialize};

use crate::player::PlayerId;
use crate::snapshot::{Direction, GameSnapshot};

/// Network message type discriminator (first byte of every frame).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    // Client -> Server
    Join = 0x01,
    Spectate = 0x02,
    Input = 0x03,
    Start = 0x04,
    Reset = 0x05,

    // Server -> Client
    Joined = 0x10,
    Spectating = 0x11,
    State = 0x12,
    Error = 0x13,
    SessionEnded = 0x14,
}

impl MessageType {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(Self::Join),
            0x02 => Some(Self::Spectate),
            0x03 => Some(Self::Input),
            0x04 => Some(Self::Start),
            0x05 => Some(Self::Reset),
            0x10 => Some(Self::Joined),
            0x11 => Some(Self::Spectating),
            0x12 => Some(Self::State),
            0x13 => Some(Self::Error),
            0x14 => Some(Self::SessionEnded),
            _ => None,
        }
    }
}

// ============================================================================
// Client -> Server
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinMsg {
    pub code: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectateMsg {
    pub code: String,
}

/// A gameplay action requested by a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputAction {
    Move { direction: Direction },
    Bomb,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputMsg {
    pub action: InputAction,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Join(JoinMsg),
    Spectate(SpectateMsg),
    Input(InputMsg),
    Start,
    Reset,
}

// ============================================================================
// Server -> Client
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinedMsg {
    pub player_id: PlayerId,
    pub code: String,
    pub snapshot: GameSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectatingMsg {
    pub code: String,
    pub snapshot: GameSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateMsg {
    pub snapshot: GameSnapshot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMsg {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEndedMsg {
    pub code: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    Joined(JoinedMsg),
    Spectating(SpectatingMsg),
    State(StateMsg),
    Error(ErrorMsg),
    SessionEnded(SessionEndedMsg),
}

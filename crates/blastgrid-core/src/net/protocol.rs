use serde::{Deserialize, Serialize};

use super::messages::{
    ClientMessage, ErrorMsg, InputMsg, JoinMsg, JoinedMsg, MessageType, ServerMessage,
    SessionEndedMsg, SpectateMsg, SpectatingMsg, StateMsg,
};

/// Maximum encoded frame size in bytes.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;

#[derive(Debug)]
pub enum ProtocolError {
    EmptyMessage,
    UnknownMessageType(u8),
    UnexpectedMessageType(MessageType),
    PayloadTooLarge(usize),
    SerializeError(String),
    DeserializeError(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "empty message"),
            Self::UnknownMessageType(b) => write!(f, "unknown message type: 0x{b:02x}"),
            Self::UnexpectedMessageType(t) => write!(f, "unexpected message type: {t:?}"),
            Self::PayloadTooLarge(size) => {
                write!(
                    f,
                    "payload too large: {size} bytes (max {MAX_MESSAGE_SIZE})"
                )
            },
            Self::SerializeError(e) => write!(f, "serialize error: {e}"),
            Self::DeserializeError(e) => write!(f, "deserialize error: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Encode a serializable payload with a 1-byte type prefix.
pub fn encode_message<T: Serialize>(
    msg_type: MessageType,
    payload: &T,
) -> Result<Vec<u8>, ProtocolError> {
    let payload_bytes =
        rmp_serde::to_vec(payload).map_err(|e| ProtocolError::SerializeError(e.to_string()))?;
    let total = 1 + payload_bytes.len();
    if total > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(total));
    }
    let mut buf = Vec::with_capacity(total);
    buf.push(msg_type as u8);
    buf.extend_from_slice(&payload_bytes);
    Ok(buf)
}

pub fn encode_client_message(msg: &ClientMessage) -> Result<Vec<u8>, ProtocolError> {
    match msg {
        ClientMessage::Join(m) => encode_message(MessageType::Join, m),
        ClientMessage::Spectate(m) => encode_message(MessageType::Spectate, m),
        ClientMessage::Input(m) => encode_message(MessageType::Input, m),
        ClientMessage::Start => encode_message(MessageType::Start, &()),
        ClientMessage::Reset => encode_message(MessageType::Reset, &()),
    }
}

pub fn encode_server_message(msg: &ServerMessage) -> Result<Vec<u8>, ProtocolError> {
    match msg {
        ServerMessage::Joined(m) => encode_message(MessageType::Joined, m),
        ServerMessage::Spectating(m) => encode_message(MessageType::Spectating, m),
        ServerMessage::State(m) => encode_message(MessageType::State, m),
        ServerMessage::Error(m) => encode_message(MessageType::Error, m),
        ServerMessage::SessionEnded(m) => encode_message(MessageType::SessionEnded, m),
    }
}

/// Extract the message type byte from raw wire data.
pub fn decode_message_type(data: &[u8]) -> Result<MessageType, ProtocolError> {
    let Some(&first) = data.first() else {
        return Err(ProtocolError::EmptyMessage);
    };
    MessageType::from_byte(first).ok_or(ProtocolError::UnknownMessageType(first))
}

/// Decode a MessagePack payload (bytes after the type prefix).
pub fn decode_payload<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    rmp_serde::from_slice(&data[1..]).map_err(|e| ProtocolError::DeserializeError(e.to_string()))
}

pub fn decode_client_message(data: &[u8]) -> Result<ClientMessage, ProtocolError> {
    match decode_message_type(data)? {
        MessageType::Join => Ok(ClientMessage::Join(decode_payload::<JoinMsg>(data)?)),
        MessageType::Spectate => Ok(ClientMessage::Spectate(decode_payload::<SpectateMsg>(
            data,
        )?)),
        MessageType::Input => Ok(ClientMessage::Input(decode_payload::<InputMsg>(data)?)),
        MessageType::Start => Ok(ClientMessage::Start),
        MessageType::Reset => Ok(ClientMessage::Reset),
        other => Err(ProtocolError::UnexpectedMessageType(other)),
    }
}

pub fn decode_server_message(data: &[u8]) -> Result<ServerMessage, ProtocolError> {
    match decode_message_type(data)? {
        MessageType::Joined => Ok(ServerMessage::Joined(decode_payload::<JoinedMsg>(data)?)),
        MessageType::Spectating => Ok(ServerMessage::Spectating(decode_payload::<
            SpectatingMsg,
        >(data)?)),
        MessageType::State => Ok(ServerMessage::State(decode_payload::<StateMsg>(data)?)),
        MessageType::Error => Ok(ServerMessage::Error(decode_payload::<ErrorMsg>(data)?)),
        MessageType::SessionEnded => Ok(ServerMessage::SessionEnded(decode_payload::<
            SessionEndedMsg,
        >(data)?)),
        other => Err(ProtocolError::UnexpectedMessageType(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::messages::InputAction;
    use crate::snapshot::Direction;
    use crate::test_helpers::empty_snapshot;

    #[test]
    fn join_roundtrip() {
        let msg = ClientMessage::Join(JoinMsg {
            code: "4821".to_string(),
            name: Some("Alice".to_string()),
        });
        let data = encode_client_message(&msg).unwrap();
        assert_eq!(data[0], MessageType::Join as u8);
        assert_eq!(decode_client_message(&data).unwrap(), msg);
    }

    #[test]
    fn payloadless_messages_roundtrip() {
        for msg in [ClientMessage::Start, ClientMessage::Reset] {
            let data = encode_client_message(&msg).unwrap();
            assert_eq!(decode_client_message(&data).unwrap(), msg);
        }
    }

    #[test]
    fn move_input_roundtrip() {
        let msg = ClientMessage::Input(InputMsg {
            action: InputAction::Move {
                direction: Direction::Right,
            },
        });
        let data = encode_client_message(&msg).unwrap();
        assert_eq!(decode_client_message(&data).unwrap(), msg);
    }

    #[test]
    fn state_snapshot_survives_encoding() {
        let msg = ServerMessage::State(StateMsg {
            snapshot: empty_snapshot(21),
        });
        let data = encode_server_message(&msg).unwrap();
        assert!(data.len() < MAX_MESSAGE_SIZE);
        assert_eq!(decode_server_message(&data).unwrap(), msg);
    }

    #[test]
    fn empty_frame_rejected() {
        assert!(matches!(
            decode_client_message(&[]),
            Err(ProtocolError::EmptyMessage)
        ));
    }

    #[test]
    fn unknown_type_rejected() {
        assert!(matches!(
            decode_client_message(&[0xEE, 0xC0]),
            Err(ProtocolError::UnknownMessageType(0xEE))
        ));
    }

    #[test]
    fn server_message_rejected_as_client_message() {
        let data = encode_server_message(&ServerMessage::Error(ErrorMsg {
            message: "nope".into(),
        }))
        .unwrap();
        assert!(matches!(
            decode_client_message(&data),
            Err(ProtocolError::UnexpectedMessageType(MessageType::Error))
        ));
    }

    #[test]
    fn truncated_payload_is_a_decode_error() {
        let data = encode_client_message(&ClientMessage::Join(JoinMsg {
            code: "1234".into(),
            name: None,
        }))
        .unwrap();
        assert!(matches!(
            decode_client_message(&data[..2]),
            Err(ProtocolError::DeserializeError(_))
        ));
    }
}

//! Frame encoding for the two supported wire formats.
//!
//! Browsers speak JSON over text frames; native clients may use bincode over
//! binary frames. The server replies in whichever format a connection last
//! used.

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WireFormat {
    #[default]
    Json,
    Bincode,
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid json frame: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid binary frame: {0}")]
    Bincode(#[from] bincode::Error),
}

/// An encoded message ready to be wrapped in a transport frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodedFrame {
    Text(String),
    Binary(Vec<u8>),
}

pub fn encode<T: Serialize>(message: &T, format: WireFormat) -> Result<EncodedFrame, CodecError> {
    match format {
        WireFormat::Json => Ok(EncodedFrame::Text(serde_json::to_string(message)?)),
        WireFormat::Bincode => Ok(EncodedFrame::Binary(bincode::serialize(message)?)),
    }
}

pub fn decode_text<T: DeserializeOwned>(text: &str) -> Result<T, CodecError> {
    Ok(serde_json::from_str(text)?)
}

pub fn decode_binary<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    Ok(bincode::deserialize(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ClientMessage, InputState, RoomSettings, ServerMessage};

    #[test]
    fn test_json_frame_is_text() {
        let frame = encode(&ClientMessage::Restart, WireFormat::Json).unwrap();
        assert_eq!(frame, EncodedFrame::Text(r#""restart""#.to_string()));
    }

    #[test]
    fn test_bincode_round_trip() {
        let message = ClientMessage::CreateRoom {
            preferred_profile: Some(1),
            custom_name: Some("Mossy".to_string()),
            tether_length: Some(250.0),
            level_file: None,
        };
        let frame = encode(&message, WireFormat::Bincode).unwrap();
        let bytes = match frame {
            EncodedFrame::Binary(bytes) => bytes,
            EncodedFrame::Text(_) => panic!("bincode must produce a binary frame"),
        };
        let decoded: ClientMessage = decode_binary(&bytes).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn test_server_message_bincode() {
        let message = ServerMessage::Settings(RoomSettings { tether_length: 300 });
        let frame = encode(&message, WireFormat::Bincode).unwrap();
        if let EncodedFrame::Binary(bytes) = frame {
            let decoded: ServerMessage = decode_binary(&bytes).unwrap();
            assert_eq!(decoded, message);
        } else {
            panic!("expected binary frame");
        }
    }

    #[test]
    fn test_malformed_frames_are_errors() {
        assert!(matches!(
            decode_text::<ClientMessage>("{\"input\":"),
            Err(CodecError::Json(_))
        ));
        assert!(matches!(
            decode_text::<ClientMessage>(r#"{"fly":{}}"#),
            Err(CodecError::Json(_))
        ));
        assert!(matches!(
            decode_binary::<ClientMessage>(&[]),
            Err(CodecError::Bincode(_))
        ));

        let valid = bincode::serialize(&ClientMessage::Input(InputState::default())).unwrap();
        let truncated = &valid[..valid.len() - 1];
        assert!(decode_binary::<ClientMessage>(truncated).is_err());
    }
}

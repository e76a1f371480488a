// Peer wire messages

use serde::{Deserialize, Serialize};

use crate::blockchain::Block;

use super::NetworkError;

/// Largest payload accepted from a single connection
pub const MAX_MESSAGE_BYTES: usize = 1024 * 1024;

/// A single message exchanged between nodes
///
/// Encoded as JSON: `{"type": "new_block", "data": {...block fields...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum WireMessage {
    NewBlock(Block),
}

impl WireMessage {
    pub fn message_type(&self) -> &'static str {
        match self {
            WireMessage::NewBlock(_) => "new_block",
        }
    }

    /// Serializes the message for transmission
    pub fn to_bytes(&self) -> Result<Vec<u8>, NetworkError> {
        let bytes = serde_json::to_vec(self).map_err(NetworkError::Encode)?;

        if bytes.len() > MAX_MESSAGE_BYTES {
            return Err(NetworkError::MessageTooLarge(bytes.len()));
        }

        Ok(bytes)
    }

    /// Parses a message received from a peer
    pub fn from_slice(bytes: &[u8]) -> Result<Self, NetworkError> {
        if bytes.len() > MAX_MESSAGE_BYTES {
            return Err(NetworkError::MessageTooLarge(bytes.len()));
        }

        serde_json::from_slice(bytes).map_err(NetworkError::Decode)
    }
}

// Network module
//
// Plain TCP transport for block gossip. Each connection carries exactly one
// JSON message and is then closed.

pub mod broadcast;
pub mod message;
pub mod peer;
pub mod server;

use thiserror::Error;

pub use broadcast::{Delivery, PeerBroadcaster};
pub use message::WireMessage;
pub use peer::{send_message, PeerAddr};
pub use server::Server;

/// Errors that can occur in the transport
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Peer {peer} unreachable: {source}")]
    PeerUnreachable {
        peer: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("Invalid peer address {0:?}, expected host:port")]
    InvalidPeerAddr(String),

    #[error("Message of {0} bytes exceeds the size limit")]
    MessageTooLarge(usize),

    #[error("Failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Failed to decode message: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// Outbound peer connections

use log::debug;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use super::{NetworkError, WireMessage};

/// Address of a peer node as an explicit host and port
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerAddr {
    pub host: String,
    pub port: u16,
}

impl PeerAddr {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        PeerAddr {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for PeerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for PeerAddr {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || NetworkError::InvalidPeerAddr(s.to_string());

        let (host, port) = s.rsplit_once(':').ok_or_else(invalid)?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(invalid());
        }

        let port = port.parse::<u16>().map_err(|_| invalid())?;
        Ok(PeerAddr::new(host, port))
    }
}

/// Connects to a peer, writes one message and closes the connection
///
/// No acknowledgement is read back.
pub async fn send_message(
    peer: &PeerAddr,
    message: &WireMessage,
    connect_timeout: Duration,
) -> Result<(), NetworkError> {
    let payload = message.to_bytes()?;
    let unreachable = |source: std::io::Error| NetworkError::PeerUnreachable {
        peer: peer.to_string(),
        source,
    };

    let connect = TcpStream::connect((peer.host.as_str(), peer.port));
    let mut stream = tokio::time::timeout(connect_timeout, connect)
        .await
        .map_err(|_| NetworkError::Timeout(peer.to_string()))?
        .map_err(unreachable)?;

    stream.write_all(&payload).await.map_err(unreachable)?;
    stream.shutdown().await.map_err(unreachable)?;

    debug!("Sent {} ({} bytes) to {}", message.message_type(), payload.len(), peer);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_peer_addr() {
        let peer: PeerAddr = "localhost:5001".parse().unwrap();
        assert_eq!(peer, PeerAddr::new("localhost", 5001));
        assert_eq!(peer.to_string(), "localhost:5001");

        let peer: PeerAddr = "10.0.0.7:6000".parse().unwrap();
        assert_eq!(peer, PeerAddr::new("10.0.0.7", 6000));

        let peer: PeerAddr = "[::1]:5002".parse().unwrap();
        assert_eq!(peer, PeerAddr::new("::1", 5002));
        assert_eq!(peer.to_string(), "[::1]:5002");
    }

    #[test]
    fn test_parse_invalid_peer_addr() {
        for input in ["5001", "localhost", ":5001", "localhost:port", "localhost:70000"] {
            assert!(
                matches!(input.parse::<PeerAddr>(), Err(NetworkError::InvalidPeerAddr(_))),
                "{} should be rejected",
                input
            );
        }
    }

    #[tokio::test]
    async fn test_send_to_closed_port() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let peer = PeerAddr::new("127.0.0.1", port);
        let message = WireMessage::NewBlock(crate::blockchain::Block::genesis(0));

        let result = send_message(&peer, &message, Duration::from_secs(2)).await;
        assert!(matches!(result, Err(NetworkError::PeerUnreachable { .. })));
    }
}

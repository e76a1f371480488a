// Inbound connection handling

use log::{error, info, warn};
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::blockchain::Node;

use super::message::MAX_MESSAGE_BYTES;
use super::{NetworkError, WireMessage};

/// How long a peer may take to deliver its message
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Pause after a failed accept, e.g. when file descriptors run out
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Accepts peer connections, one message per connection
pub struct Server {
    listener: TcpListener,
    read_timeout: Duration,
}

impl Server {
    /// Binds the listening socket
    pub async fn bind(host: &str, port: u16) -> Result<Self, NetworkError> {
        let listener = TcpListener::bind((host, port)).await?;
        Ok(Server {
            listener,
            read_timeout: DEFAULT_READ_TIMEOUT,
        })
    }

    /// Sets how long a connection may stay open without completing its message
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr, NetworkError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections forever, handling each on its own task
    ///
    /// A failed accept is logged and retried; it never stops the listener.
    pub async fn run(self, node: Arc<Node>) -> Result<(), NetworkError> {
        info!("Node started on {}", self.local_addr()?);

        loop {
            let (stream, addr) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("Failed to accept connection: {}", e);
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
            };
            info!("Connected by {}", addr);

            let node = node.clone();
            let read_timeout = self.read_timeout;
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, addr, node, read_timeout).await {
                    warn!("Connection from {} failed: {}", addr, e);
                }
            });
        }
    }
}

/// Reads one message from the connection and dispatches it to the node
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    node: Arc<Node>,
    read_timeout: Duration,
) -> Result<(), NetworkError> {
    let mut payload = Vec::new();
    let mut limited = stream.take(MAX_MESSAGE_BYTES as u64 + 1);
    let read = limited.read_to_end(&mut payload);

    tokio::time::timeout(read_timeout, read)
        .await
        .map_err(|_| NetworkError::Timeout(addr.to_string()))??;

    match WireMessage::from_slice(&payload)? {
        WireMessage::NewBlock(block) => {
            let index = block.index;
            // Validation walks the whole chain; keep it off the reactor
            let result = tokio::task::spawn_blocking(move || node.receive_block(block)).await;

            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Discarded block #{}: {}", index, e),
                Err(e) => error!("Block #{} handler panicked: {}", index, e),
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::block::DEFAULT_GENESIS_TIMESTAMP;
    use crate::blockchain::{ChainSettings, Difficulty, LedgerPolicy};
    use crate::network::peer::{send_message, PeerAddr};

    use std::time::Duration;
    use tokio::io::AsyncWriteExt;

    fn node() -> Node {
        let node = Node::new(ChainSettings {
            difficulty: Difficulty::new(1),
            ledger_policy: LedgerPolicy::Replay,
            genesis_timestamp: DEFAULT_GENESIS_TIMESTAMP,
        });
        node.create_account("A1").unwrap();
        node.create_account("A2").unwrap();
        node.credit("A1", 50).unwrap();
        node
    }

    async fn wait_for_len(node: &Node, len: usize) -> bool {
        for _ in 0..100 {
            if node.len() == len {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }

    async fn start(node: Arc<Node>) -> PeerAddr {
        let server = Server::bind("127.0.0.1", 0)
            .await
            .unwrap()
            .with_read_timeout(Duration::from_millis(300));
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.run(node));
        PeerAddr::new("127.0.0.1", addr.port())
    }

    #[tokio::test]
    async fn test_received_block_is_integrated() {
        let miner = node();
        let receiver = Arc::new(node());
        let addr = start(receiver.clone()).await;

        let block = miner.submit_transfer("A1", "A2", 10).unwrap();
        send_message(&addr, &WireMessage::NewBlock(block.clone()), Duration::from_secs(2))
            .await
            .unwrap();

        assert!(wait_for_len(&receiver, 2).await);
        assert_eq!(receiver.tip(), block);
        assert_eq!(receiver.balance_of("A2"), Ok(10));
    }

    #[tokio::test]
    async fn test_invalid_payloads_keep_server_alive() {
        let miner = node();
        let receiver = Arc::new(node());
        let addr = start(receiver.clone()).await;

        let mut stream = TcpStream::connect((addr.host.as_str(), addr.port)).await.unwrap();
        stream.write_all(b"not json").await.unwrap();
        stream.shutdown().await.unwrap();

        let mut tampered = miner.submit_transfer("A1", "A2", 10).unwrap();
        tampered.nonce += 1;
        send_message(&addr, &WireMessage::NewBlock(tampered), Duration::from_secs(2))
            .await
            .unwrap();

        let block = miner.submit_transfer("A1", "A2", 5).unwrap();
        let genuine = miner.chain()[1].clone();
        send_message(&addr, &WireMessage::NewBlock(genuine), Duration::from_secs(2))
            .await
            .unwrap();
        assert!(wait_for_len(&receiver, 2).await);

        send_message(&addr, &WireMessage::NewBlock(block.clone()), Duration::from_secs(2))
            .await
            .unwrap();
        assert!(wait_for_len(&receiver, 3).await);
        assert_eq!(receiver.chain(), miner.chain());
        assert_eq!(receiver.balance_of("A1"), Ok(35));
    }

    #[tokio::test]
    async fn test_idle_connections_are_dropped() {
        let miner = node();
        let receiver = Arc::new(node());
        let addr = start(receiver.clone()).await;

        // Peers that connect and never send anything
        let mut idle = Vec::new();
        for _ in 0..8 {
            idle.push(TcpStream::connect((addr.host.as_str(), addr.port)).await.unwrap());
        }

        // The server keeps serving while they hang
        let block = miner.submit_transfer("A1", "A2", 10).unwrap();
        send_message(&addr, &WireMessage::NewBlock(block.clone()), Duration::from_secs(2))
            .await
            .unwrap();
        assert!(wait_for_len(&receiver, 2).await);

        // And closes each of them once the read timeout passes
        for stream in &mut idle {
            let mut buf = [0u8; 1];
            let read = tokio::time::timeout(Duration::from_secs(3), stream.read(&mut buf))
                .await
                .expect("idle connection was never closed");
            assert!(matches!(read, Ok(0) | Err(_)));
        }

        let next = miner.submit_transfer("A1", "A2", 5).unwrap();
        send_message(&addr, &WireMessage::NewBlock(next.clone()), Duration::from_secs(2))
            .await
            .unwrap();
        assert!(wait_for_len(&receiver, 3).await);
        assert_eq!(receiver.tip(), next);
    }
}

// Block gossip to configured peers

use futures::future::join_all;
use log::{info, warn};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedSender};

use std::sync::Arc;
use std::time::Duration;

use crate::blockchain::{Block, BlockSink};

use super::peer::{send_message, PeerAddr};
use super::{NetworkError, WireMessage};

/// Outcome of sending one block to one peer
#[derive(Debug)]
pub struct Delivery {
    pub peer: PeerAddr,
    pub result: Result<(), NetworkError>,
}

/// The peers a broadcaster sends to
#[derive(Debug)]
struct PeerSet {
    peers: Vec<PeerAddr>,
    connect_timeout: Duration,
}

impl PeerSet {
    async fn broadcast(&self, block: &Block) -> Vec<Delivery> {
        let message = WireMessage::NewBlock(block.clone());

        let sends = self.peers.iter().map(|peer| {
            let message = &message;
            async move {
                let result = send_message(peer, message, self.connect_timeout).await;
                if let Err(e) = &result {
                    warn!("Failed to send block #{} to {}: {}", block.index, peer, e);
                }
                Delivery {
                    peer: peer.clone(),
                    result,
                }
            }
        });

        let deliveries = join_all(sends).await;
        let delivered = deliveries.iter().filter(|d| d.result.is_ok()).count();
        info!(
            "Broadcast block #{} to {}/{} peers",
            block.index,
            delivered,
            deliveries.len()
        );

        deliveries
    }
}

/// Sends newly mined blocks to every configured peer
///
/// Published blocks go through a single queue drained by one task, so peers
/// receive them in the order they were appended to the chain.
#[derive(Clone)]
pub struct PeerBroadcaster {
    peer_set: Arc<PeerSet>,
    queue: UnboundedSender<Block>,
}

impl PeerBroadcaster {
    /// Creates a broadcaster whose sends run on `runtime`
    pub fn new(peers: Vec<PeerAddr>, connect_timeout: Duration, runtime: Handle) -> Self {
        let peer_set = Arc::new(PeerSet {
            peers,
            connect_timeout,
        });
        let (queue, mut blocks) = mpsc::unbounded_channel::<Block>();

        let drain = peer_set.clone();
        runtime.spawn(async move {
            while let Some(block) = blocks.recv().await {
                if !drain.peers.is_empty() {
                    drain.broadcast(&block).await;
                }
            }
        });

        PeerBroadcaster { peer_set, queue }
    }

    pub fn peers(&self) -> &[PeerAddr] {
        &self.peer_set.peers
    }

    /// Sends a block to every peer concurrently, bypassing the queue
    ///
    /// A failed peer is logged and reported; it does not stop the others.
    pub async fn broadcast(&self, block: &Block) -> Vec<Delivery> {
        self.peer_set.broadcast(block).await
    }
}

impl BlockSink for PeerBroadcaster {
    fn publish(&self, block: &Block) {
        if self.queue.send(block.clone()).is_err() {
            warn!("Broadcast queue closed, block #{} not gossiped", block.index);
        }
    }
}

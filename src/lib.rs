// Proof-of-work ledger node
//
// A single-process simulation of a proof-of-work chain: account balances,
// block mining, chain validation and block gossip over plain TCP.

pub mod blockchain;
pub mod config;
pub mod network;

// Re-exports for convenience
pub use blockchain::{
    Block, ChainSettings, ChainValidator, Ledger, LedgerPolicy, Miner, Node, NodeError, Transaction,
};
pub use config::NodeConfig;
pub use network::{NetworkError, PeerAddr, PeerBroadcaster, Server, WireMessage};

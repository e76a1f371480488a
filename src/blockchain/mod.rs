// Blockchain module
//
// This module contains the consensus and ledger engine including:
// - Transaction and block structures
// - Block hashing
// - Proof of work mining
// - Chain validation
// - Account ledger
// - The node that ties them together

pub mod account;
pub mod block;
pub mod chain;
pub mod crypto;
pub mod pow;
pub mod transaction;
pub mod validation;

// Re-export main components for easier access
pub use account::{Ledger, LedgerError, Wallet};
pub use block::Block;
pub use chain::{BlockSink, ChainSettings, LedgerPolicy, Node, NodeError, TransactionHistory};
pub use pow::{CancelToken, Difficulty, Miner, MiningError};
pub use transaction::Transaction;
pub use validation::{ChainValidator, ValidationError};

use serde::{Deserialize, Serialize};

use super::crypto::calculate_hash;
use super::transaction::Transaction;

/// previous_hash carried by the genesis block
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Default genesis timestamp, shared by every node so their chains start from the same block
pub const DEFAULT_GENESIS_TIMESTAMP: i64 = 1_700_000_000;

/// Represents a block in the blockchain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Index of the block in the chain
    pub index: u64,

    /// Hash of the previous block
    pub previous_hash: String,

    /// Seconds since the Unix epoch when the block was created
    pub timestamp: i64,

    /// List of transactions included in this block
    pub transactions: Vec<Transaction>,

    /// Proof of work (nonce)
    pub nonce: u64,

    /// Hash of the current block
    pub hash: String,
}

impl Block {
    /// Creates a sealed block, computing its hash from the other fields
    ///
    /// # Arguments
    ///
    /// * `index` - The index of the block in the chain
    /// * `previous_hash` - The hash of the previous block
    /// * `timestamp` - Seconds since the Unix epoch
    /// * `transactions` - The list of transactions to include in the block
    /// * `nonce` - The proof of work
    ///
    /// # Returns
    ///
    /// A new Block instance
    pub fn new(
        index: u64,
        previous_hash: String,
        timestamp: i64,
        transactions: Vec<Transaction>,
        nonce: u64,
    ) -> Self {
        let hash = calculate_hash(index, &previous_hash, timestamp, &transactions, nonce);

        Block {
            index,
            previous_hash,
            timestamp,
            transactions,
            nonce,
            hash,
        }
    }

    /// Creates the genesis block (first block in the chain)
    ///
    /// The genesis block holds a single sentinel transaction and is never
    /// held to the difficulty target.
    pub fn genesis(timestamp: i64) -> Self {
        Block::new(
            0,
            GENESIS_PREVIOUS_HASH.to_string(),
            timestamp,
            vec![Transaction::genesis()],
            0,
        )
    }

    /// Recomputes the hash of the block from its fields
    ///
    /// # Returns
    ///
    /// The SHA-256 hash of the block as a hexadecimal string
    pub fn calculate_hash(&self) -> String {
        calculate_hash(
            self.index,
            &self.previous_hash,
            self.timestamp,
            &self.transactions,
            self.nonce,
        )
    }

    /// Checks whether the stored hash matches the block's fields
    pub fn has_valid_hash(&self) -> bool {
        self.hash == self.calculate_hash()
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0 && self.previous_hash == GENESIS_PREVIOUS_HASH
    }
}

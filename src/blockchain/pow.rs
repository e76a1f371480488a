use chrono::Utc;
use log::debug;
use thiserror::Error;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::block::Block;
use super::crypto::calculate_hash;
use super::transaction::Transaction;

/// Number of hex digits in a SHA-256 hash
pub const MAX_DIFFICULTY: usize = 64;

/// Default number of leading zeros required in a block hash
pub const DEFAULT_DIFFICULTY: usize = 4;

/// Errors that can occur while mining
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MiningError {
    #[error("Mining of block {index} was cancelled after {attempts} attempts")]
    Cancelled { index: u64, attempts: u64 },

    #[error("Nonce space exhausted for block {0}")]
    NonceSpaceExhausted(u64),
}

/// Leading-zero difficulty predicate over the hex form of a hash
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Difficulty(usize);

impl Difficulty {
    /// Creates a difficulty requiring `zeros` leading '0' characters
    pub fn new(zeros: usize) -> Self {
        Difficulty(zeros)
    }

    /// Number of leading zeros required
    pub fn zeros(&self) -> usize {
        self.0
    }

    /// Checks whether a hash satisfies the difficulty
    pub fn is_met_by(&self, hash: &str) -> bool {
        hash.len() >= self.0 && hash.bytes().take(self.0).all(|b| b == b'0')
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Difficulty(DEFAULT_DIFFICULTY)
    }
}

/// Cooperative cancellation signal for a mining attempt
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        CancelToken::default()
    }

    /// Asks every miner holding a clone of this token to stop
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Proof of work miner
#[derive(Debug, Clone, Copy, Default)]
pub struct Miner {
    difficulty: Difficulty,
}

impl Miner {
    /// Creates a new miner with a fixed difficulty
    pub fn new(difficulty: Difficulty) -> Self {
        Miner { difficulty }
    }

    /// Mines a block on top of `parent`, stamped with the current time
    ///
    /// Blocks the calling thread until a nonce is found or `cancel` fires.
    ///
    /// # Arguments
    ///
    /// * `parent` - The current chain tip
    /// * `transactions` - The transactions to include in the block
    /// * `cancel` - Token checked before every attempt
    ///
    /// # Returns
    ///
    /// Result with the sealed block
    pub fn mine(
        &self,
        parent: &Block,
        transactions: Vec<Transaction>,
        cancel: &CancelToken,
    ) -> Result<Block, MiningError> {
        self.mine_at(parent, transactions, Utc::now().timestamp(), cancel)
    }

    /// Mines a block on top of `parent` with a caller-supplied timestamp
    pub fn mine_at(
        &self,
        parent: &Block,
        transactions: Vec<Transaction>,
        timestamp: i64,
        cancel: &CancelToken,
    ) -> Result<Block, MiningError> {
        let index = parent.index + 1;
        let previous_hash = parent.hash.clone();
        let mut nonce: u64 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(MiningError::Cancelled {
                    index,
                    attempts: nonce,
                });
            }

            let hash = calculate_hash(index, &previous_hash, timestamp, &transactions, nonce);

            if self.difficulty.is_met_by(&hash) {
                debug!("Mined block {} with nonce {} ({})", index, nonce, hash);
                return Ok(Block {
                    index,
                    previous_hash,
                    timestamp,
                    transactions,
                    nonce,
                    hash,
                });
            }

            nonce = nonce
                .checked_add(1)
                .ok_or(MiningError::NonceSpaceExhausted(index))?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::block::DEFAULT_GENESIS_TIMESTAMP;

    #[test]
    fn test_difficulty_predicate() {
        let difficulty = Difficulty::new(4);

        assert!(difficulty.is_met_by("0000abcd"));
        assert!(difficulty.is_met_by("00000000"));
        assert!(!difficulty.is_met_by("000abcde"));
        assert!(!difficulty.is_met_by("a0000000"));
        assert!(!difficulty.is_met_by("000"));
        assert!(Difficulty::new(0).is_met_by("ffff"));
        assert_eq!(Difficulty::default().zeros(), DEFAULT_DIFFICULTY);
    }

    #[test]
    fn test_mined_block_is_sealed() {
        let genesis = Block::genesis(DEFAULT_GENESIS_TIMESTAMP);
        let miner = Miner::new(Difficulty::new(2));
        let transactions = vec![Transaction::new("A1", "A2", 10)];

        let block = miner
            .mine(&genesis, transactions.clone(), &CancelToken::new())
            .unwrap();

        assert_eq!(block.index, 1);
        assert_eq!(block.previous_hash, genesis.hash);
        assert_eq!(block.transactions, transactions);
        assert!(block.hash.starts_with("00"));
        assert_eq!(
            block.hash,
            calculate_hash(
                block.index,
                &block.previous_hash,
                block.timestamp,
                &block.transactions,
                block.nonce
            )
        );
    }

    #[test]
    fn test_mine_finds_first_matching_nonce() {
        let genesis = Block::genesis(DEFAULT_GENESIS_TIMESTAMP);
        let miner = Miner::new(Difficulty::new(1));
        let transactions = vec![Transaction::new("A1", "A2", 3)];

        let block = miner
            .mine_at(&genesis, transactions.clone(), 1_700_000_500, &CancelToken::new())
            .unwrap();

        for nonce in 0..block.nonce {
            let hash = calculate_hash(1, &genesis.hash, 1_700_000_500, &transactions, nonce);
            assert!(!hash.starts_with('0'));
        }
    }

    #[test]
    fn test_zero_difficulty_accepts_first_nonce() {
        let genesis = Block::genesis(DEFAULT_GENESIS_TIMESTAMP);
        let block = Miner::new(Difficulty::new(0))
            .mine(&genesis, Vec::new(), &CancelToken::new())
            .unwrap();

        assert_eq!(block.nonce, 0);
    }

    #[test]
    fn test_cancelled_mining() {
        let genesis = Block::genesis(DEFAULT_GENESIS_TIMESTAMP);
        let cancel = CancelToken::new();
        cancel.clone().cancel();

        // Unreachable difficulty: only the token can end this search
        let miner = Miner::new(Difficulty::new(MAX_DIFFICULTY));
        let result = miner.mine(&genesis, Vec::new(), &cancel);

        assert_eq!(result, Err(MiningError::Cancelled { index: 1, attempts: 0 }));
    }

    #[test]
    fn test_cancel_from_another_thread() {
        let genesis = Block::genesis(DEFAULT_GENESIS_TIMESTAMP);
        let cancel = CancelToken::new();
        let miner = Miner::new(Difficulty::new(MAX_DIFFICULTY));

        let handle = {
            let cancel = cancel.clone();
            std::thread::spawn(move || miner.mine(&genesis, Vec::new(), &cancel))
        };

        std::thread::sleep(std::time::Duration::from_millis(20));
        cancel.cancel();

        assert!(matches!(
            handle.join().unwrap(),
            Err(MiningError::Cancelled { index: 1, .. })
        ));
    }
}

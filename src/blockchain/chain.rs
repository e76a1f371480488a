use log::{debug, info, warn};
use thiserror::Error;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::account::{Ledger, LedgerError, Wallet};
use super::block::{Block, DEFAULT_GENESIS_TIMESTAMP};
use super::pow::{CancelToken, Difficulty, Miner, MiningError};
use super::transaction::Transaction;
use super::validation::{ChainValidator, ValidationError};

/// Errors that can occur during node operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NodeError {
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Invalid chain: {0}")]
    InvalidChain(#[from] ValidationError),

    #[error("Mining error: {0}")]
    Mining(#[from] MiningError),
}

/// Whether blocks received from peers update the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LedgerPolicy {
    /// Apply the transfers of every accepted block; reject blocks whose
    /// transfers the local ledger cannot honour
    #[default]
    Replay,

    /// Only locally submitted transfers move balances
    LocalOnly,
}

/// Construction-time parameters of a node's chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainSettings {
    pub difficulty: Difficulty,
    pub ledger_policy: LedgerPolicy,
    pub genesis_timestamp: i64,
}

impl Default for ChainSettings {
    fn default() -> Self {
        ChainSettings {
            difficulty: Difficulty::default(),
            ledger_policy: LedgerPolicy::default(),
            genesis_timestamp: DEFAULT_GENESIS_TIMESTAMP,
        }
    }
}

/// Receives every block the node mines locally
///
/// `publish` is called while the node lock is held, in chain order, so it
/// must hand the block off without blocking.
pub trait BlockSink: Send + Sync {
    fn publish(&self, block: &Block);
}

/// A snapshot of the chain's transactions
///
/// Iterating does not hold the node lock, and the history can be iterated
/// any number of times.
#[derive(Debug, Clone)]
pub struct TransactionHistory {
    blocks: Vec<Block>,
}

impl TransactionHistory {
    /// Iterates over all transactions in chain order, block by block
    pub fn iter(&self) -> impl Iterator<Item = &Transaction> + '_ {
        self.blocks.iter().flat_map(|block| block.transactions.iter())
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

impl<'a> IntoIterator for &'a TransactionHistory {
    type Item = &'a Transaction;
    type IntoIter = Box<dyn Iterator<Item = &'a Transaction> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

/// Chain and ledger, always mutated together under one lock
#[derive(Debug)]
struct NodeState {
    chain: Vec<Block>,
    ledger: Ledger,
}

impl NodeState {
    fn tip(&self) -> &Block {
        // The chain is created with a genesis block and only ever grows
        &self.chain[self.chain.len() - 1]
    }
}

/// Owns the chain and the ledger for the lifetime of the process
pub struct Node {
    state: Mutex<NodeState>,
    miner: Miner,
    validator: ChainValidator,
    ledger_policy: LedgerPolicy,
    sink: Option<Arc<dyn BlockSink>>,
    mining_attempts: AtomicU64,
}

impl Node {
    /// Creates a new node with a genesis block and an empty ledger
    pub fn new(settings: ChainSettings) -> Self {
        Node {
            state: Mutex::new(NodeState {
                chain: vec![Block::genesis(settings.genesis_timestamp)],
                ledger: Ledger::new(),
            }),
            miner: Miner::new(settings.difficulty),
            validator: ChainValidator::new(settings.difficulty),
            ledger_policy: settings.ledger_policy,
            sink: None,
            mining_attempts: AtomicU64::new(0),
        }
    }

    /// Sets the collaborator that gossips locally mined blocks
    pub fn with_sink(mut self, sink: Arc<dyn BlockSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    fn state(&self) -> MutexGuard<'_, NodeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn create_account(&self, owner: &str) -> Result<(), NodeError> {
        self.state().ledger.create_account(owner)?;
        info!("Wallet for {} created.", owner);
        Ok(())
    }

    /// Creates coins for an account and returns the new balance
    pub fn credit(&self, owner: &str, amount: u64) -> Result<u64, NodeError> {
        let balance = self.state().ledger.credit(owner, amount)?;
        info!("{} coins created for {}. New balance: {}", amount, owner, balance);
        Ok(balance)
    }

    pub fn balance_of(&self, owner: &str) -> Result<u64, NodeError> {
        Ok(self.state().ledger.balance_of(owner)?)
    }

    pub fn wallets(&self) -> Vec<Wallet> {
        self.state().ledger.wallets()
    }

    /// Transfers funds and records the transfer in a newly mined block
    ///
    /// # Returns
    ///
    /// Result with the block that carries the transfer
    pub fn submit_transfer(
        &self,
        sender: &str,
        recipient: &str,
        amount: u64,
    ) -> Result<Block, NodeError> {
        self.submit_transfer_with_cancel(sender, recipient, amount, &CancelToken::new())
    }

    /// Like `submit_transfer`, but gives up when `cancel` fires
    ///
    /// Mining runs outside the lock. The balance change and the append happen
    /// together afterwards, and only if the tip is still the block that was
    /// mined on; otherwise the block is mined again on the new tip. A cancelled
    /// or rejected attempt leaves both the chain and the ledger untouched.
    pub fn submit_transfer_with_cancel(
        &self,
        sender: &str,
        recipient: &str,
        amount: u64,
        cancel: &CancelToken,
    ) -> Result<Block, NodeError> {
        let transaction = Transaction::new(sender, recipient, amount);

        let block = loop {
            let parent = {
                let state = self.state();
                state.ledger.check_transfer(sender, recipient, amount)?;
                state.tip().clone()
            };

            let attempt = self.mining_attempts.fetch_add(1, Ordering::Relaxed) + 1;
            debug!("Mining attempt {} on block #{}", attempt, parent.index);

            let candidate = self.miner.mine(&parent, vec![transaction.clone()], cancel)?;

            let mut state = self.state();
            if state.tip().hash != parent.hash {
                debug!(
                    "Chain tip moved past block {} while mining, retrying",
                    parent.index
                );
                continue;
            }

            state.ledger.transfer(sender, recipient, amount)?;
            state.chain.push(candidate.clone());

            // Still under the lock, so sinks see blocks in chain order
            if let Some(sink) = &self.sink {
                sink.publish(&candidate);
            }
            break candidate;
        };

        info!(
            "Transaction from {} to {} for {} coins has been added to the blockchain in block #{}",
            sender, recipient, amount, block.index
        );

        Ok(block)
    }

    /// Integrates a block received from a peer if it extends the local chain
    pub fn receive_block(&self, block: Block) -> Result<(), NodeError> {
        let mut state = self.state();

        if let Err(err) = self.validator.validate_extension(&state.chain, &block) {
            warn!("Rejected block #{}: {}", block.index, err);
            return Err(err.into());
        }

        if self.ledger_policy == LedgerPolicy::Replay {
            let mut staged = state.ledger.clone();
            for transaction in &block.transactions {
                if let Err(err) = staged.apply(transaction) {
                    warn!("Rejected block #{}: {}", block.index, err);
                    return Err(err.into());
                }
            }
            state.ledger = staged;
        }

        info!("Block #{} added to the blockchain! Hash: {}", block.index, block.hash);
        state.chain.push(block);

        Ok(())
    }

    /// Number of blocks mined for local transfers, counting discarded ones
    pub fn mining_attempts(&self) -> u64 {
        self.mining_attempts.load(Ordering::Relaxed)
    }

    /// Snapshot of every transaction in chain order
    pub fn transactions(&self) -> TransactionHistory {
        TransactionHistory {
            blocks: self.chain(),
        }
    }

    pub fn chain(&self) -> Vec<Block> {
        self.state().chain.clone()
    }

    pub fn tip(&self) -> Block {
        self.state().tip().clone()
    }

    pub fn len(&self) -> usize {
        self.state().chain.len()
    }

    /// Validates the local chain
    pub fn is_valid(&self) -> bool {
        self.validator.is_valid(&self.state().chain)
    }
}

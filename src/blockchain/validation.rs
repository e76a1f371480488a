use thiserror::Error;

use super::block::Block;
use super::pow::Difficulty;

/// Reasons a chain is rejected
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Chain is empty")]
    EmptyChain,

    #[error("Block {index} does not follow block {parent_index}")]
    IndexMismatch { index: u64, parent_index: u64 },

    #[error("Block {index} links to {found}, expected parent hash {expected}")]
    BrokenLink {
        index: u64,
        expected: String,
        found: String,
    },

    #[error("Block {index} stores hash {stored} but its fields hash to {computed}")]
    HashMismatch {
        index: u64,
        stored: String,
        computed: String,
    },

    #[error("Block {index} hash {hash} does not have {required} leading zeros")]
    InsufficientWork {
        index: u64,
        hash: String,
        required: usize,
    },
}

/// Checks linkage and proof of work across a sequence of blocks
#[derive(Debug, Clone, Copy, Default)]
pub struct ChainValidator {
    difficulty: Difficulty,
}

impl ChainValidator {
    pub fn new(difficulty: Difficulty) -> Self {
        ChainValidator { difficulty }
    }

    /// Validates a chain, trusting its first block as genesis
    ///
    /// # Arguments
    ///
    /// * `chain` - The blocks in chain order
    ///
    /// # Returns
    ///
    /// Ok(()) if every (parent, child) pair passes, or the first failure
    pub fn validate(&self, chain: &[Block]) -> Result<(), ValidationError> {
        if chain.is_empty() {
            return Err(ValidationError::EmptyChain);
        }

        chain
            .windows(2)
            .try_for_each(|pair| self.check_pair(&pair[0], &pair[1]))
    }

    /// Validates `chain` followed by `candidate` without copying the chain
    pub fn validate_extension(
        &self,
        chain: &[Block],
        candidate: &Block,
    ) -> Result<(), ValidationError> {
        self.validate(chain)?;

        match chain.last() {
            Some(tip) => self.check_pair(tip, candidate),
            None => Err(ValidationError::EmptyChain),
        }
    }

    /// Returns true if the chain is valid
    pub fn is_valid(&self, chain: &[Block]) -> bool {
        self.validate(chain).is_ok()
    }

    fn check_pair(&self, parent: &Block, block: &Block) -> Result<(), ValidationError> {
        if parent.index.checked_add(1) != Some(block.index) {
            return Err(ValidationError::IndexMismatch {
                index: block.index,
                parent_index: parent.index,
            });
        }

        // Recompute rather than trust parent.hash
        let expected = parent.calculate_hash();
        if block.previous_hash != expected {
            return Err(ValidationError::BrokenLink {
                index: block.index,
                expected,
                found: block.previous_hash.clone(),
            });
        }

        let computed = block.calculate_hash();
        if block.hash != computed {
            return Err(ValidationError::HashMismatch {
                index: block.index,
                stored: block.hash.clone(),
                computed,
            });
        }

        if !self.difficulty.is_met_by(&block.hash) {
            return Err(ValidationError::InsufficientWork {
                index: block.index,
                hash: block.hash.clone(),
                required: self.difficulty.zeros(),
            });
        }

        Ok(())
    }
}

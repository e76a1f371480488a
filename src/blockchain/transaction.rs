use serde::{Deserialize, Serialize};

use std::fmt;

/// Account id used on both sides of the genesis transaction
pub const GENESIS_ACCOUNT: &str = "Genesis";

/// Represents a value transfer between two named accounts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Account the value is taken from
    pub sender: String,

    /// Account the value is given to
    pub recipient: String,

    /// Amount being transferred
    pub amount: u64,
}

impl Transaction {
    /// Creates a new transaction
    ///
    /// # Arguments
    ///
    /// * `sender` - The account id of the sender
    /// * `recipient` - The account id of the recipient
    /// * `amount` - The amount to transfer
    ///
    /// # Returns
    ///
    /// A new Transaction instance
    pub fn new(sender: impl Into<String>, recipient: impl Into<String>, amount: u64) -> Self {
        Transaction {
            sender: sender.into(),
            recipient: recipient.into(),
            amount,
        }
    }

    /// Creates the sentinel transaction carried by the genesis block
    pub fn genesis() -> Self {
        Transaction::new(GENESIS_ACCOUNT, GENESIS_ACCOUNT, 0)
    }

    /// Checks if the transaction is the genesis sentinel
    pub fn is_genesis(&self) -> bool {
        self.sender == GENESIS_ACCOUNT && self.recipient == GENESIS_ACCOUNT && self.amount == 0
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Sender: {}, Recipient: {}, Amount: {}",
            self.sender, self.recipient, self.amount
        )
    }
}

use serde::{Deserialize, Serialize};
use thiserror::Error;

use std::collections::HashMap;

use super::transaction::Transaction;

/// Errors that can occur during account operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Account already exists: {0}")]
    AccountExists(String),

    #[error("Invalid account owner: {0:?}")]
    InvalidOwner(String),

    #[error("Insufficient balance in {account}: required {required}, available {available}")]
    InsufficientBalance {
        account: String,
        required: u64,
        available: u64,
    },

    #[error("Balance overflow for {0}")]
    BalanceOverflow(String),
}

/// Represents an account balance in the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    /// The account's owner
    pub owner: String,

    /// The account's balance
    pub balance: u64,
}

impl Wallet {
    /// Creates a new zero-balance wallet
    pub fn new(owner: impl Into<String>) -> Self {
        Wallet {
            owner: owner.into(),
            balance: 0,
        }
    }

    /// Increases the wallet's balance
    pub fn deposit(&mut self, amount: u64) -> Result<(), LedgerError> {
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or_else(|| LedgerError::BalanceOverflow(self.owner.clone()))?;
        Ok(())
    }

    /// Decreases the wallet's balance
    pub fn withdraw(&mut self, amount: u64) -> Result<(), LedgerError> {
        if !self.has_sufficient_funds(amount) {
            return Err(LedgerError::InsufficientBalance {
                account: self.owner.clone(),
                required: amount,
                available: self.balance,
            });
        }

        self.balance -= amount;
        Ok(())
    }

    pub fn has_sufficient_funds(&self, amount: u64) -> bool {
        self.balance >= amount
    }
}

/// Maps account owners to balances
///
/// The ledger itself is not synchronized. Callers that share it across threads
/// must hold one lock across a whole transfer so the balance check and the
/// debit cannot interleave with another transfer.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    wallets: HashMap<String, Wallet>,
}

impl Ledger {
    pub fn new() -> Self {
        Ledger::default()
    }

    /// Registers a zero-balance account
    ///
    /// # Arguments
    ///
    /// * `owner` - The account id
    ///
    /// # Returns
    ///
    /// Err(AccountExists) if the owner is already registered; the existing
    /// balance is left untouched
    pub fn create_account(&mut self, owner: &str) -> Result<(), LedgerError> {
        if owner.trim().is_empty() {
            return Err(LedgerError::InvalidOwner(owner.to_string()));
        }

        if self.wallets.contains_key(owner) {
            return Err(LedgerError::AccountExists(owner.to_string()));
        }

        self.wallets.insert(owner.to_string(), Wallet::new(owner));
        Ok(())
    }

    /// Creates coins in an existing account
    ///
    /// # Returns
    ///
    /// The new balance
    pub fn credit(&mut self, owner: &str, amount: u64) -> Result<u64, LedgerError> {
        let wallet = self
            .wallets
            .get_mut(owner)
            .ok_or_else(|| LedgerError::AccountNotFound(owner.to_string()))?;

        wallet.deposit(amount)?;
        Ok(wallet.balance)
    }

    /// Checks whether a transfer would succeed, without applying it
    pub fn check_transfer(
        &self,
        sender: &str,
        recipient: &str,
        amount: u64,
    ) -> Result<(), LedgerError> {
        let from = self.wallet(sender)?;
        let to = self.wallet(recipient)?;

        if !from.has_sufficient_funds(amount) {
            return Err(LedgerError::InsufficientBalance {
                account: sender.to_string(),
                required: amount,
                available: from.balance,
            });
        }

        if sender != recipient && to.balance.checked_add(amount).is_none() {
            return Err(LedgerError::BalanceOverflow(recipient.to_string()));
        }

        Ok(())
    }

    /// Moves funds between two existing accounts
    ///
    /// Either both balances change or neither does.
    pub fn transfer(
        &mut self,
        sender: &str,
        recipient: &str,
        amount: u64,
    ) -> Result<(), LedgerError> {
        self.check_transfer(sender, recipient, amount)?;

        if sender == recipient {
            return Ok(());
        }

        if let Some(from) = self.wallets.get_mut(sender) {
            from.withdraw(amount)?;
        }
        if let Some(to) = self.wallets.get_mut(recipient) {
            to.deposit(amount)?;
        }

        Ok(())
    }

    /// Applies a transaction's transfer
    pub fn apply(&mut self, transaction: &Transaction) -> Result<(), LedgerError> {
        self.transfer(&transaction.sender, &transaction.recipient, transaction.amount)
    }

    pub fn balance_of(&self, owner: &str) -> Result<u64, LedgerError> {
        self.wallet(owner).map(|wallet| wallet.balance)
    }

    pub fn wallet(&self, owner: &str) -> Result<&Wallet, LedgerError> {
        self.wallets
            .get(owner)
            .ok_or_else(|| LedgerError::AccountNotFound(owner.to_string()))
    }

    /// Gets all wallets, sorted by owner
    pub fn wallets(&self) -> Vec<Wallet> {
        let mut wallets: Vec<Wallet> = self.wallets.values().cloned().collect();
        wallets.sort_by(|a, b| a.owner.cmp(&b.owner));
        wallets
    }
}

use sha2::{Digest, Sha256};

use super::transaction::Transaction;

/// Computes the SHA-256 digest of a block's fields
///
/// Fields are fed to the hasher in a fixed order. Strings are length-prefixed
/// and integers are big-endian, so no two distinct inputs share an encoding.
///
/// # Arguments
///
/// * `index` - The index of the block in the chain
/// * `previous_hash` - The hash of the previous block
/// * `timestamp` - Seconds since the Unix epoch
/// * `transactions` - The transactions in block order
/// * `nonce` - The proof-of-work search variable
///
/// # Returns
///
/// The digest as a lowercase hexadecimal string
pub fn calculate_hash(
    index: u64,
    previous_hash: &str,
    timestamp: i64,
    transactions: &[Transaction],
    nonce: u64,
) -> String {
    let mut hasher = Sha256::new();

    hasher.update(index.to_be_bytes());
    update_str(&mut hasher, previous_hash);
    hasher.update(timestamp.to_be_bytes());

    hasher.update((transactions.len() as u64).to_be_bytes());
    for transaction in transactions {
        update_str(&mut hasher, &transaction.sender);
        update_str(&mut hasher, &transaction.recipient);
        hasher.update(transaction.amount.to_be_bytes());
    }

    hasher.update(nonce.to_be_bytes());

    hex::encode(hasher.finalize())
}

fn update_str(hasher: &mut Sha256, value: &str) {
    hasher.update((value.len() as u64).to_be_bytes());
    hasher.update(value.as_bytes());
}

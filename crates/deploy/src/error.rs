//! Error taxonomy for the deployment pipeline.
//!
//! Errors are split by the stage that produces them and by whether a retry
//! can possibly help. Pre-flight errors (`Config`, `InsufficientFunds`)
//! happen before any transaction exists; post-submission errors carry the
//! transaction hash so an operator can reconcile on-chain state manually.

use std::time::Duration;

use alloy_primitives::{Address, B256, U256};

/// How a node rejection should be handled by the submission retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionKind {
    /// Worth retrying with a fresh nonce read (nonce races, fee races).
    Transient,
    /// Retrying the same payload cannot succeed (malformed input,
    /// insufficient funds at the node, unsupported transaction type).
    Fatal,
}

/// Errors produced by the deployment pipeline.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// Missing or invalid configuration. Raised before any network call.
    #[error("configuration error: {0}")]
    Config(String),

    /// The sender cannot cover even the base cost of a creation transaction.
    #[error(
        "insufficient funds: sender {sender} holds {balance} wei, \
         needs at least {required} wei for a creation transaction"
    )]
    InsufficientFunds {
        sender: Address,
        balance: U256,
        required: U256,
    },

    /// The node rejected a submitted transaction.
    #[error("transaction rejected by node: {message}")]
    Submission {
        kind: SubmissionKind,
        message: String,
    },

    /// The contract constructor reverted on-chain. Not retryable.
    #[error("deployment reverted on-chain in block {block_number} (tx {tx_hash})")]
    Reverted { tx_hash: B256, block_number: u64 },

    /// The confirmation budget elapsed. The transaction may still land;
    /// the hash is kept for manual follow-up.
    #[error(
        "timed out after {elapsed:?} waiting for {target} confirmations of \
         {tx_hash} ({achieved} reached); the transaction may still confirm"
    )]
    ConfirmationTimeout {
        tx_hash: B256,
        target: u64,
        achieved: u64,
        elapsed: Duration,
    },

    /// Explorer verification failed. Never fatal to the deployment itself:
    /// the contract is live on-chain regardless.
    #[error("verification failed: {0}")]
    Verification(String),

    /// Transport-level RPC or HTTP failure (connection refused, timeout,
    /// malformed response). Generally transient.
    #[error("rpc error: {0}")]
    Rpc(String),
}

impl DeployError {
    /// Whether the submission retry loop should try again with a fresh nonce.
    ///
    /// Transport faults count as transient: if the first broadcast actually
    /// landed, the retried payload fails the nonce check instead of
    /// double-spending.
    pub fn is_transient_submission(&self) -> bool {
        matches!(
            self,
            DeployError::Submission {
                kind: SubmissionKind::Transient,
                ..
            } | DeployError::Rpc(_)
        )
    }
}

/// Classify a node rejection message.
///
/// The strings match go-ethereum/anvil error texts, which every major
/// EVM client mirrors closely enough for substring matching.
pub fn classify_rejection(message: &str) -> SubmissionKind {
    let msg = message.to_ascii_lowercase();
    if msg.contains("nonce too low")
        || msg.contains("replacement transaction underpriced")
        || msg.contains("already known")
    {
        SubmissionKind::Transient
    } else {
        SubmissionKind::Fatal
    }
}

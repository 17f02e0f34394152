//! Confirmation waiter.
//!
//! Polls for the transaction receipt until the target confirmation depth
//! is reached, the constructor reverts, or the timeout budget elapses.
//! States: `Submitted -> Pending(depth) -> Confirmed | Reverted |
//! TimedOut`. A receipt that disappears or moves blocks (reorg) resets
//! the depth and polling resumes; transient RPC errors are tolerated.

use std::sync::Arc;
use std::time::{Duration, Instant};

use alloy_primitives::B256;

use crate::chain::{ChainClient, Receipt};
use crate::error::DeployError;

/// A transaction that reached the target confirmation depth.
#[derive(Debug, Clone)]
pub struct Confirmation {
    pub receipt: Receipt,
    pub confirmations: u64,
}

/// Observed wait progress.
#[derive(Debug, Clone)]
enum WaitState {
    /// Accepted by the node; no receipt observed yet.
    Submitted,
    /// Receipt observed; tracking confirmation depth.
    Pending { inclusion_block: u64 },
}

/// Polls a transaction to its confirmation target.
pub struct ConfirmationWaiter {
    chain: Arc<dyn ChainClient>,
    target: u64,
    poll_interval: Duration,
    timeout: Duration,
}

impl ConfirmationWaiter {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        target: u64,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            chain,
            target,
            poll_interval,
            timeout,
        }
    }

    /// Wait until `tx_hash` has the target number of confirmations.
    ///
    /// On timeout the error carries the hash and the depth achieved so
    /// far; the transaction may still confirm later.
    pub async fn wait(&self, tx_hash: B256) -> Result<Confirmation, DeployError> {
        let start = Instant::now();
        let mut state = WaitState::Submitted;
        let mut achieved = 0u64;

        loop {
            if start.elapsed() >= self.timeout {
                return Err(DeployError::ConfirmationTimeout {
                    tx_hash,
                    target: self.target,
                    achieved,
                    elapsed: start.elapsed(),
                });
            }

            match self.chain.receipt(tx_hash).await {
                Err(e) => {
                    tracing::trace!(error = %e, "Receipt poll failed; retrying...");
                }
                Ok(None) => {
                    if let WaitState::Pending { inclusion_block } = state {
                        tracing::warn!(
                            tx_hash = %tx_hash,
                            dropped_block = inclusion_block,
                            "Receipt no longer on the canonical chain (reorg); depth reset"
                        );
                        state = WaitState::Submitted;
                        achieved = 0;
                    }
                }
                Ok(Some(receipt)) => {
                    if !receipt.success {
                        return Err(DeployError::Reverted {
                            tx_hash,
                            block_number: receipt.block_number,
                        });
                    }

                    let current_block = match self.chain.block_number().await {
                        Ok(block) => block,
                        Err(e) => {
                            tracing::trace!(error = %e, "Block number poll failed; retrying...");
                            tokio::time::sleep(self.poll_interval).await;
                            continue;
                        }
                    };

                    match state {
                        WaitState::Submitted => {
                            tracing::info!(
                                tx_hash = %tx_hash,
                                block_number = receipt.block_number,
                                "Transaction mined; waiting for confirmations..."
                            );
                        }
                        WaitState::Pending { inclusion_block }
                            if inclusion_block != receipt.block_number =>
                        {
                            tracing::warn!(
                                old_block = inclusion_block,
                                new_block = receipt.block_number,
                                "Transaction moved to a different block (reorg); depth reset"
                            );
                        }
                        WaitState::Pending { .. } => {}
                    }

                    let depth = confirmation_depth(current_block, receipt.block_number);
                    if depth >= self.target {
                        tracing::info!(confirmations = depth, "Confirmation target reached");
                        return Ok(Confirmation {
                            receipt,
                            confirmations: depth,
                        });
                    }

                    tracing::debug!(
                        confirmations = depth,
                        target = self.target,
                        "Waiting for confirmations..."
                    );
                    achieved = depth;
                    state = WaitState::Pending {
                        inclusion_block: receipt.block_number,
                    };
                }
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

/// Blocks mined on top of the inclusion block, counting the inclusion
/// block itself.
fn confirmation_depth(current_block: u64, inclusion_block: u64) -> u64 {
    current_block.saturating_sub(inclusion_block) + 1
}

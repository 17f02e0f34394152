//! Deterministic in-memory chain.
//!
//! Backs the `hardhat` dev network and the test suite. Each receipt poll
//! mines exactly one block, so confirmation depth grows by one per poll
//! and every run is reproducible. Failure modes (rejections, reverts,
//! halted mining, a reorg) are injectable per instance.

use std::collections::HashMap;
use std::sync::Mutex;

use alloy_consensus::Transaction;
use alloy_consensus::TxEnvelope;
use alloy_consensus::transaction::SignerRecoverable;
use alloy_eips::eip2718::Decodable2718;
use alloy_primitives::{Address, B256, Bytes, U256};
use async_trait::async_trait;

use super::{ChainClient, FeeEstimate, Receipt};
use crate::error::{DeployError, SubmissionKind, classify_rejection};

/// Dev-account funding, in wei (10 000 ETH, the hardhat default).
pub const DEFAULT_DEV_BALANCE: u128 = 10_000_000_000_000_000_000_000;

/// Simulated gas price, in wei (1 gwei).
const SIM_GAS_PRICE: u128 = 1_000_000_000;

/// Base gas of a creation transaction (21 000 intrinsic + 32 000 create).
const CREATION_BASE_GAS: u64 = 53_000;

#[derive(Debug, Clone)]
struct SimReceipt {
    block_number: u64,
    success: bool,
    contract_address: Address,
}

#[derive(Debug, Default)]
struct SimState {
    block_number: u64,
    balances: HashMap<Address, U256>,
    nonces: HashMap<Address, u64>,
    receipts: HashMap<B256, SimReceipt>,
    broadcast_attempts: u64,
    halted: bool,
    revert_next: bool,
    reject_next: Option<String>,
    reorg: Option<B256>,
}

/// In-memory chain client.
pub struct DevChain {
    chain_id: u64,
    state: Mutex<SimState>,
}

impl DevChain {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            state: Mutex::new(SimState {
                block_number: 1,
                ..SimState::default()
            }),
        }
    }

    /// Credit an account balance.
    pub fn fund(&self, address: Address, wei: U256) {
        let mut state = self.state.lock().expect("sim state poisoned");
        *state.balances.entry(address).or_default() += wei;
    }

    /// Stop mining: submissions are accepted but never get a receipt.
    pub fn halt_mining(&self) {
        self.state.lock().expect("sim state poisoned").halted = true;
    }

    /// Make the next deployed constructor revert.
    pub fn revert_next_deployment(&self) {
        self.state.lock().expect("sim state poisoned").revert_next = true;
    }

    /// Reject the next broadcast with the given node error message.
    pub fn reject_next_submission(&self, message: &str) {
        self.state.lock().expect("sim state poisoned").reject_next = Some(message.to_string());
    }

    /// Drop the receipt for `hash` from the canonical chain once; it is
    /// re-included in a later block on the following poll.
    pub fn trigger_reorg(&self, hash: B256) {
        self.state.lock().expect("sim state poisoned").reorg = Some(hash);
    }

    /// Number of `send_raw_transaction` calls observed, accepted or not.
    pub fn broadcast_attempts(&self) -> u64 {
        self.state.lock().expect("sim state poisoned").broadcast_attempts
    }

    /// Block the given receipt is currently included in, if mined.
    pub fn inclusion_block(&self, hash: B256) -> Option<u64> {
        self.state
            .lock()
            .expect("sim state poisoned")
            .receipts
            .get(&hash)
            .map(|r| r.block_number)
    }
}

#[async_trait]
impl ChainClient for DevChain {
    async fn chain_id(&self) -> Result<u64, DeployError> {
        Ok(self.chain_id)
    }

    async fn balance(&self, address: Address) -> Result<U256, DeployError> {
        let state = self.state.lock().expect("sim state poisoned");
        Ok(state.balances.get(&address).copied().unwrap_or_default())
    }

    async fn nonce(&self, address: Address) -> Result<u64, DeployError> {
        let state = self.state.lock().expect("sim state poisoned");
        Ok(state.nonces.get(&address).copied().unwrap_or_default())
    }

    async fn estimate_gas(&self, _from: Address, init_code: &Bytes) -> Result<u64, DeployError> {
        Ok(CREATION_BASE_GAS + 16 * init_code.len() as u64)
    }

    async fn fees(&self) -> Result<FeeEstimate, DeployError> {
        Ok(FeeEstimate {
            gas_price: SIM_GAS_PRICE,
            max_fee_per_gas: 2 * SIM_GAS_PRICE,
            max_priority_fee_per_gas: SIM_GAS_PRICE,
        })
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<B256, DeployError> {
        let mut state = self.state.lock().expect("sim state poisoned");
        state.broadcast_attempts += 1;

        if let Some(message) = state.reject_next.take() {
            return Err(DeployError::Submission {
                kind: classify_rejection(&message),
                message,
            });
        }

        let envelope = TxEnvelope::decode_2718(&mut raw.as_ref()).map_err(|e| {
            DeployError::Submission {
                kind: SubmissionKind::Fatal,
                message: format!("malformed transaction payload: {e}"),
            }
        })?;
        let sender = envelope.recover_signer().map_err(|e| DeployError::Submission {
            kind: SubmissionKind::Fatal,
            message: format!("invalid signature: {e}"),
        })?;

        let balance = state.balances.get(&sender).copied().unwrap_or_default();
        if balance.is_zero() {
            return Err(DeployError::Submission {
                kind: SubmissionKind::Fatal,
                message: "insufficient funds for gas * price + value".to_string(),
            });
        }

        let expected_nonce = state.nonces.get(&sender).copied().unwrap_or_default();
        if envelope.nonce() < expected_nonce {
            return Err(DeployError::Submission {
                kind: SubmissionKind::Transient,
                message: format!(
                    "nonce too low: next nonce {expected_nonce}, tx nonce {}",
                    envelope.nonce()
                ),
            });
        }

        let hash = *envelope.tx_hash();
        let contract_address = sender.create(envelope.nonce());
        let block_number = state.block_number + 1;
        let success = !std::mem::take(&mut state.revert_next);

        state.receipts.insert(
            hash,
            SimReceipt {
                block_number,
                success,
                contract_address,
            },
        );
        state.nonces.insert(sender, envelope.nonce() + 1);

        Ok(hash)
    }

    async fn receipt(&self, hash: B256) -> Result<Option<Receipt>, DeployError> {
        let mut state = self.state.lock().expect("sim state poisoned");
        if state.halted {
            return Ok(None);
        }

        // One block per poll.
        state.block_number += 1;

        if state.reorg == Some(hash) {
            state.reorg = None;
            let later_block = state.block_number + 1;
            if let Some(receipt) = state.receipts.get_mut(&hash) {
                receipt.block_number = later_block;
            }
            // The previously observed receipt is gone from the canonical
            // chain for this poll.
            return Ok(None);
        }

        match state.receipts.get(&hash) {
            Some(receipt) if receipt.block_number <= state.block_number => Ok(Some(Receipt {
                tx_hash: hash,
                block_number: receipt.block_number,
                success: receipt.success,
                contract_address: Some(receipt.contract_address),
            })),
            _ => Ok(None),
        }
    }

    async fn block_number(&self) -> Result<u64, DeployError> {
        Ok(self.state.lock().expect("sim state poisoned").block_number)
    }
}

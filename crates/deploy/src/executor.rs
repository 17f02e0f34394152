//! Deployment executor.
//!
//! Builds the contract-creation transaction, signs it, and submits it
//! through the chain client. Node rejections classified as transient are
//! retried a bounded number of times with exponential backoff; every
//! attempt re-reads the nonce and re-signs, so a stale payload is never
//! resubmitted blindly.

use std::sync::Arc;
use std::time::Duration;

use alloy_consensus::{SignableTransaction, TxEip1559, TxEnvelope};
use alloy_eips::eip2718::Encodable2718;
use alloy_primitives::{Address, B256, Bytes, TxKind, U256};
use alloy_signer::SignerSync;
use backon::{ExponentialBuilder, Retryable};
use chrono::{DateTime, Utc};

use crate::artifact::ContractArtifact;
use crate::chain::ChainClient;
use crate::credentials::Credentials;
use crate::error::{DeployError, SubmissionKind};
use crate::network::{GasStrategy, NetworkProfile};

/// Retries after the initial submission attempt.
const MAX_SUBMIT_RETRIES: usize = 3;

/// Initial backoff between submission attempts.
const SUBMIT_BACKOFF: Duration = Duration::from_millis(500);

/// Base gas of a creation transaction (21 000 intrinsic + 32 000 create),
/// used for the pre-flight funds check.
const CREATION_BASE_GAS: u64 = 53_000;

/// Proof that the node accepted a creation transaction.
///
/// A handle exists only after acceptance, never for a merely-signed
/// payload. Each retry attempt that reaches the node produces its own
/// handle; the first one to hit the confirmation target is canonical.
#[derive(Debug, Clone)]
pub struct TransactionHandle {
    pub hash: B256,
    pub sender: Address,
    pub nonce: u64,
    /// ABI-encoded constructor arguments as actually submitted, reused
    /// verbatim by the verification stage.
    pub encoded_args: Bytes,
    pub submitted_at: DateTime<Utc>,
}

/// Builds and submits creation transactions.
pub struct DeploymentExecutor {
    chain: Arc<dyn ChainClient>,
}

impl DeploymentExecutor {
    pub fn new(chain: Arc<dyn ChainClient>) -> Self {
        Self { chain }
    }

    /// Pre-flight funds check.
    ///
    /// Soft by design: it catches an empty or clearly underfunded sender
    /// before anything is broadcast, and leaves the chain as the final
    /// arbiter of the exact cost.
    pub async fn check_funds(&self, sender: Address) -> Result<U256, DeployError> {
        let balance = self.chain.balance(sender).await?;
        let fees = self.chain.fees().await?;
        let required = U256::from(CREATION_BASE_GAS) * U256::from(fees.max_fee_per_gas);
        if balance < required {
            return Err(DeployError::InsufficientFunds {
                sender,
                balance,
                required,
            });
        }
        Ok(balance)
    }

    /// Sign and submit the creation transaction.
    pub async fn submit(
        &self,
        profile: &NetworkProfile,
        credentials: &Credentials,
        artifact: &ContractArtifact,
    ) -> Result<TransactionHandle, DeployError> {
        let init_code = artifact.init_code()?;
        let encoded_args = artifact.encoded_constructor_args()?;
        let sender = credentials.address();

        tracing::info!(
            contract = %artifact.name,
            sender = %sender,
            init_code_len = init_code.len(),
            "Submitting creation transaction..."
        );

        let attempt = || async { self.submit_once(profile, credentials, sender, &init_code).await };
        let (hash, nonce) = attempt
            .retry(
                ExponentialBuilder::default()
                    .with_min_delay(SUBMIT_BACKOFF)
                    .with_max_times(MAX_SUBMIT_RETRIES),
            )
            .when(DeployError::is_transient_submission)
            .notify(|err, after| {
                tracing::warn!(
                    error = %err,
                    retry_in = ?after,
                    "Transient submission failure; retrying with a fresh nonce"
                );
            })
            .await?;

        tracing::info!(tx_hash = %hash, nonce, "Creation transaction accepted by the node");

        Ok(TransactionHandle {
            hash,
            sender,
            nonce,
            encoded_args,
            submitted_at: Utc::now(),
        })
    }

    /// One submission attempt: fresh nonce and gas reads, then one
    /// broadcast. Signing is synchronous and atomic: the transaction is
    /// either fully signed and handed to the node, or not submitted at
    /// all.
    async fn submit_once(
        &self,
        profile: &NetworkProfile,
        credentials: &Credentials,
        sender: Address,
        init_code: &Bytes,
    ) -> Result<(B256, u64), DeployError> {
        let nonce = self.chain.nonce(sender).await?;
        let gas_limit = self.chain.estimate_gas(sender, init_code).await?;
        let (max_fee_per_gas, max_priority_fee_per_gas) = match profile.gas {
            GasStrategy::Auto => {
                let fees = self.chain.fees().await?;
                (fees.max_fee_per_gas, fees.max_priority_fee_per_gas)
            }
            GasStrategy::Fixed { gwei } => {
                let price = gwei as u128 * 1_000_000_000;
                (price, price)
            }
        };

        let tx = TxEip1559 {
            chain_id: profile.chain_id,
            nonce,
            gas_limit,
            max_fee_per_gas,
            max_priority_fee_per_gas,
            to: TxKind::Create,
            value: U256::ZERO,
            access_list: Default::default(),
            input: init_code.clone(),
        };

        let signature = credentials
            .signer()
            .sign_hash_sync(&tx.signature_hash())
            .map_err(|e| DeployError::Submission {
                kind: SubmissionKind::Fatal,
                message: format!("signing failed: {e}"),
            })?;
        let envelope = TxEnvelope::Eip1559(tx.into_signed(signature));

        let hash = self
            .chain
            .send_raw_transaction(envelope.encoded_2718().into())
            .await?;
        Ok((hash, nonce))
    }
}

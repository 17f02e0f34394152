//! Chain client abstraction.
//!
//! The pipeline talks to a node through the [`ChainClient`] capability
//! set rather than a concrete transport. Live networks use the JSON-RPC
//! implementation; the dev network and the test suite use the
//! deterministic in-memory chain. Clients never retry internally;
//! retry policy belongs to the executor.

mod http;
mod sim;

pub use http::HttpChainClient;
pub use sim::{DEFAULT_DEV_BALANCE, DevChain};

use alloy_primitives::{Address, B256, Bytes, U256};
use async_trait::async_trait;

use crate::error::DeployError;

/// Gas pricing snapshot used to fill the creation transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeEstimate {
    /// Legacy gas price, in wei.
    pub gas_price: u128,
    /// EIP-1559 fee cap, in wei.
    pub max_fee_per_gas: u128,
    /// EIP-1559 priority fee, in wei.
    pub max_priority_fee_per_gas: u128,
}

/// A mined transaction receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: B256,
    pub block_number: u64,
    pub success: bool,
    pub contract_address: Option<Address>,
}

/// Capability set over a JSON-RPC-speaking node.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// The node's chain ID (`eth_chainId`).
    async fn chain_id(&self) -> Result<u64, DeployError>;

    /// Native balance of an address, in wei (`eth_getBalance`).
    async fn balance(&self, address: Address) -> Result<U256, DeployError>;

    /// Next valid nonce for an address (`eth_getTransactionCount`).
    async fn nonce(&self, address: Address) -> Result<u64, DeployError>;

    /// Gas units for a creation transaction (`eth_estimateGas`).
    async fn estimate_gas(&self, from: Address, init_code: &Bytes) -> Result<u64, DeployError>;

    /// Current gas pricing (`eth_gasPrice` / `eth_maxPriorityFeePerGas`).
    async fn fees(&self) -> Result<FeeEstimate, DeployError>;

    /// Broadcast a signed payload (`eth_sendRawTransaction`).
    ///
    /// Returns the transaction hash only once the node has accepted the
    /// transaction. Node rejections surface as
    /// [`DeployError::Submission`] with the retry classification applied.
    async fn send_raw_transaction(&self, raw: Bytes) -> Result<B256, DeployError>;

    /// Receipt for a transaction, `None` while unmined
    /// (`eth_getTransactionReceipt`).
    async fn receipt(&self, hash: B256) -> Result<Option<Receipt>, DeployError>;

    /// Latest block number (`eth_blockNumber`).
    async fn block_number(&self) -> Result<u64, DeployError>;
}

//! JSON-RPC chain client for live networks.

use std::time::Duration;

use alloy_primitives::{Address, B256, Bytes, U256, hex};
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use super::{ChainClient, FeeEstimate, Receipt};
use crate::error::{DeployError, classify_rejection};

/// Timeout for a single RPC request.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Priority fee fallback for nodes without `eth_maxPriorityFeePerGas`.
const FALLBACK_PRIORITY_FEE: u128 = 1_000_000_000; // 1 gwei

/// Where an RPC call failed.
enum RpcFailure {
    /// The node answered with an error object.
    Node(String),
    /// The request never produced a usable response.
    Transport(String),
}

/// Chain client speaking JSON-RPC over HTTP.
pub struct HttpChainClient {
    client: reqwest::Client,
    url: Url,
}

impl HttpChainClient {
    pub fn new(url: Url) -> Result<Self, DeployError> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| DeployError::Rpc(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client, url })
    }

    /// Make a JSON-RPC call and deserialize the result.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, RpcFailure> {
        let response = self
            .client
            .post(self.url.clone())
            .json(&serde_json::json!({
                "jsonrpc": "2.0",
                "method": method,
                "params": params,
                "id": 1
            }))
            .send()
            .await
            .map_err(|e| RpcFailure::Transport(format!("failed to send {method} request: {e}")))?;

        let result: Value = response
            .json()
            .await
            .map_err(|e| RpcFailure::Transport(format!("failed to parse {method} response: {e}")))?;

        if let Some(error) = result.get("error") {
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown")
                .to_string();
            return Err(RpcFailure::Node(message));
        }

        let result_value = result
            .get("result")
            .ok_or_else(|| RpcFailure::Transport(format!("no result in {method} response")))?
            .clone();

        serde_json::from_value(result_value)
            .map_err(|e| RpcFailure::Transport(format!("failed to deserialize {method} result: {e}")))
    }

    /// Read calls treat node errors and transport faults alike.
    async fn read<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, DeployError> {
        self.call(method, params).await.map_err(|e| match e {
            RpcFailure::Node(msg) => DeployError::Rpc(format!("{method}: {msg}")),
            RpcFailure::Transport(msg) => DeployError::Rpc(msg),
        })
    }
}

/// Parse a `0x`-prefixed hex quantity.
fn parse_quantity_u64(raw: &str) -> Result<u64, DeployError> {
    u64::from_str_radix(raw.trim_start_matches("0x"), 16)
        .map_err(|e| DeployError::Rpc(format!("invalid hex quantity '{raw}': {e}")))
}

fn parse_quantity_u128(raw: &str) -> Result<u128, DeployError> {
    u128::from_str_radix(raw.trim_start_matches("0x"), 16)
        .map_err(|e| DeployError::Rpc(format!("invalid hex quantity '{raw}': {e}")))
}

fn parse_quantity_u256(raw: &str) -> Result<U256, DeployError> {
    U256::from_str_radix(raw.trim_start_matches("0x"), 16)
        .map_err(|e| DeployError::Rpc(format!("invalid hex quantity '{raw}': {e}")))
}

/// Receipt shape returned by `eth_getTransactionReceipt`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: B256,
    block_number: Option<String>,
    status: Option<String>,
    contract_address: Option<Address>,
}

#[async_trait]
impl ChainClient for HttpChainClient {
    async fn chain_id(&self) -> Result<u64, DeployError> {
        let raw: String = self.read("eth_chainId", vec![]).await?;
        parse_quantity_u64(&raw)
    }

    async fn balance(&self, address: Address) -> Result<U256, DeployError> {
        let raw: String = self
            .read(
                "eth_getBalance",
                vec![serde_json::json!(address), serde_json::json!("latest")],
            )
            .await?;
        parse_quantity_u256(&raw)
    }

    async fn nonce(&self, address: Address) -> Result<u64, DeployError> {
        let raw: String = self
            .read(
                "eth_getTransactionCount",
                vec![serde_json::json!(address), serde_json::json!("pending")],
            )
            .await?;
        parse_quantity_u64(&raw)
    }

    async fn estimate_gas(&self, from: Address, init_code: &Bytes) -> Result<u64, DeployError> {
        let raw: String = self
            .read(
                "eth_estimateGas",
                vec![serde_json::json!({
                    "from": from,
                    "data": init_code,
                })],
            )
            .await?;
        parse_quantity_u64(&raw)
    }

    async fn fees(&self) -> Result<FeeEstimate, DeployError> {
        let raw: String = self.read("eth_gasPrice", vec![]).await?;
        let gas_price = parse_quantity_u128(&raw)?;

        // Older nodes do not expose eth_maxPriorityFeePerGas.
        let priority = match self.call::<String>("eth_maxPriorityFeePerGas", vec![]).await {
            Ok(raw) => parse_quantity_u128(&raw)?,
            Err(_) => FALLBACK_PRIORITY_FEE,
        };

        // Double the observed price as headroom for base-fee drift between
        // estimation and inclusion.
        let max_fee_per_gas = gas_price.saturating_mul(2);
        Ok(FeeEstimate {
            gas_price,
            max_fee_per_gas,
            max_priority_fee_per_gas: priority.min(max_fee_per_gas),
        })
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<B256, DeployError> {
        let payload = format!("0x{}", hex::encode(&raw));
        let hash: B256 = self
            .call("eth_sendRawTransaction", vec![serde_json::json!(payload)])
            .await
            .map_err(|e| match e {
                RpcFailure::Node(message) => DeployError::Submission {
                    kind: classify_rejection(&message),
                    message,
                },
                RpcFailure::Transport(msg) => DeployError::Rpc(msg),
            })?;
        Ok(hash)
    }

    async fn receipt(&self, hash: B256) -> Result<Option<Receipt>, DeployError> {
        let receipt: Option<RpcReceipt> = self
            .read(
                "eth_getTransactionReceipt",
                vec![serde_json::json!(hash)],
            )
            .await?;

        let Some(receipt) = receipt else {
            return Ok(None);
        };
        // A receipt without a block number is still pending.
        let Some(block_raw) = receipt.block_number.as_deref() else {
            return Ok(None);
        };

        let success = match receipt.status.as_deref() {
            Some(status) => parse_quantity_u64(status)? == 1,
            // Pre-Byzantium receipts carry no status; assume success and
            // let the explorer surface anything odd.
            None => true,
        };

        Ok(Some(Receipt {
            tx_hash: receipt.transaction_hash,
            block_number: parse_quantity_u64(block_raw)?,
            success,
            contract_address: receipt.contract_address,
        }))
    }

    async fn block_number(&self) -> Result<u64, DeployError> {
        let raw: String = self.read("eth_blockNumber", vec![]).await?;
        parse_quantity_u64(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quantities() {
        assert_eq!(parse_quantity_u64("0x0").unwrap(), 0);
        assert_eq!(parse_quantity_u64("0x10").unwrap(), 16);
        assert_eq!(parse_quantity_u128("0x3b9aca00").unwrap(), 1_000_000_000);
        assert_eq!(
            parse_quantity_u256("0xde0b6b3a7640000").unwrap(),
            U256::from(1_000_000_000_000_000_000u128)
        );
        assert!(parse_quantity_u64("0xzz").is_err());
    }

    #[test]
    fn test_receipt_deserialization() {
        let raw = r#"{
            "transactionHash": "0x1111111111111111111111111111111111111111111111111111111111111111",
            "blockNumber": "0x10",
            "status": "0x1",
            "contractAddress": "0x2271f2f502efe6852a9375bebc7a8873c1b062aa"
        }"#;
        let receipt: RpcReceipt = serde_json::from_str(raw).unwrap();
        assert_eq!(receipt.block_number.as_deref(), Some("0x10"));
        assert_eq!(receipt.status.as_deref(), Some("0x1"));
        assert!(receipt.contract_address.is_some());
    }

    #[test]
    fn test_pending_receipt_has_no_block() {
        let raw = r#"{
            "transactionHash": "0x1111111111111111111111111111111111111111111111111111111111111111",
            "blockNumber": null,
            "status": null,
            "contractAddress": null
        }"#;
        let receipt: RpcReceipt = serde_json::from_str(raw).unwrap();
        assert!(receipt.block_number.is_none());
    }
}

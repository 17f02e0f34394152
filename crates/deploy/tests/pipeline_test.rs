//! End-to-end pipeline tests against the in-memory chain.
//!
//! Each test assembles a full `Deployer` with a `DevChain` and a mock
//! explorer, runs the pipeline, and checks the report. No network access
//! is required; every run is deterministic.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy_json_abi::JsonAbi;
use alloy_primitives::{Bytes, U256};
use async_trait::async_trait;
use url::Url;

use kiln_deploy::{
    ContractArtifact, Credentials, DeployError, Deployer, DevChain, Explorer, GasStrategy,
    NetworkId, NetworkProfile, Secrets, SourceMetadata, VerificationOutcome, VerificationRequest,
    VerificationStatus,
};

const TEST_PRIVATE_KEY: &str =
    "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

const COLLECTION: &str = "0x20b7287a72c68602a6b9e3b7f0d8ac0e1b02d2b4";
const VALIDATOR: &str = "0xf859e9f0dc674d5a02616006ce9bdfdedd1a8876";
const TOKEN: &str = "0xdac17f958d2ee523a2206206994597c13d831ec7";

const POLL: Duration = Duration::from_millis(10);
const ONE_ETH: u128 = 1_000_000_000_000_000_000;

/// What the mock explorer should answer with.
enum MockResponse {
    Verified,
    AlreadyVerified,
    Malformed,
}

/// Explorer double that records every request it receives.
struct MockExplorer {
    calls: AtomicU64,
    last_request: Mutex<Option<VerificationRequest>>,
    response: MockResponse,
}

impl MockExplorer {
    fn new(response: MockResponse) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU64::new(0),
            last_request: Mutex::new(None),
            response,
        })
    }

    fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Explorer for MockExplorer {
    async fn verify_contract(
        &self,
        request: &VerificationRequest,
    ) -> Result<VerificationStatus, DeployError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        match self.response {
            MockResponse::Verified => Ok(VerificationStatus::Verified),
            MockResponse::AlreadyVerified => Ok(VerificationStatus::AlreadyVerified),
            MockResponse::Malformed => Err(DeployError::Verification(
                "Unable to verify: invalid constructor arguments".to_string(),
            )),
        }
    }
}

fn test_credentials() -> Credentials {
    Credentials::resolve(&Secrets {
        private_key: Some(TEST_PRIVATE_KEY.to_string()),
        ..Secrets::default()
    })
    .unwrap()
}

/// A network profile pointing at the in-memory chain with a fast poll.
fn test_profile(id: NetworkId) -> NetworkProfile {
    NetworkProfile {
        chain_id: id.default_chain_id(),
        id,
        rpc_url: Url::parse("http://127.0.0.1:8545/").unwrap(),
        gas: GasStrategy::Auto,
        explorer: None,
        poll_interval: POLL,
    }
}

/// The staking artifact shape: three address constructor arguments.
fn staking_artifact() -> ContractArtifact {
    let abi: JsonAbi = serde_json::from_str(
        r#"[{
            "type": "constructor",
            "stateMutability": "nonpayable",
            "inputs": [
                {"name": "collection", "type": "address", "internalType": "address"},
                {"name": "validator", "type": "address", "internalType": "address"},
                {"name": "token", "type": "address", "internalType": "address"}
            ]
        }]"#,
    )
    .unwrap();

    let constructor_args = [COLLECTION, VALIDATOR, TOKEN]
        .iter()
        .map(|addr| {
            alloy_dyn_abi::DynSolValue::Address(addr.parse().unwrap())
        })
        .collect();

    ContractArtifact {
        name: "staking".to_string(),
        bytecode: Bytes::from_static(&[0x60, 0x80, 0x60, 0x40, 0x52]),
        abi,
        constructor_args,
        source: SourceMetadata {
            contract: "contracts/StakingNFT.sol:StakingNFT".to_string(),
            compiler_version: Some("v0.8.20+commit.a1b79de6".to_string()),
            standard_json: Some(serde_json::json!({"language": "Solidity"})),
        },
    }
}

fn deployer_on(
    chain: Arc<DevChain>,
    profile: NetworkProfile,
    explorer: Option<Arc<MockExplorer>>,
    confirmations: u64,
    timeout: Duration,
) -> Deployer {
    Deployer::new(
        profile,
        test_credentials(),
        staking_artifact(),
        chain,
        explorer.map(|e| e as Arc<dyn Explorer>),
        confirmations,
        timeout,
    )
}

#[tokio::test]
async fn test_sepolia_deployment_succeeds_and_verifies() {
    let profile = test_profile(NetworkId::Sepolia);
    let chain = Arc::new(DevChain::new(profile.chain_id));
    let credentials = test_credentials();
    chain.fund(credentials.address(), U256::from(ONE_ETH));
    let explorer = MockExplorer::new(MockResponse::Verified);

    let report = deployer_on(
        chain.clone(),
        profile,
        Some(explorer.clone()),
        5,
        Duration::from_secs(5),
    )
    .deploy()
    .await;

    assert!(report.is_success(), "report: {report}");
    assert!(report.contract_address.is_some());
    assert_eq!(report.confirmations, 5);
    assert_eq!(report.verification, VerificationOutcome::Verified);
    assert_eq!(report.balance, Some(U256::from(ONE_ETH)));
    assert_eq!(chain.broadcast_attempts(), 1);

    // The explorer got the arguments actually submitted on-chain:
    // three ABI-encoded address words.
    assert_eq!(explorer.calls(), 1);
    let request = explorer.last_request.lock().unwrap().clone().unwrap();
    assert_eq!(request.chain_id, 11155111);
    assert_eq!(request.encoded_args.len(), 96);
    assert_eq!(request.address, report.contract_address.unwrap());
}

#[tokio::test]
async fn test_zero_balance_submits_nothing() {
    let profile = test_profile(NetworkId::Sepolia);
    let chain = Arc::new(DevChain::new(profile.chain_id));
    let explorer = MockExplorer::new(MockResponse::Verified);

    let report = deployer_on(
        chain.clone(),
        profile,
        Some(explorer.clone()),
        5,
        Duration::from_secs(5),
    )
    .deploy()
    .await;

    assert!(!report.is_success());
    assert!(report.tx_hash.is_none());
    assert_eq!(chain.broadcast_attempts(), 0);
    assert_eq!(explorer.calls(), 0);
    assert!(report.errors[0].message.contains("insufficient funds"));
}

#[tokio::test]
async fn test_dev_network_skips_verification() {
    let profile = test_profile(NetworkId::Hardhat);
    let chain = Arc::new(DevChain::new(profile.chain_id));
    let credentials = test_credentials();
    chain.fund(credentials.address(), U256::from(ONE_ETH));
    let explorer = MockExplorer::new(MockResponse::Verified);

    let report = deployer_on(
        chain,
        profile,
        Some(explorer.clone()),
        5,
        Duration::from_secs(5),
    )
    .deploy()
    .await;

    assert!(report.is_success(), "report: {report}");
    assert_eq!(report.verification, VerificationOutcome::Skipped);
    // No explorer call is ever made on the dev network.
    assert_eq!(explorer.calls(), 0);
}

#[tokio::test]
async fn test_already_verified_counts_as_success() {
    let profile = test_profile(NetworkId::Sepolia);
    let chain = Arc::new(DevChain::new(profile.chain_id));
    let credentials = test_credentials();
    chain.fund(credentials.address(), U256::from(ONE_ETH));
    let explorer = MockExplorer::new(MockResponse::AlreadyVerified);

    let report = deployer_on(chain, profile, Some(explorer), 5, Duration::from_secs(5))
        .deploy()
        .await;

    assert!(report.is_success(), "report: {report}");
    assert_eq!(report.verification, VerificationOutcome::Verified);
}

#[tokio::test]
async fn test_verification_failure_does_not_fail_deployment() {
    let profile = test_profile(NetworkId::Sepolia);
    let chain = Arc::new(DevChain::new(profile.chain_id));
    let credentials = test_credentials();
    chain.fund(credentials.address(), U256::from(ONE_ETH));
    let explorer = MockExplorer::new(MockResponse::Malformed);

    let report = deployer_on(chain, profile, Some(explorer), 5, Duration::from_secs(5))
        .deploy()
        .await;

    // The contract is live; the failed verification is a warning.
    assert!(report.is_success(), "report: {report}");
    assert!(report.contract_address.is_some());
    assert_eq!(report.verification, VerificationOutcome::Failed);
    assert!(report.errors.iter().any(|e| !e.fatal));
}

#[tokio::test]
async fn test_confirmation_timeout_keeps_hash_in_report() {
    let profile = test_profile(NetworkId::Sepolia);
    let chain = Arc::new(DevChain::new(profile.chain_id));
    let credentials = test_credentials();
    chain.fund(credentials.address(), U256::from(ONE_ETH));
    chain.halt_mining();

    // Timeout after a single poll interval, receipt never arrives.
    let report = deployer_on(chain, profile, None, 5, POLL).deploy().await;

    assert!(!report.is_success());
    assert!(report.tx_hash.is_some());
    assert_eq!(report.contract_address, None);
    assert!(report.errors[0].message.contains("timed out"));
    // The rendered report carries the hash for manual follow-up.
    let rendered = report.to_string();
    assert!(rendered.contains(&report.tx_hash.unwrap().to_string()));
}

#[tokio::test]
async fn test_reverted_constructor_is_fatal() {
    let profile = test_profile(NetworkId::Sepolia);
    let chain = Arc::new(DevChain::new(profile.chain_id));
    let credentials = test_credentials();
    chain.fund(credentials.address(), U256::from(ONE_ETH));
    chain.revert_next_deployment();

    let report = deployer_on(chain, profile, None, 5, Duration::from_secs(5))
        .deploy()
        .await;

    assert!(!report.is_success());
    assert!(report.tx_hash.is_some());
    assert!(report.errors[0].message.contains("reverted"));
}

#[tokio::test]
async fn test_chain_id_mismatch_aborts_before_submission() {
    let profile = test_profile(NetworkId::Sepolia);
    // Node answers with the wrong chain.
    let chain = Arc::new(DevChain::new(1));
    let credentials = test_credentials();
    chain.fund(credentials.address(), U256::from(ONE_ETH));

    let report = deployer_on(chain.clone(), profile, None, 5, Duration::from_secs(5))
        .deploy()
        .await;

    assert!(!report.is_success());
    assert_eq!(chain.broadcast_attempts(), 0);
    assert!(report.errors[0].message.contains("chain"));
}

#[test]
fn test_missing_signing_key_fails_before_any_chain_call() {
    let err = Credentials::resolve(&Secrets::default()).unwrap_err();
    assert!(matches!(err, DeployError::Config(_)));
    assert!(err.to_string().contains("missing signing key"));
    // Resolution happens before a chain client even exists, so a
    // misconfigured run can never reach the network.
}

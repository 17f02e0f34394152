//! kiln-deploy - Contract deployment orchestration.
//!
//! This crate provides the deployment pipeline behind the `kiln` CLI:
//! resolve a network profile and signing credentials, submit a
//! contract-creation transaction, wait for a configurable confirmation
//! depth, and verify the source on a block explorer.

mod artifact;
mod chain;
mod config;
mod confirm;
mod credentials;
mod deployer;
mod error;
mod executor;
mod network;
mod report;
mod verify;

pub use artifact::{ContractArtifact, SourceMetadata};
pub use chain::{
    ChainClient, DEFAULT_DEV_BALANCE, DevChain, FeeEstimate, HttpChainClient, Receipt,
};
pub use config::{
    ContractConfig, DEFAULT_CONFIRMATIONS, DEFAULT_TIMEOUT_SECS, KILN_CONFIG_FILENAME, KilnConfig,
    NetworkOverride, Secrets,
};
pub use confirm::{Confirmation, ConfirmationWaiter};
pub use credentials::Credentials;
pub use deployer::Deployer;
pub use error::{DeployError, SubmissionKind};
pub use executor::{DeploymentExecutor, TransactionHandle};
pub use network::{ExplorerProfile, GasStrategy, NetworkId, NetworkProfile};
pub use report::{DeploymentReport, ErrorRecord, Stage, VerificationOutcome, format_eth};
pub use verify::{EtherscanClient, Explorer, VerificationRequest, VerificationStatus};

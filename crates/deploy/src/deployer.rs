//! Deployment pipeline orchestration.
//!
//! One `Deployer` runs one deployment: pre-flight checks, submission,
//! confirmation wait, and verification, in that order. Every stage feeds
//! the report; a fatal stage error ends the run but the report still
//! carries everything obtained up to that point.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::U256;

use crate::artifact::ContractArtifact;
use crate::chain::{ChainClient, DEFAULT_DEV_BALANCE, DevChain, HttpChainClient};
use crate::config::KilnConfig;
use crate::confirm::ConfirmationWaiter;
use crate::credentials::Credentials;
use crate::error::DeployError;
use crate::executor::DeploymentExecutor;
use crate::network::NetworkProfile;
use crate::report::{DeploymentReport, Stage, VerificationOutcome, format_eth};
use crate::verify::{EtherscanClient, Explorer, VerificationRequest};

/// Orchestrates one contract deployment.
pub struct Deployer {
    profile: NetworkProfile,
    credentials: Credentials,
    artifact: ContractArtifact,
    chain: Arc<dyn ChainClient>,
    explorer: Option<Arc<dyn Explorer>>,
    confirmations: u64,
    timeout: Duration,
}

impl Deployer {
    /// Assemble a deployer with explicit collaborators.
    pub fn new(
        profile: NetworkProfile,
        credentials: Credentials,
        artifact: ContractArtifact,
        chain: Arc<dyn ChainClient>,
        explorer: Option<Arc<dyn Explorer>>,
        confirmations: u64,
        timeout: Duration,
    ) -> Self {
        Self {
            profile,
            credentials,
            artifact,
            chain,
            explorer,
            confirmations,
            timeout,
        }
    }

    /// Assemble a deployer with the standard collaborators for the
    /// resolved network: the in-memory chain (with a funded sender) for
    /// the dev network, JSON-RPC and the explorer client otherwise.
    pub fn for_network(
        profile: NetworkProfile,
        credentials: Credentials,
        artifact: ContractArtifact,
        config: &KilnConfig,
    ) -> Result<Self, DeployError> {
        let chain: Arc<dyn ChainClient> = if profile.id.is_dev() {
            let dev = DevChain::new(profile.chain_id);
            dev.fund(credentials.address(), U256::from(DEFAULT_DEV_BALANCE));
            Arc::new(dev)
        } else {
            Arc::new(HttpChainClient::new(profile.rpc_url.clone())?)
        };

        let explorer = match profile.explorer.as_ref() {
            Some(explorer_profile) => {
                Some(Arc::new(EtherscanClient::new(explorer_profile)?) as Arc<dyn Explorer>)
            }
            None => None,
        };

        Ok(Self::new(
            profile,
            credentials,
            artifact,
            chain,
            explorer,
            config.confirmations,
            Duration::from_secs(config.timeout_secs),
        ))
    }

    /// Run the pipeline to completion and return the report.
    pub async fn deploy(self) -> DeploymentReport {
        let sender = self.credentials.address();
        let mut report = DeploymentReport::new(
            &self.artifact.name,
            &self.profile.id.to_string(),
            self.profile.chain_id,
            sender,
        );

        tracing::info!(
            network = %self.profile.id,
            chain_id = self.profile.chain_id,
            contract = %self.artifact.name,
            sender = %sender,
            "Starting deployment..."
        );

        // Connectivity probe doubling as a wrong-endpoint guard.
        match self.chain.chain_id().await {
            Ok(chain_id) if chain_id == self.profile.chain_id => {}
            Ok(chain_id) => {
                report.record_fatal(
                    Stage::Preflight,
                    &DeployError::Config(format!(
                        "RPC endpoint reports chain {chain_id} but network '{}' expects {}",
                        self.profile.id, self.profile.chain_id
                    )),
                );
                return report;
            }
            Err(error) => {
                report.record_fatal(Stage::Preflight, &error);
                return report;
            }
        }

        let executor = DeploymentExecutor::new(self.chain.clone());

        match executor.check_funds(sender).await {
            Ok(balance) => {
                tracing::info!(balance_eth = %format_eth(balance), "Sender balance");
                report.balance = Some(balance);
            }
            Err(error) => {
                report.record_fatal(Stage::Preflight, &error);
                return report;
            }
        }

        let handle = match executor
            .submit(&self.profile, &self.credentials, &self.artifact)
            .await
        {
            Ok(handle) => {
                report.tx_hash = Some(handle.hash);
                report.submitted_at = Some(handle.submitted_at);
                handle
            }
            Err(error) => {
                report.record_fatal(Stage::Submit, &error);
                return report;
            }
        };

        let waiter = ConfirmationWaiter::new(
            self.chain.clone(),
            self.confirmations,
            self.profile.poll_interval,
            self.timeout,
        );
        let confirmation = match waiter.wait(handle.hash).await {
            Ok(confirmation) => confirmation,
            Err(error) => {
                report.record_fatal(Stage::Confirm, &error);
                return report;
            }
        };
        report.confirmations = confirmation.confirmations;

        let address = match confirmation.receipt.contract_address {
            Some(address) => address,
            None => {
                // Some nodes omit the field; the address is a pure
                // function of sender and nonce.
                let derived = sender.create(handle.nonce);
                report.record_warning(
                    Stage::Confirm,
                    format!("receipt carried no contract address; derived {derived}"),
                );
                derived
            }
        };
        report.contract_address = Some(address);
        tracing::info!(
            contract = %self.artifact.name,
            address = %address,
            confirmations = confirmation.confirmations,
            "Contract deployed"
        );

        // No explorer exists on the dev network; nothing to call.
        if self.profile.id.is_dev() {
            tracing::info!("Dev network; skipping source verification");
            report.verification = VerificationOutcome::Skipped;
            return report;
        }
        let Some(explorer) = self.explorer.as_ref() else {
            tracing::info!("No explorer configured; skipping source verification");
            report.verification = VerificationOutcome::Skipped;
            return report;
        };

        let request = VerificationRequest {
            address,
            chain_id: self.profile.chain_id,
            encoded_args: handle.encoded_args.clone(),
            source: self.artifact.source.clone(),
        };
        match explorer.verify_contract(&request).await {
            Ok(status) => {
                tracing::info!(status = ?status, "Source verification complete");
                report.verification = VerificationOutcome::Verified;
            }
            Err(error) => {
                report.verification = VerificationOutcome::Failed;
                report.record_warning(Stage::Verify, error.to_string());
            }
        }

        report
    }
}

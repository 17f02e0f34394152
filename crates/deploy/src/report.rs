//! Deployment reporting.
//!
//! The report aggregates what every stage achieved and is emitted even
//! when a stage failed, so an operator is never left without the
//! transaction hash needed to reconcile on-chain state.

use std::fmt;

use alloy_primitives::{Address, B256, U256};
use chrono::{DateTime, Utc};

use crate::error::DeployError;

/// Pipeline stage an error record is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Stage {
    Preflight,
    Submit,
    Confirm,
    Verify,
}

/// One error or warning observed during the run.
#[derive(Debug, Clone)]
pub struct ErrorRecord {
    pub stage: Stage,
    pub message: String,
    /// Fatal records fail the run; warnings do not.
    pub fatal: bool,
}

/// Outcome of the verification stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// Source verified (or already verified) on the explorer.
    Verified,
    /// No explorer on this network, or verification disabled.
    Skipped,
    /// Verification failed; the contract is live regardless.
    Failed,
    /// The pipeline did not reach the verification stage.
    NotAttempted,
}

impl fmt::Display for VerificationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationOutcome::Verified => write!(f, "verified"),
            VerificationOutcome::Skipped => write!(f, "skipped"),
            VerificationOutcome::Failed => write!(f, "FAILED (contract is live regardless)"),
            VerificationOutcome::NotAttempted => write!(f, "not attempted"),
        }
    }
}

/// Terminal, immutable summary of one deployment run.
#[derive(Debug)]
pub struct DeploymentReport {
    pub contract: String,
    pub network: String,
    pub chain_id: u64,
    pub sender: Address,
    pub balance: Option<U256>,
    pub tx_hash: Option<B256>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub contract_address: Option<Address>,
    pub confirmations: u64,
    pub verification: VerificationOutcome,
    pub errors: Vec<ErrorRecord>,
}

impl DeploymentReport {
    pub fn new(contract: &str, network: &str, chain_id: u64, sender: Address) -> Self {
        Self {
            contract: contract.to_string(),
            network: network.to_string(),
            chain_id,
            sender,
            balance: None,
            tx_hash: None,
            submitted_at: None,
            contract_address: None,
            confirmations: 0,
            verification: VerificationOutcome::NotAttempted,
            errors: Vec::new(),
        }
    }

    /// Record a run-ending error.
    pub fn record_fatal(&mut self, stage: Stage, error: &DeployError) {
        tracing::error!(stage = %stage, error = %error, "Deployment stage failed");
        self.errors.push(ErrorRecord {
            stage,
            message: error.to_string(),
            fatal: true,
        });
    }

    /// Record a non-fatal warning.
    pub fn record_warning(&mut self, stage: Stage, message: String) {
        tracing::warn!(stage = %stage, message = %message, "Deployment warning");
        self.errors.push(ErrorRecord {
            stage,
            message,
            fatal: false,
        });
    }

    /// Whether the run completed without a fatal error.
    pub fn is_success(&self) -> bool {
        !self.errors.iter().any(|e| e.fatal)
    }
}

/// Format a wei amount as a decimal ETH string.
pub fn format_eth(wei: U256) -> String {
    let divisor = U256::from(10u64).pow(U256::from(18));
    let whole = wei / divisor;
    let frac = wei % divisor;
    if frac.is_zero() {
        return whole.to_string();
    }
    // The remainder occupies 18 decimal places.
    let frac = format!("{:0>18}", frac.to_string());
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}

impl fmt::Display for DeploymentReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.is_success() { "SUCCESS" } else { "FAILED" };
        writeln!(f, "Deployment Report: {}", status)?;
        writeln!(f)?;
        writeln!(
            f,
            "=== {} on {} (chain {}) ===",
            self.contract, self.network, self.chain_id
        )?;
        writeln!(f, "  sender:        {}", self.sender)?;

        if let Some(balance) = self.balance {
            writeln!(f, "  balance:       {} ETH", format_eth(balance))?;
        }
        if let Some(hash) = self.tx_hash {
            write!(f, "  tx hash:       {}", hash)?;
            if let Some(at) = self.submitted_at {
                write!(f, " (submitted {})", at.format("%Y-%m-%d %H:%M:%S UTC"))?;
            }
            writeln!(f)?;
        }
        if let Some(address) = self.contract_address {
            writeln!(f, "  contract:      {}", address)?;
        }
        writeln!(f, "  confirmations: {}", self.confirmations)?;
        writeln!(f, "  verification:  {}", self.verification)?;

        if !self.errors.is_empty() {
            writeln!(f)?;
            writeln!(f, "=== Errors ===")?;
            for record in &self.errors {
                let severity = if record.fatal { "error" } else { "warning" };
                writeln!(f, "  [{}] {}: {}", record.stage, severity, record.message)?;
            }
        }

        Ok(())
    }
}

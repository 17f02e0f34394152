//! Deployment configuration file handling.
//!
//! Networks, contracts, and pipeline tuning live in a TOML file
//! (`Kiln.toml` by default). Secrets never do: the signing key and API
//! keys are read from the environment and carried in [`Secrets`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::DeployError;

/// The default name for the kiln configuration file.
pub const KILN_CONFIG_FILENAME: &str = "Kiln.toml";

/// Default confirmation depth before a deployment is considered final.
pub const DEFAULT_CONFIRMATIONS: u64 = 5;

/// Default budget for the confirmation wait, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Top-level deployment configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KilnConfig {
    /// Confirmation depth to wait for before verification.
    pub confirmations: u64,
    /// Budget for the confirmation wait, in seconds.
    pub timeout_secs: u64,
    /// Per-network overrides, keyed by network name.
    pub networks: BTreeMap<String, NetworkOverride>,
    /// Deployable contracts, keyed by command name.
    pub contracts: BTreeMap<String, ContractConfig>,
}

impl Default for KilnConfig {
    fn default() -> Self {
        Self {
            confirmations: DEFAULT_CONFIRMATIONS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            networks: BTreeMap::new(),
            contracts: BTreeMap::new(),
        }
    }
}

/// Optional per-network settings overriding the built-in profiles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkOverride {
    /// Chain ID override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    /// Explicit RPC endpoint. Takes precedence over the provider template.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rpc_url: Option<Url>,
    /// Fixed gas price in gwei. When unset, gas is estimated from the node.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_price_gwei: Option<u64>,
    /// Explorer verification API endpoint override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explorer_url: Option<Url>,
}

/// A deployable contract: where its artifact lives and what its
/// constructor receives.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractConfig {
    /// Path to the compiled artifact JSON (`abi` + `bytecode`).
    pub artifact: PathBuf,
    /// Constructor arguments as strings, coerced against the ABI.
    /// The literal `{sender}` is replaced with the deployer address.
    #[serde(default)]
    pub constructor_args: Vec<String>,
    /// Fully qualified name for verification, e.g.
    /// `contracts/StakingNFT.sol:StakingNFT`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract: Option<String>,
    /// Compiler version for verification, e.g. `v0.8.20+commit.a1b79de6`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compiler_version: Option<String>,
    /// Path to the build-info JSON holding the standard-json compiler
    /// input submitted to the explorer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_info: Option<PathBuf>,
}

impl KilnConfig {
    /// Load the configuration from a TOML file.
    ///
    /// Accepts either a file path or a directory containing
    /// [`KILN_CONFIG_FILENAME`].
    pub fn load_from_file(path: &Path) -> Result<Self, DeployError> {
        if !path.exists() {
            return Err(DeployError::Config(format!(
                "configuration file or directory not found: {}",
                path.display()
            )));
        }

        let config_path = if path.is_dir() {
            path.join(KILN_CONFIG_FILENAME)
        } else {
            path.to_path_buf()
        };

        let content = std::fs::read_to_string(&config_path).map_err(|e| {
            DeployError::Config(format!(
                "failed to read config from {}: {}",
                config_path.display(),
                e
            ))
        })?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| DeployError::Config(format!("failed to parse config file as TOML: {e}")))?;
        tracing::info!(path = %config_path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Look up a contract entry by its command name.
    pub fn contract(&self, name: &str) -> Result<&ContractConfig, DeployError> {
        self.contracts.get(name).ok_or_else(|| {
            DeployError::Config(format!(
                "contract '{name}' is not defined in the configuration file"
            ))
        })
    }
}

/// Secrets resolved from the environment, never from the config file.
///
/// Field-level absence is only an error once a component actually needs
/// the value, so a dev-network run works without any keys set.
#[derive(Clone, Default)]
pub struct Secrets {
    /// Hex-encoded signing key (`PRIVATE_KEY`).
    pub private_key: Option<String>,
    /// RPC provider API key (`INFURA_API_KEY`).
    pub infura_api_key: Option<String>,
    /// Explorer API key (`ETHERSCAN_API_KEY`).
    pub etherscan_api_key: Option<String>,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("infura_api_key", &self.infura_api_key.as_ref().map(|_| "<redacted>"))
            .field("etherscan_api_key", &self.etherscan_api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

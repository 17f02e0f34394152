//! Network profile resolution.
//!
//! Maps a network name to the connection parameters the pipeline needs:
//! chain ID, RPC endpoint, gas strategy, and (for live networks) the
//! explorer verification endpoint. Resolution is side-effect-free and
//! fails fast on missing configuration, before any network call.

use std::time::Duration;

use url::Url;

use crate::config::{KilnConfig, Secrets};
use crate::error::DeployError;

/// Default explorer verification API endpoint (Etherscan v2, multi-chain).
pub const DEFAULT_EXPLORER_API_URL: &str = "https://api.etherscan.io/v2/api";

/// Receipt poll interval on live networks.
const LIVE_POLL_INTERVAL: Duration = Duration::from_secs(7);

/// Receipt poll interval on the in-memory dev chain.
const DEV_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A known network name.
///
/// The chain-ID table matches the project's deployment targets; entries
/// can be overridden per-network in the configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum NetworkId {
    Mainnet,
    Goerli,
    Sepolia,
    Hardhat,
}

impl NetworkId {
    /// The built-in chain ID for this network.
    pub fn default_chain_id(&self) -> u64 {
        match self {
            NetworkId::Mainnet => 1,
            NetworkId::Goerli => 5,
            NetworkId::Sepolia => 11155111,
            NetworkId::Hardhat => 31337,
        }
    }

    /// Whether this is the local/dev network served by the in-memory
    /// chain. No explorer exists there.
    pub fn is_dev(&self) -> bool {
        matches!(self, NetworkId::Hardhat)
    }
}

/// How the creation transaction's gas price is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GasStrategy {
    /// Delegate estimation to the chain client.
    Auto,
    /// Pin both fee caps to a fixed price.
    Fixed { gwei: u64 },
}

/// Explorer verification endpoint plus credentials.
#[derive(Debug, Clone, PartialEq)]
pub struct ExplorerProfile {
    pub api_url: Url,
    pub api_key: String,
}

/// Resolved connection parameters for one network. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkProfile {
    pub id: NetworkId,
    pub chain_id: u64,
    pub rpc_url: Url,
    pub gas: GasStrategy,
    pub explorer: Option<ExplorerProfile>,
    pub poll_interval: Duration,
}

impl NetworkProfile {
    /// Resolve a network name into a full profile.
    ///
    /// Live networks require an RPC endpoint (explicit override or the
    /// Infura template plus `INFURA_API_KEY`) and, when `want_verification`
    /// is set, an explorer API key. The dev network needs neither.
    pub fn resolve(
        id: NetworkId,
        config: &KilnConfig,
        secrets: &Secrets,
        want_verification: bool,
    ) -> Result<Self, DeployError> {
        let overrides = config.networks.get(&id.to_string()).cloned().unwrap_or_default();
        let chain_id = overrides.chain_id.unwrap_or_else(|| id.default_chain_id());

        let rpc_url = match (&overrides.rpc_url, id.is_dev()) {
            (Some(url), _) => url.clone(),
            // Nominal endpoint; the dev network is served in-memory.
            (None, true) => Url::parse("http://127.0.0.1:8545/")
                .expect("static URL is valid"),
            (None, false) => {
                let api_key = secrets.infura_api_key.as_deref().ok_or_else(|| {
                    DeployError::Config(format!(
                        "INFURA_API_KEY is not set and no rpc_url is configured for network '{id}'"
                    ))
                })?;
                let raw = format!("https://{id}.infura.io/v3/{api_key}");
                Url::parse(&raw).map_err(|e| {
                    DeployError::Config(format!("invalid RPC URL for network '{id}': {e}"))
                })?
            }
        };

        let gas = match overrides.gas_price_gwei {
            Some(gwei) => GasStrategy::Fixed { gwei },
            None => GasStrategy::Auto,
        };

        let explorer = if id.is_dev() || !want_verification {
            None
        } else {
            let api_key = secrets.etherscan_api_key.as_deref().ok_or_else(|| {
                DeployError::Config(format!(
                    "ETHERSCAN_API_KEY is not set; required to verify on network '{id}'"
                ))
            })?;
            let api_url = match overrides.explorer_url {
                Some(url) => url,
                None => Url::parse(DEFAULT_EXPLORER_API_URL).expect("static URL is valid"),
            };
            Some(ExplorerProfile {
                api_url,
                api_key: api_key.to_string(),
            })
        };

        let poll_interval = if id.is_dev() {
            DEV_POLL_INTERVAL
        } else {
            LIVE_POLL_INTERVAL
        };

        Ok(Self {
            id,
            chain_id,
            rpc_url,
            gas,
            explorer,
            poll_interval,
        })
    }
}

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use kiln_deploy::{NetworkId, Secrets};
use tracing::level_filters::LevelFilter;

/// The default deployment target when no network is selected.
const DEFAULT_NETWORK: NetworkId = NetworkId::Hardhat;

#[derive(Parser)]
#[command(name = "kiln")]
#[command(
    author,
    version,
    about = "Deploy contracts and verify their source in one command"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, env = "KILN_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Path to the configuration file (or a directory containing
    /// Kiln.toml).
    #[arg(long, alias = "conf", env = "KILN_CONFIG", default_value = "Kiln.toml")]
    pub config: PathBuf,

    /// Secrets, resolved from the environment.
    #[clap(flatten)]
    pub secrets: SecretArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// One subcommand per deployable contract.
#[derive(Subcommand)]
pub enum Command {
    /// Deploy the StakingNFT contract.
    Staking(DeployArgs),
    /// Deploy the Treasury contract.
    Treasury(DeployArgs),
}

impl Command {
    /// The contract key this command deploys, as named in the
    /// configuration file.
    pub fn contract_key(&self) -> &'static str {
        match self {
            Command::Staking(_) => "staking",
            Command::Treasury(_) => "treasury",
        }
    }

    pub fn deploy_args(&self) -> &DeployArgs {
        match self {
            Command::Staking(args) | Command::Treasury(args) => args,
        }
    }
}

/// Options shared by every deploy subcommand.
#[derive(Debug, Clone, Args)]
pub struct DeployArgs {
    /// The target network name.
    #[arg(short, long, env = "KILN_NETWORK", default_value_t = DEFAULT_NETWORK)]
    pub network: NetworkId,

    /// Override the configured confirmation depth.
    #[arg(long, env = "KILN_CONFIRMATIONS")]
    pub confirmations: Option<u64>,

    /// Override the configured confirmation timeout, in seconds.
    #[arg(long, env = "KILN_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Skip explorer verification even on live networks.
    #[arg(long, env = "KILN_SKIP_VERIFY")]
    pub skip_verify: bool,
}

/// Secrets are environment-only; they never appear in Kiln.toml.
#[derive(Clone, Args)]
pub struct SecretArgs {
    /// Hex-encoded deployer private key.
    #[arg(long, env = "PRIVATE_KEY", hide_env_values = true)]
    pub private_key: Option<String>,

    /// Infura project API key for live-network RPC endpoints.
    #[arg(long, env = "INFURA_API_KEY", hide_env_values = true)]
    pub infura_api_key: Option<String>,

    /// Etherscan API key for source verification.
    #[arg(long, env = "ETHERSCAN_API_KEY", hide_env_values = true)]
    pub etherscan_api_key: Option<String>,
}

impl From<SecretArgs> for Secrets {
    fn from(args: SecretArgs) -> Self {
        Secrets {
            private_key: args.private_key,
            infura_api_key: args.infura_api_key,
            etherscan_api_key: args.etherscan_api_key,
        }
    }
}

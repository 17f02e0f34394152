//! kiln is a CLI tool to deploy contracts and verify their source on a
//! block explorer in one command.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;

use cli::Cli;
use kiln_deploy::{
    ContractArtifact, Credentials, Deployer, KilnConfig, NetworkProfile, Secrets,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    let mut config = KilnConfig::load_from_file(&cli.config)
        .context("Failed to load deployment configuration")?;

    let args = cli.command.deploy_args().clone();
    if let Some(confirmations) = args.confirmations {
        config.confirmations = confirmations;
    }
    if let Some(timeout) = args.timeout {
        config.timeout_secs = timeout;
    }

    let secrets: Secrets = cli.secrets.into();

    // Everything below fails fast, before any network call.
    let credentials =
        Credentials::resolve(&secrets).context("Failed to resolve signing credentials")?;
    let profile = NetworkProfile::resolve(args.network, &config, &secrets, !args.skip_verify)
        .context("Failed to resolve network profile")?;

    let contract_key = cli.command.contract_key();
    let contract_config = config.contract(contract_key)?;
    let artifact = ContractArtifact::load(contract_key, contract_config, credentials.address())
        .context("Failed to load contract artifact")?;

    let deployer = Deployer::for_network(profile, credentials, artifact, &config)
        .context("Failed to assemble the deployment pipeline")?;

    // The report is printed whatever happens; Ctrl+C aborts the wait
    // without leaving a half-signed transaction behind.
    let report = tokio::select! {
        report = deployer.deploy() => report,
        _ = tokio::signal::ctrl_c() => {
            anyhow::bail!("Deployment aborted by user");
        }
    };

    println!("{report}");

    if !report.is_success() {
        std::process::exit(1);
    }

    Ok(())
}

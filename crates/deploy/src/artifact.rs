//! Contract artifacts.
//!
//! An artifact is the build step's output consumed by the pipeline:
//! creation bytecode, the ABI used to encode constructor arguments, and
//! the source metadata forwarded to the explorer. Artifacts are loaded
//! once and read-only afterwards.

use std::path::Path;

use alloy_dyn_abi::{DynSolValue, JsonAbiExt, Specifier};
use alloy_json_abi::JsonAbi;
use alloy_primitives::{Address, Bytes, hex};
use serde::Deserialize;

use crate::config::ContractConfig;
use crate::error::DeployError;

/// Placeholder in a constructor-argument string replaced with the
/// deployer address at load time.
const SENDER_PLACEHOLDER: &str = "{sender}";

/// Compiled artifact JSON as emitted by the build step.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArtifactFile {
    contract_name: Option<String>,
    abi: JsonAbi,
    bytecode: String,
}

/// Build-info JSON holding the compiler input for verification.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BuildInfoFile {
    solc_long_version: Option<String>,
    input: serde_json::Value,
}

/// Source metadata forwarded opaquely to the explorer.
#[derive(Debug, Clone)]
pub struct SourceMetadata {
    /// Fully qualified contract name, e.g. `contracts/Foo.sol:Foo`.
    pub contract: String,
    /// Compiler version string, e.g. `v0.8.20+commit.a1b79de6`.
    pub compiler_version: Option<String>,
    /// Standard-json compiler input, when a build-info file is configured.
    pub standard_json: Option<serde_json::Value>,
}

/// A deployable contract artifact.
#[derive(Debug)]
pub struct ContractArtifact {
    /// Display name used in logs and the report.
    pub name: String,
    /// Creation bytecode without constructor arguments.
    pub bytecode: Bytes,
    /// Contract ABI.
    pub abi: JsonAbi,
    /// Parsed constructor arguments, in declaration order.
    pub constructor_args: Vec<DynSolValue>,
    /// Metadata forwarded to the explorer on verification.
    pub source: SourceMetadata,
}

impl ContractArtifact {
    /// Load an artifact from disk and bind its constructor arguments.
    ///
    /// Argument strings come from the configuration file and are coerced
    /// against the ABI constructor's input types; a count or type mismatch
    /// is a configuration error. `sender` replaces the `{sender}`
    /// placeholder, matching deployments that pass the deployer address as
    /// a constructor argument.
    pub fn load(name: &str, config: &ContractConfig, sender: Address) -> Result<Self, DeployError> {
        let raw = std::fs::read_to_string(&config.artifact).map_err(|e| {
            DeployError::Config(format!(
                "failed to read artifact {}: {}",
                config.artifact.display(),
                e
            ))
        })?;
        let file: ArtifactFile = serde_json::from_str(&raw).map_err(|e| {
            DeployError::Config(format!(
                "failed to parse artifact {}: {}",
                config.artifact.display(),
                e
            ))
        })?;

        let bytecode_hex = file.bytecode.trim_start_matches("0x");
        let bytecode: Bytes = hex::decode(bytecode_hex)
            .map_err(|e| DeployError::Config(format!("artifact bytecode is not valid hex: {e}")))?
            .into();
        if bytecode.is_empty() {
            return Err(DeployError::Config(format!(
                "artifact {} has empty bytecode; is it an interface or abstract contract?",
                config.artifact.display()
            )));
        }

        let constructor_args = parse_constructor_args(&file.abi, &config.constructor_args, sender)?;

        let contract = config
            .contract
            .clone()
            .or(file.contract_name.clone())
            .unwrap_or_else(|| name.to_string());

        let (standard_json, build_info_version) = match config.build_info.as_deref() {
            Some(path) => {
                let (input, version) = load_standard_json(path)?;
                (Some(input), version)
            }
            None => (None, None),
        };

        let source = SourceMetadata {
            contract,
            compiler_version: config.compiler_version.clone().or(build_info_version),
            standard_json,
        };

        Ok(Self {
            name: name.to_string(),
            bytecode,
            abi: file.abi,
            constructor_args,
            source,
        })
    }

    /// ABI-encoded constructor arguments, empty when the constructor
    /// takes none.
    pub fn encoded_constructor_args(&self) -> Result<Bytes, DeployError> {
        match self.abi.constructor() {
            Some(constructor) if !self.constructor_args.is_empty() => {
                let encoded = constructor
                    .abi_encode_input(&self.constructor_args)
                    .map_err(|e| {
                        DeployError::Config(format!("failed to encode constructor arguments: {e}"))
                    })?;
                Ok(encoded.into())
            }
            _ => Ok(Bytes::new()),
        }
    }

    /// The creation transaction payload: bytecode followed by the
    /// ABI-encoded constructor arguments.
    pub fn init_code(&self) -> Result<Bytes, DeployError> {
        let encoded = self.encoded_constructor_args()?;
        if encoded.is_empty() {
            return Ok(self.bytecode.clone());
        }
        let mut code = Vec::with_capacity(self.bytecode.len() + encoded.len());
        code.extend_from_slice(&self.bytecode);
        code.extend_from_slice(&encoded);
        Ok(code.into())
    }
}

/// Coerce configured argument strings against the ABI constructor.
fn parse_constructor_args(
    abi: &JsonAbi,
    args: &[String],
    sender: Address,
) -> Result<Vec<DynSolValue>, DeployError> {
    let Some(constructor) = abi.constructor() else {
        if args.is_empty() {
            return Ok(Vec::new());
        }
        return Err(DeployError::Config(format!(
            "{} constructor arguments configured but the ABI declares no constructor",
            args.len()
        )));
    };

    if constructor.inputs.len() != args.len() {
        return Err(DeployError::Config(format!(
            "constructor takes {} arguments but {} were configured",
            constructor.inputs.len(),
            args.len()
        )));
    }

    let mut values = Vec::with_capacity(args.len());
    for (input, arg) in constructor.inputs.iter().zip(args) {
        let arg = if arg == SENDER_PLACEHOLDER {
            format!("{sender:?}")
        } else {
            arg.clone()
        };
        let ty = input.resolve().map_err(|e| {
            DeployError::Config(format!("could not resolve constructor input {}: {e}", input.name))
        })?;
        let value = ty.coerce_str(&arg).map_err(|e| {
            DeployError::Config(format!(
                "constructor argument '{arg}' does not match type {}: {e}",
                input.ty
            ))
        })?;
        values.push(value);
    }
    Ok(values)
}

/// Read the standard-json compiler input (and version) from a build-info
/// file.
fn load_standard_json(path: &Path) -> Result<(serde_json::Value, Option<String>), DeployError> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        DeployError::Config(format!("failed to read build info {}: {}", path.display(), e))
    })?;
    let file: BuildInfoFile = serde_json::from_str(&raw).map_err(|e| {
        DeployError::Config(format!("failed to parse build info {}: {}", path.display(), e))
    })?;
    Ok((file.input, file.solc_long_version))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    const COLLECTION: &str = "0x20b7287a72c68602a6b9e3b7f0d8ac0e1b02d2b4";
    const VALIDATOR: &str = "0xf859e9f0dc674d5a02616006ce9bdfdedd1a8876";
    const TOKEN: &str = "0xdac17f958d2ee523a2206206994597c13d831ec7";

    fn write_artifact(name: &str, json: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("kiln-artifact-{}-{}.json", name, std::process::id()));
        std::fs::write(&path, json).unwrap();
        path
    }

    fn staking_artifact_json() -> String {
        r#"{
            "contractName": "StakingNFT",
            "abi": [
                {
                    "type": "constructor",
                    "stateMutability": "nonpayable",
                    "inputs": [
                        {"name": "collection", "type": "address", "internalType": "address"},
                        {"name": "validator", "type": "address", "internalType": "address"},
                        {"name": "token", "type": "address", "internalType": "address"}
                    ]
                }
            ],
            "bytecode": "0x6080604052"
        }"#
        .to_string()
    }

    fn staking_config(artifact: PathBuf) -> ContractConfig {
        ContractConfig {
            artifact,
            constructor_args: vec![
                COLLECTION.to_string(),
                VALIDATOR.to_string(),
                TOKEN.to_string(),
            ],
            ..ContractConfig::default()
        }
    }

    #[test]
    fn test_load_and_encode_init_code() {
        let path = write_artifact("staking", &staking_artifact_json());
        let config = staking_config(path.clone());
        let artifact = ContractArtifact::load("staking", &config, Address::ZERO).unwrap();
        std::fs::remove_file(path).ok();

        assert_eq!(artifact.source.contract, "StakingNFT");
        assert_eq!(artifact.constructor_args.len(), 3);

        // Three address words appended to the 5-byte creation bytecode.
        let init_code = artifact.init_code().unwrap();
        assert_eq!(init_code.len(), 5 + 3 * 32);
        assert!(init_code.starts_with(&[0x60, 0x80, 0x60, 0x40, 0x52]));

        let encoded = artifact.encoded_constructor_args().unwrap();
        assert_eq!(encoded.len(), 96);
        // Each address is left-padded to 32 bytes.
        assert_eq!(&encoded[12..32], hex::decode(&COLLECTION[2..]).unwrap().as_slice());
    }

    #[test]
    fn test_sender_placeholder_substitution() {
        let path = write_artifact("placeholder", &staking_artifact_json());
        let mut config = staking_config(path.clone());
        config.constructor_args[0] = "{sender}".to_string();

        let sender: Address = VALIDATOR.parse().unwrap();
        let artifact = ContractArtifact::load("staking", &config, sender).unwrap();
        std::fs::remove_file(path).ok();

        let encoded = artifact.encoded_constructor_args().unwrap();
        assert_eq!(&encoded[12..32], sender.as_slice());
    }

    #[test]
    fn test_argument_count_mismatch() {
        let path = write_artifact("mismatch", &staking_artifact_json());
        let mut config = staking_config(path.clone());
        config.constructor_args.pop();

        let err = ContractArtifact::load("staking", &config, Address::ZERO).unwrap_err();
        std::fs::remove_file(path).ok();
        assert!(matches!(err, DeployError::Config(_)));
        assert!(err.to_string().contains("constructor takes 3 arguments"));
    }

    #[test]
    fn test_args_without_constructor() {
        let json = r#"{"abi": [], "bytecode": "0x6001"}"#;
        let path = write_artifact("noctor", json);
        let config = staking_config(path.clone());

        let err = ContractArtifact::load("noctor", &config, Address::ZERO).unwrap_err();
        std::fs::remove_file(path).ok();
        assert!(err.to_string().contains("declares no constructor"));
    }

    #[test]
    fn test_empty_bytecode_rejected() {
        let json = r#"{"abi": [], "bytecode": "0x"}"#;
        let path = write_artifact("empty", json);
        let config = ContractConfig {
            artifact: path.clone(),
            ..ContractConfig::default()
        };

        let err = ContractArtifact::load("empty", &config, Address::ZERO).unwrap_err();
        std::fs::remove_file(path).ok();
        assert!(err.to_string().contains("empty bytecode"));
    }

    #[test]
    fn test_missing_artifact_file() {
        let config = ContractConfig {
            artifact: PathBuf::from("/nonexistent/artifact.json"),
            ..ContractConfig::default()
        };
        let err = ContractArtifact::load("missing", &config, Address::ZERO).unwrap_err();
        assert!(matches!(err, DeployError::Config(_)));
    }
}

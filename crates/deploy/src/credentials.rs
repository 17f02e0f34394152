//! Signing key resolution.
//!
//! The key is validated before any network call so misconfiguration can
//! never leave a partially-submitted transaction behind. The signer is
//! held for the run's duration and is never logged or serialized.

use alloy_primitives::Address;
use alloy_signer_local::PrivateKeySigner;

use crate::config::Secrets;
use crate::error::DeployError;

/// The deployer's signing identity.
pub struct Credentials {
    signer: PrivateKeySigner,
}

impl Credentials {
    /// Resolve credentials from the environment-backed [`Secrets`].
    ///
    /// Fails with a configuration error when `PRIVATE_KEY` is unset or is
    /// not a 32-byte hex string. Parsing through the signer rejects
    /// malformed keys here rather than deferring to a remote rejection.
    pub fn resolve(secrets: &Secrets) -> Result<Self, DeployError> {
        let raw = secrets.private_key.as_deref().ok_or_else(|| {
            DeployError::Config("missing signing key: set PRIVATE_KEY in the environment".to_string())
        })?;

        let trimmed = raw.strip_prefix("0x").unwrap_or(raw);
        if trimmed.len() != 64 || hex::decode(trimmed).is_err() {
            return Err(DeployError::Config(
                "invalid signing key: expected 64 hex characters (32 bytes)".to_string(),
            ));
        }

        let signer = trimmed.parse::<PrivateKeySigner>().map_err(|e| {
            DeployError::Config(format!("invalid signing key: {e}"))
        })?;

        Ok(Self { signer })
    }

    /// The sender address derived from the signing key.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Access the signer for the synchronous signing step.
    pub(crate) fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("address", &self.signer.address())
            .finish_non_exhaustive()
    }
}

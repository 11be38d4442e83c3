//! Environment construction from run options.

use crate::options::RunOptions;
use hydra_logic::Environment;
use hydra_types::{ContestationPeriod, Party, SigningKey, VerificationKey};
use std::path::Path;

/// Failures turning options into a runnable environment.
#[derive(Debug, thiserror::Error)]
pub enum OptionsError {
    #[error("cannot read signing key {path}: {source}")]
    UnreadableKey {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("signing key {path} is not a hex-encoded 32-byte seed")]
    MalformedKey { path: String },

    #[error("party key {key} is not a hex-encoded verification key")]
    MalformedParty { key: String },
}

/// Build the node's environment: our identity plus the peer parties.
pub fn build_environment(options: &RunOptions) -> Result<Environment, OptionsError> {
    let signing_key = load_signing_key(&options.signing_key)?;

    let mut other_parties = Vec::with_capacity(options.parties.len());
    for key in &options.parties {
        other_parties.push(parse_party(key)?);
    }

    Ok(Environment::new(
        signing_key,
        other_parties,
        ContestationPeriod::from_secs(options.contestation_period),
    ))
}

fn load_signing_key(path: &Path) -> Result<SigningKey, OptionsError> {
    let text = std::fs::read_to_string(path).map_err(|source| OptionsError::UnreadableKey {
        path: path.display().to_string(),
        source,
    })?;
    let bytes: [u8; 32] = hex::decode(text.trim())
        .ok()
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(|| OptionsError::MalformedKey {
            path: path.display().to_string(),
        })?;
    Ok(SigningKey::from_bytes(&bytes))
}

fn parse_party(key: &str) -> Result<Party, OptionsError> {
    let malformed = || OptionsError::MalformedParty {
        key: key.to_string(),
    };
    let bytes: [u8; 32] = hex::decode(key.trim())
        .ok()
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(malformed)?;
    let verification_key = VerificationKey::from_bytes(&bytes).map_err(|_| malformed())?;
    Ok(Party::new(verification_key))
}

/// Deterministic id of the published head scripts for a network.
///
/// Posting the actual publication transaction is the chain collaborator's
/// job; the id only depends on the network and the script version.
pub fn publish_scripts_tx_id(network_id: &str) -> String {
    hydra_types::Hash::from_parts(&[b"hydra-scripts-v1", network_id.as_bytes()]).to_hex()
}

//! Party identity.

use crate::keys::VerificationKey;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A participant in a head, identified by its verification key.
///
/// Parties order canonically by key bytes. Every place that iterates a
/// head's party set relies on this ordering: snapshot leader rotation,
/// multi-signature slot assignment and the union order of committed UTxO
/// sets all assume `HeadParameters::parties` is sorted.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Party {
    pub verification_key: VerificationKey,
}

impl Party {
    /// Wrap a verification key as a party identity.
    pub fn new(verification_key: VerificationKey) -> Self {
        Self { verification_key }
    }

    /// Verify a signature made by this party.
    pub fn verify(&self, message: &[u8], signature: &crate::keys::Signature) -> bool {
        self.verification_key.verify(message, signature)
    }
}

impl fmt::Debug for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.verification_key.to_hex();
        write!(f, "Party({}..)", &hex[..8])
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.verification_key.to_hex())
    }
}

//! Ed25519 signing keys, signatures and multi-party signature sets.
//!
//! The head protocol needs one signature per party over the same canonical
//! bytes; a [`MultiSignature`] is therefore an ordered vector of individual
//! signatures, one slot per party in the head's canonical party ordering.
//! Completeness (a valid signature from *every* party) is checked by
//! [`MultiSignature::verify`].

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A private Ed25519 signing key.
///
/// Not serializable on purpose: key material is loaded from disk by the
/// binary and never travels through state or wire types.
#[derive(Clone)]
pub struct SigningKey(ed25519_dalek::SigningKey);

impl SigningKey {
    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> Signature {
        use ed25519_dalek::Signer;
        Signature(self.0.sign(message))
    }

    /// The verification key half of this keypair.
    pub fn verification_key(&self) -> VerificationKey {
        VerificationKey(self.0.verifying_key())
    }

    /// Raw 32-byte seed, for writing key files.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    /// Rebuild a signing key from its 32-byte seed.
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self(ed25519_dalek::SigningKey::from_bytes(bytes))
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningKey(<redacted>)")
    }
}

/// Generate a new random Ed25519 signing key.
pub fn generate_signing_key() -> SigningKey {
    let mut csprng = rand::rngs::OsRng;
    SigningKey(ed25519_dalek::SigningKey::generate(&mut csprng))
}

/// Generate a signing key from a seed (deterministic, for testing/simulation).
pub fn signing_key_from_seed(seed: &[u8; 32]) -> SigningKey {
    SigningKey(ed25519_dalek::SigningKey::from_bytes(seed))
}

/// A public Ed25519 verification key.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct VerificationKey(ed25519_dalek::VerifyingKey);

impl VerificationKey {
    /// Verify a signature over a message.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        self.0.verify_strict(message, &signature.0).is_ok()
    }

    /// Raw key bytes (the canonical ordering basis for parties).
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    /// Parse a verification key from raw bytes.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, KeyError> {
        ed25519_dalek::VerifyingKey::from_bytes(bytes)
            .map(Self)
            .map_err(|_| KeyError::InvalidVerificationKey)
    }

    /// Hex rendering of the key bytes.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }
}

impl PartialOrd for VerificationKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VerificationKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.to_bytes().cmp(&other.to_bytes())
    }
}

impl std::hash::Hash for VerificationKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.to_bytes().hash(state);
    }
}

impl fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        write!(f, "VerificationKey({}..)", &hex[..8])
    }
}

impl Serialize for VerificationKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for VerificationKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex_str = String::deserialize(deserializer)?;
        let bytes: [u8; 32] = hex::decode(&hex_str)
            .map_err(serde::de::Error::custom)?
            .try_into()
            .map_err(|_| serde::de::Error::custom("verification key must be 32 bytes"))?;
        VerificationKey::from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

/// An Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(ed25519_dalek::Signature);

impl Signature {
    /// Raw 64-byte signature.
    pub fn to_bytes(&self) -> [u8; 64] {
        self.0.to_bytes()
    }

    /// Rebuild a signature from raw bytes.
    pub fn from_bytes(bytes: &[u8; 64]) -> Self {
        Self(ed25519_dalek::Signature::from_bytes(bytes))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = hex::encode(self.to_bytes());
        write!(f, "Signature({}..)", &hex[..8])
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.to_bytes()))
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex_str = String::deserialize(deserializer)?;
        let bytes: [u8; 64] = hex::decode(&hex_str)
            .map_err(serde::de::Error::custom)?
            .try_into()
            .map_err(|_| serde::de::Error::custom("signature must be 64 bytes"))?;
        Ok(Signature::from_bytes(&bytes))
    }
}

/// Errors from key handling.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    /// The bytes do not encode a valid curve point.
    #[error("Invalid verification key bytes")]
    InvalidVerificationKey,
}

/// A complete set of signatures over the same message, one per party.
///
/// Signatures are stored in canonical party order (index i signed by
/// `parties[i]`). Construction via [`MultiSignature::from_indexed`] enforces
/// that every slot is filled, so a value of this type always claims
/// unanimity; [`MultiSignature::verify`] checks the claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiSignature {
    signatures: Vec<Signature>,
}

impl MultiSignature {
    /// Assemble a multi-signature from per-party-index signatures.
    ///
    /// Returns `None` unless exactly the indices `0..num_parties` are present.
    pub fn from_indexed(
        signatures: &std::collections::BTreeMap<usize, Signature>,
        num_parties: usize,
    ) -> Option<Self> {
        if signatures.len() != num_parties {
            return None;
        }
        let mut ordered = Vec::with_capacity(num_parties);
        for index in 0..num_parties {
            ordered.push(*signatures.get(&index)?);
        }
        Some(Self { signatures: ordered })
    }

    /// Number of signatures (equals the party set size by construction).
    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    /// True when there are no signatures. Never the case for a value built
    /// for a non-empty head, but required by the container convention.
    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    /// Verify every signature against the corresponding verification key.
    ///
    /// `keys` must be the head's canonically ordered party keys; the check
    /// fails if the arity differs or any single signature is invalid.
    pub fn verify(&self, keys: &[VerificationKey], message: &[u8]) -> bool {
        if keys.len() != self.signatures.len() {
            return false;
        }
        keys.iter()
            .zip(self.signatures.iter())
            .all(|(key, sig)| key.verify(message, sig))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn seeded(n: u8) -> SigningKey {
        signing_key_from_seed(&[n; 32])
    }

    #[test]
    fn test_sign_verify() {
        let key = seeded(1);
        let message = b"test message";

        let signature = key.sign(message);
        assert!(key.verification_key().verify(message, &signature));
    }

    #[test]
    fn test_verify_fails_wrong_message() {
        let key = seeded(1);
        let signature = key.sign(b"test message");
        assert!(!key.verification_key().verify(b"wrong message", &signature));
    }

    #[test]
    fn test_verify_fails_wrong_key() {
        let signature = seeded(1).sign(b"message");
        assert!(!seeded(2).verification_key().verify(b"message", &signature));
    }

    #[test]
    fn test_seeded_keys_deterministic() {
        let a = seeded(7);
        let b = seeded(7);
        assert_eq!(a.verification_key(), b.verification_key());
        assert_eq!(a.sign(b"x").to_bytes(), b.sign(b"x").to_bytes());
    }

    #[test]
    fn test_verification_key_serde_roundtrip() {
        let key = seeded(3).verification_key();
        let json = serde_json::to_string(&key).unwrap();
        let parsed: VerificationKey = serde_json::from_str(&json).unwrap();
        assert_eq!(key, parsed);
    }

    #[test]
    fn test_multisignature_requires_all_indices() {
        let keys: Vec<SigningKey> = (0..3).map(seeded).collect();
        let message = b"snapshot bytes";

        let mut sigs = BTreeMap::new();
        sigs.insert(0, keys[0].sign(message));
        sigs.insert(1, keys[1].sign(message));
        assert!(MultiSignature::from_indexed(&sigs, 3).is_none());

        sigs.insert(2, keys[2].sign(message));
        let multi = MultiSignature::from_indexed(&sigs, 3).unwrap();
        assert_eq!(multi.len(), 3);
    }

    #[test]
    fn test_multisignature_verify() {
        let keys: Vec<SigningKey> = (0..3).map(seeded).collect();
        let vks: Vec<VerificationKey> = keys.iter().map(|k| k.verification_key()).collect();
        let message = b"snapshot bytes";

        let sigs: BTreeMap<usize, Signature> = keys
            .iter()
            .enumerate()
            .map(|(i, k)| (i, k.sign(message)))
            .collect();
        let multi = MultiSignature::from_indexed(&sigs, 3).unwrap();

        assert!(multi.verify(&vks, message));
        assert!(!multi.verify(&vks, b"other bytes"));

        // Signature slots must line up with party order.
        let mut shuffled = vks.clone();
        shuffled.swap(0, 2);
        assert!(!multi.verify(&shuffled, message));
    }
}

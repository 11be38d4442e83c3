//! Wire format: length-prefixed frames carrying signed envelopes.
//!
//! Every peer message travels as a u32 big-endian length prefix followed by
//! a JSON envelope `{party, signature, payload}`. The signature is over the
//! raw payload bytes with the sender's party key; receivers drop frames
//! whose signature does not verify or whose sender is not a known party.

use hydra_core::Message;
use hydra_ledger::Ledger;
use hydra_types::{Party, Signature, SigningKey};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use tracing::warn;

/// Maximum accepted frame size. Keeps a malicious length prefix from
/// allocating unbounded memory.
pub const MAX_FRAME_BYTES: u32 = 16 * 1024 * 1024;

/// A signed message envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Sending party.
    pub party: Party,
    /// Signature over `payload` with the sender's key.
    pub signature: Signature,
    /// JSON-encoded [`Message`].
    #[serde(with = "payload_hex")]
    pub payload: Vec<u8>,
}

mod payload_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

/// Wire-level failures.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Frame of {0} bytes exceeds the {MAX_FRAME_BYTES} byte limit")]
    FrameTooLarge(u32),

    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(#[source] serde_json::Error),

    #[error("Malformed payload: {0}")]
    MalformedPayload(#[source] serde_json::Error),

    #[error("Sender {0} is not a party of this head")]
    UnknownSender(Party),

    #[error("Signature verification failed for {0}")]
    BadSignature(Party),
}

/// Sign and encode a message into a sealed envelope body.
pub fn seal<L: Ledger>(
    key: &SigningKey,
    party: Party,
    msg: &Message<L>,
) -> Result<Vec<u8>, WireError> {
    let payload = serde_json::to_vec(msg).map_err(WireError::MalformedPayload)?;
    let envelope = Envelope {
        party,
        signature: key.sign(&payload),
        payload,
    };
    serde_json::to_vec(&envelope).map_err(WireError::MalformedEnvelope)
}

/// Decode and authenticate an envelope body.
///
/// `known_parties` is the head's party set; anything signed by an outsider
/// is rejected before the payload is even parsed.
pub fn open<L: Ledger>(
    body: &[u8],
    known_parties: &[Party],
) -> Result<(Party, Message<L>), WireError> {
    let envelope: Envelope =
        serde_json::from_slice(body).map_err(WireError::MalformedEnvelope)?;
    if !known_parties.contains(&envelope.party) {
        return Err(WireError::UnknownSender(envelope.party));
    }
    if !envelope.party.verify(&envelope.payload, &envelope.signature) {
        warn!(party = %envelope.party, "Dropping envelope with bad signature");
        return Err(WireError::BadSignature(envelope.party));
    }
    let msg = serde_json::from_slice(&envelope.payload).map_err(WireError::MalformedPayload)?;
    Ok((envelope.party, msg))
}

/// Write one length-prefixed frame.
pub fn write_frame<W: Write>(writer: &mut W, body: &[u8]) -> Result<(), WireError> {
    let len = body.len() as u32;
    if len > MAX_FRAME_BYTES {
        return Err(WireError::FrameTooLarge(len));
    }
    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(body)?;
    Ok(())
}

/// Read one length-prefixed frame.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Vec<u8>, WireError> {
    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes)?;
    let len = u32::from_be_bytes(len_bytes);
    if len > MAX_FRAME_BYTES {
        return Err(WireError::FrameTooLarge(len));
    }
    let mut body = vec![0u8; len as usize];
    reader.read_exact(&mut body)?;
    Ok(body)
}

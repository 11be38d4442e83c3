//! Domain-separated canonical signing messages.
//!
//! Every signed artifact in the protocol has a unique domain tag prefix so a
//! signature from one context can never be replayed in another. Snapshot
//! signatures are the only multi-party artifact; the message layout is the
//! protocol constant all parties must agree on:
//!
//! ```text
//! HEAD_SNAPSHOT ‖ head_id ‖ number (u64 big-endian) ‖ utxo_hash ‖ txs_hash
//! ```
//!
//! `utxo_hash` and `txs_hash` are Blake3 digests supplied by the ledger
//! layer over its canonical encodings, keeping this crate ledger-agnostic.

use crate::hash::Hash;
use crate::head::HeadId;

/// Domain tag for snapshot signatures.
pub const DOMAIN_SNAPSHOT: &[u8] = b"HEAD_SNAPSHOT";

/// Build the canonical signing message for a snapshot.
///
/// Used for producing `AckSn` signatures and for verifying every signature
/// collected into a multi-signature.
pub fn snapshot_signing_message(
    head_id: &HeadId,
    number: u64,
    utxo_hash: &Hash,
    txs_hash: &Hash,
) -> Vec<u8> {
    let mut message = Vec::with_capacity(
        DOMAIN_SNAPSHOT.len() + head_id.as_bytes().len() + 8 + Hash::BYTES * 2,
    );
    message.extend_from_slice(DOMAIN_SNAPSHOT);
    message.extend_from_slice(head_id.as_bytes());
    message.extend_from_slice(&number.to_be_bytes());
    message.extend_from_slice(utxo_hash.as_bytes());
    message.extend_from_slice(txs_hash.as_bytes());
    message
}

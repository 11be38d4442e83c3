//! Foundational types for the head protocol node.
//!
//! This crate provides the types shared by every other layer:
//!
//! - **Primitives**: [`Hash`], signing keys and signatures
//! - **Identities**: [`Party`], [`HeadId`]
//! - **Protocol parameters**: [`HeadParameters`], [`ContestationPeriod`]
//! - **Multi-party signatures**: [`MultiSignature`]
//! - **Canonical signing messages**: [`snapshot_signing_message`]
//!
//! # Design Philosophy
//!
//! This crate is self-contained and does not depend on any other workspace
//! crate, making it the foundation layer. Everything here is deterministic:
//! the same inputs always produce the same bytes, which is what allows all
//! parties of a head to agree on signatures over snapshots.

mod hash;
mod head;
mod keys;
mod party;
mod signing;

pub use hash::{Hash, HexError};
pub use head::{ContestationPeriod, HeadId, HeadParameters};
pub use keys::{
    generate_signing_key, signing_key_from_seed, MultiSignature, Signature, SigningKey,
    VerificationKey,
};
pub use party::Party;
pub use signing::{snapshot_signing_message, DOMAIN_SNAPSHOT};

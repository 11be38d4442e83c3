//! Ledger abstraction for the head protocol.
//!
//! The head logic is generic over the transaction and UTxO types of the
//! underlying ledger. This crate provides:
//!
//! - [`Ledger`]: the trait tying a transaction type to its UTxO set type,
//!   with the operations the head logic needs (apply, union, canonical
//!   hashing)
//! - [`Snapshot`] / [`ConfirmedSnapshot`]: the multi-party agreement
//!   artifacts built over ledger types
//! - [`MockLedger`]: a small input/output-model ledger used by tests and the
//!   standalone binary wiring
//!
//! Transaction validation proper belongs to the ledger implementation; the
//! head logic only asks "does this transaction apply to this UTxO set".

mod mock;
mod snapshot;
mod traits;

pub use mock::{Address, MockLedger, MockTx, MockValidationError, TxIn, TxOut, UtxoSet};
pub use snapshot::{ConfirmedSnapshot, Snapshot};
pub use traits::Ledger;

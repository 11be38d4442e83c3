//! Per-connection output formatting.
//!
//! Each API connection chooses how transactions are represented and whether
//! snapshot UTxO sets are included. Formatting is a rewrite of the already
//! enveloped JSON tree, so it composes with any ledger type.

use serde_json::Value;

/// How transaction payloads are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TxDisplay {
    /// Structured JSON (the wire representation).
    #[default]
    Json,
    /// Hex of the transaction's canonical binary encoding.
    CborHex,
}

/// Whether the `utxo` field of confirmed snapshots is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SnapshotUtxo {
    /// Deliver the full UTxO set.
    #[default]
    Include,
    /// Strip `snapshot.utxo` from `SnapshotConfirmed` outputs.
    Omit,
}

/// A connection's formatting choices.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputFormat {
    pub tx_display: TxDisplay,
    pub snapshot_utxo: SnapshotUtxo,
}

impl OutputFormat {
    /// Rewrite one delivered output according to this format.
    pub fn apply(&self, mut value: Value) -> Value {
        if self.snapshot_utxo == SnapshotUtxo::Omit && value["tag"] == "SnapshotConfirmed" {
            if let Some(snapshot) = value
                .get_mut("snapshot")
                .and_then(|snapshot| snapshot.as_object_mut())
            {
                snapshot.remove("utxo");
            }
        }

        if self.tx_display == TxDisplay::CborHex {
            hex_encode_transactions(&mut value);
        }

        value
    }
}

/// Replace every `transaction` field and every `confirmedTransactions[]`
/// entry, wherever it sits in the tree (including under
/// `postChainTx.confirmedSnapshot.snapshot`), by the hex encoding of its
/// canonical bytes.
fn hex_encode_transactions(value: &mut Value) {
    match value {
        Value::Object(object) => {
            for (key, child) in object.iter_mut() {
                match key.as_str() {
                    "transaction" => *child = to_hex(child),
                    "confirmedTransactions" => {
                        if let Value::Array(txs) = child {
                            for tx in txs.iter_mut() {
                                *tx = to_hex(tx);
                            }
                        }
                    }
                    _ => hex_encode_transactions(child),
                }
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                hex_encode_transactions(item);
            }
        }
        _ => {}
    }
}

fn to_hex(value: &Value) -> Value {
    let bytes = serde_json::to_vec(value).expect("JSON value re-serializes");
    Value::String(hex::encode(bytes))
}

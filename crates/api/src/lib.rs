//! Client API envelope and formatting.
//!
//! The API server transport (WebSocket delivery, connection management) is
//! an external collaborator; this crate owns the payload contract:
//!
//! - [`envelope`]: wraps a server output with `{seq, timestamp}`
//! - [`parse_client_input`]: strict parsing of inbound commands
//! - [`OutputFormat`]: per-connection rewriting of delivered JSON
//!   (transaction representation, snapshot UTxO inclusion)

mod format;

pub use format::{OutputFormat, SnapshotUtxo, TxDisplay};

use chrono::{DateTime, SecondsFormat, Utc};
use hydra_core::{ClientCommand, ServerOutput};
use hydra_ledger::Ledger;
use serde_json::{json, Value};

/// Wrap an output for delivery: the payload fields plus the sequence id of
/// the input that caused it and an ISO-8601 timestamp.
pub fn envelope<L: Ledger>(
    seq: u64,
    timestamp: DateTime<Utc>,
    output: &ServerOutput<L>,
) -> Value {
    let mut value = serde_json::to_value(output).expect("server outputs serialize to JSON");
    let object = value
        .as_object_mut()
        .expect("tagged server outputs are JSON objects");
    object.insert("seq".into(), json!(seq));
    object.insert(
        "timestamp".into(),
        json!(timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)),
    );
    value
}

/// Parse a client line into a command.
///
/// Failures carry the reason so the server can answer `InvalidInput` to the
/// offending client only.
pub fn parse_client_input<L: Ledger>(input: &str) -> Result<ClientCommand<L>, String> {
    serde_json::from_str(input).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use hydra_ledger::MockLedger;
    use hydra_types::{signing_key_from_seed, Party};

    fn party() -> Party {
        Party::new(signing_key_from_seed(&[1; 32]).verification_key())
    }

    #[test]
    fn test_envelope_adds_seq_and_timestamp() {
        let output: ServerOutput<MockLedger> = ServerOutput::Greetings {
            me: party(),
            head_status: "Idle".into(),
        };
        let at = Utc.with_ymd_and_hms(2024, 5, 17, 12, 30, 45).unwrap();

        let value = envelope(42, at, &output);
        assert_eq!(value["seq"], 42);
        assert_eq!(value["tag"], "Greetings");
        assert_eq!(value["timestamp"], "2024-05-17T12:30:45.000Z");
    }

    #[test]
    fn test_parse_client_commands() {
        let init: ClientCommand<MockLedger> =
            parse_client_input(r#"{"tag":"Init"}"#).unwrap();
        assert_eq!(init, ClientCommand::Init);

        let get: ClientCommand<MockLedger> =
            parse_client_input(r#"{"tag":"GetUTxO"}"#).unwrap();
        assert_eq!(get, ClientCommand::GetUTxO);
    }

    #[test]
    fn test_parse_rejects_garbage_with_reason() {
        let err = parse_client_input::<MockLedger>("not even json").unwrap_err();
        assert!(!err.is_empty());

        let err = parse_client_input::<MockLedger>(r#"{"tag":"NoSuchCommand"}"#).unwrap_err();
        assert!(err.contains("NoSuchCommand") || err.contains("unknown variant"));
    }
}

//! Wire-level message envelope.
//!
//! Every frame exchanged over a relay connection is a JSON object with a
//! `type` tag and an opaque `payload`. Only envelopes tagged with
//! [`SUBMISSION_TAG`] are persisted to the backlog; every other tag is
//! broadcast-only, so message types added later flow through the relay
//! without changes here.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{RelayError, RelayResult};

/// Type tag for patient form submissions — the only tag the backlog persists.
pub const SUBMISSION_TAG: &str = "PATIENT_FORM";

/// One discrete message exchanged over a connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Discriminant tag.
    #[serde(rename = "type")]
    pub tag: String,
    /// Opaque structured body. JSON `null` when the sender omitted it.
    #[serde(default)]
    pub payload: Value,
}

impl Envelope {
    /// Decode an envelope from a raw JSON text frame.
    pub fn decode(raw: &str) -> RelayResult<Self> {
        serde_json::from_str(raw).map_err(|e| RelayError::Parse(e.to_string()))
    }

    /// Whether this envelope is a form submission that must be persisted.
    pub fn is_submission(&self) -> bool {
        self.tag == SUBMISSION_TAG
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_submission() {
        let env =
            Envelope::decode(r#"{"type":"PATIENT_FORM","payload":{"firstName":"Ann"}}"#).unwrap();
        assert!(env.is_submission());
        assert_eq!(env.payload, json!({"firstName": "Ann"}));
    }

    #[test]
    fn missing_payload_defaults_to_null() {
        let env = Envelope::decode(r#"{"type":"PING"}"#).unwrap();
        assert!(!env.is_submission());
        assert_eq!(env.payload, Value::Null);
    }

    #[test]
    fn unknown_tag_is_not_a_submission() {
        let env = Envelope::decode(r#"{"type":"STAFF_ACK","payload":{}}"#).unwrap();
        assert!(!env.is_submission());
    }

    #[test]
    fn malformed_frame_is_a_parse_error() {
        let err = Envelope::decode("not json at all").unwrap_err();
        assert!(matches!(err, RelayError::Parse(_)));
    }

    #[test]
    fn missing_tag_is_a_parse_error() {
        assert!(Envelope::decode(r#"{"payload":{}}"#).is_err());
    }
}

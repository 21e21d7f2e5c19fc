//! The long-poll wire contract.
//!
//! A poll request names its channels, the last notification id already
//! consumed, and a couple of options; the response is an array of
//! `{ id, message }` items. An empty array is a normal response — it is
//! what a timed-out long poll returns.

use serde::{Deserialize, Serialize};

/// Header an anonymous caller uses to name its tenant.
///
/// Authenticated callers get their tenant from the bearer token instead.
pub const TENANT_HEADER: &str = "X-Bus-Tenant";

/// One scalar position of a tuple-shaped wire channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireAtom {
    Int(i64),
    Str(String),
}

/// A channel as it appears on the wire.
///
/// Either a bare name (`"orders"`) or an array of scalars; a two-element
/// `[model, id]` array is the entity-reference shorthand the server
/// resolves before canonicalization. Anything else fails
/// deserialization — a caller error, rejected at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireChannel {
    Name(String),
    Parts(Vec<WireAtom>),
}

/// Optional knobs on a poll request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOptions {
    /// Never block: resolve immediately even when there is nothing new.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub peek: bool,

    /// Presence-update hint: how long the end user has been inactive,
    /// in seconds. Orthogonal to the notification protocol.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bus_inactivity: Option<u64>,
}

/// Body of `POST /bus/poll`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollRequest {
    pub channels: Vec<WireChannel>,

    /// Resumption cursor: the last notification id already consumed, or
    /// 0 for a first poll (catch-up semantics).
    #[serde(default)]
    pub last: i64,

    #[serde(default)]
    pub options: PollOptions,
}

/// The `{type, payload}` tagged union a notification carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: serde_json::Value,
}

/// One element of a poll response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollItem {
    pub id: i64,
    pub message: BusMessage,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use serde_json::json;

    #[test]
    fn string_channel_deserializes_as_name() {
        let channel: WireChannel = serde_json::from_value(json!("orders")).unwrap();
        assert_eq!(channel, WireChannel::Name("orders".into()));
    }

    #[test]
    fn array_channel_deserializes_as_parts() {
        let channel: WireChannel = serde_json::from_value(json!(["order", 5])).unwrap();
        assert_eq!(
            channel,
            WireChannel::Parts(vec![WireAtom::Str("order".into()), WireAtom::Int(5)])
        );
    }

    #[test]
    fn non_scalar_channel_is_rejected() {
        assert!(serde_json::from_value::<WireChannel>(json!({"model": "order"})).is_err());
        assert!(serde_json::from_value::<WireChannel>(json!([["nested"]])).is_err());
        assert!(serde_json::from_value::<WireChannel>(json!(12.5)).is_err());
    }

    #[test]
    fn poll_request_fields_default() {
        let request: PollRequest =
            serde_json::from_value(json!({ "channels": ["orders"] })).unwrap();
        assert_eq!(request.last, 0);
        assert!(!request.options.peek);
        assert_eq!(request.options.bus_inactivity, None);
    }

    #[test]
    fn poll_item_wire_shape() {
        let item = PollItem {
            id: 1,
            message: BusMessage {
                kind: "update".into(),
                payload: json!({"status": "paid"}),
            },
        };
        assert_eq!(
            serde_json::to_value(&item).unwrap(),
            json!({"id": 1, "message": {"type": "update", "payload": {"status": "paid"}}})
        );
    }
}

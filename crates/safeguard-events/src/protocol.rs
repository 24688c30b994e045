//! SignalR JSON hub protocol framing.
//!
//! Every message is a JSON object terminated by the record separator
//! `0x1E`. A websocket text frame may carry several records.

use serde::Deserialize;
use serde_json::Value;

use safeguard_core::Event;

/// Record separator terminating every hub protocol message.
pub const RECORD_SEPARATOR: char = '\u{1e}';

/// Handshake request sent right after the websocket opens.
pub const HANDSHAKE_REQUEST: &str = "{\"protocol\":\"json\",\"version\":1}\u{1e}";

/// Keepalive ping record.
pub const PING_RECORD: &str = "{\"type\":6}\u{1e}";

/// Close record sent on graceful shutdown.
pub const CLOSE_RECORD: &str = "{\"type\":7}\u{1e}";

const INVOCATION: u8 = 1;
const PING: u8 = 6;
const CLOSE: u8 = 7;

/// A decoded hub message.
#[derive(Debug, Clone, PartialEq)]
pub enum HubMessage {
    /// Server invoked a client method; carries the events it delivered.
    Invocation { target: String, events: Vec<Event> },
    /// Keepalive.
    Ping,
    /// Server is closing the connection.
    Close {
        error: Option<String>,
        allow_reconnect: Option<bool>,
    },
    /// A message type this client does not act on.
    Other(u8),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMessage {
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    arguments: Vec<Value>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    allow_reconnect: Option<bool>,
}

#[derive(Deserialize)]
struct HandshakeResponse {
    #[serde(default)]
    error: Option<String>,
}

/// Split a text frame into its non-empty records.
pub fn split_records(frame: &str) -> impl Iterator<Item = &str> {
    frame
        .split(RECORD_SEPARATOR)
        .map(str::trim)
        .filter(|r| !r.is_empty())
}

/// Check the handshake response record. `Err` carries the server's reason.
pub fn parse_handshake(record: &str) -> Result<(), String> {
    let response: HandshakeResponse = serde_json::from_str(record)
        .map_err(|e| format!("invalid handshake response: {}", e))?;
    match response.error {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

/// Decode one record.
pub fn parse_record(record: &str) -> serde_json::Result<HubMessage> {
    let raw: RawMessage = serde_json::from_str(record)?;
    Ok(match raw.kind {
        INVOCATION => HubMessage::Invocation {
            target: raw.target.unwrap_or_default(),
            events: raw.arguments.iter().flat_map(events_from_argument).collect(),
        },
        PING => HubMessage::Ping,
        CLOSE => HubMessage::Close {
            error: raw.error,
            allow_reconnect: raw.allow_reconnect,
        },
        other => HubMessage::Other(other),
    })
}

/// Events carried by one invocation argument.
///
/// The appliance sends either a single event object with a `Name`, or a
/// batch whose `Events` array holds `{Name, Data}` entries. The argument may
/// arrive as an object or as a JSON-encoded string.
fn events_from_argument(argument: &Value) -> Vec<Event> {
    let decoded;
    let payload = match argument {
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(value) => {
                decoded = value;
                &decoded
            }
            Err(_) => return Vec::new(),
        },
        other => other,
    };

    if let Some(batch) = payload.get("Events").and_then(Value::as_array) {
        return batch
            .iter()
            .filter_map(|entry| {
                let name = entry.get("Name")?.as_str()?;
                let body = entry.get("Data").map(body_text).unwrap_or_default();
                Some(Event::new(name, body))
            })
            .collect();
    }

    match payload.get("Name").and_then(Value::as_str) {
        Some(name) => vec![Event::new(name, payload.to_string())],
        None => Vec::new(),
    }
}

/// Strings pass through untouched; anything else is re-encoded as JSON.
fn body_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_multiple_records() {
        let frame = "{\"type\":6}\u{1e}{\"type\":6}\u{1e}";
        assert_eq!(split_records(frame).count(), 2);
        assert_eq!(split_records("\u{1e}").count(), 0);
    }

    #[test]
    fn handshake_ok_and_error() {
        assert!(parse_handshake("{}").is_ok());
        assert_eq!(
            parse_handshake("{\"error\":\"unsupported protocol\"}"),
            Err("unsupported protocol".to_string())
        );
        assert!(parse_handshake("nope").is_err());
    }

    #[test]
    fn single_event_invocation() {
        let record = r#"{"type":1,"target":"ReceiveMessage","arguments":[{"Name":"UserCreated","Data":{"UserId":7}}]}"#;
        match parse_record(record).unwrap() {
            HubMessage::Invocation { target, events } => {
                assert_eq!(target, "ReceiveMessage");
                assert_eq!(events.len(), 1);
                assert_eq!(events[0].name, "UserCreated");
                assert!(events[0].body.contains("\"UserId\":7"));
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn batched_events_in_string_argument() {
        let payload = r#"{"Events":[{"Name":"A","Data":{"x":1}},{"Name":"B","Data":"raw"}]}"#;
        let record = serde_json::json!({
            "type": 1,
            "target": "ReceiveMessage",
            "arguments": [payload]
        })
        .to_string();

        match parse_record(&record).unwrap() {
            HubMessage::Invocation { events, .. } => {
                assert_eq!(
                    events,
                    vec![Event::new("A", "{\"x\":1}"), Event::new("B", "raw")]
                );
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn nameless_payload_yields_no_events() {
        let record = r#"{"type":1,"target":"ReceiveMessage","arguments":[{"Data":1},"not json"]}"#;
        match parse_record(record).unwrap() {
            HubMessage::Invocation { events, .. } => assert!(events.is_empty()),
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn close_carries_reconnect_flag() {
        assert_eq!(
            parse_record(r#"{"type":7,"error":"gone","allowReconnect":false}"#).unwrap(),
            HubMessage::Close {
                error: Some("gone".to_string()),
                allow_reconnect: Some(false),
            }
        );
        assert_eq!(parse_record(r#"{"type":6}"#).unwrap(), HubMessage::Ping);
        assert_eq!(parse_record(r#"{"type":3}"#).unwrap(), HubMessage::Other(3));
    }
}

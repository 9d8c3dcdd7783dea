use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The `{event, data, channel?}` unit exchanged over the transport in both directions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
}

impl Envelope {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
            channel: None,
        }
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    /// Returns `data` with one level of JSON-in-a-string unwrapped.
    ///
    /// The server encodes most payloads as a JSON string inside the envelope.
    /// Strings that are not valid JSON are returned unchanged.
    pub fn decoded_data(&self) -> Value {
        match &self.data {
            Value::String(raw) => serde_json::from_str(raw).unwrap_or_else(|_| self.data.clone()),
            other => other.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_serialization_without_channel() {
        let envelope = Envelope::new("broadcastt:ping", json!({}));

        let encoded = serde_json::to_string(&envelope).unwrap();
        assert!(!encoded.contains(r#""channel":"#));
        assert!(encoded.contains(r#""event":"broadcastt:ping""#));
    }

    #[test]
    fn test_envelope_serialization_with_channel() {
        let envelope = Envelope::new("client-typing", json!({"user": 1})).with_channel("private-chat");

        let encoded = serde_json::to_string(&envelope).unwrap();
        assert!(encoded.contains(r#""channel":"private-chat""#));
    }

    #[test]
    fn test_envelope_missing_data_defaults_to_null() {
        let envelope: Envelope = serde_json::from_str(r#"{"event":"broadcastt:pong"}"#).unwrap();

        assert_eq!(envelope.event, "broadcastt:pong");
        assert_eq!(envelope.data, Value::Null);
        assert_eq!(envelope.channel, None);
    }

    #[test]
    fn test_decoded_data_unwraps_json_strings() {
        let envelope = Envelope::new(
            "broadcastt:connection_established",
            Value::String(r#"{"socket_id":"1.2","activity_timeout":30}"#.to_string()),
        );

        assert_eq!(
            envelope.decoded_data(),
            json!({"socket_id": "1.2", "activity_timeout": 30})
        );
    }

    #[test]
    fn test_decoded_data_keeps_plain_strings_and_objects() {
        let plain = Envelope::new("message", Value::String("hello".to_string()));
        assert_eq!(plain.decoded_data(), json!("hello"));

        let object = Envelope::new("message", json!({"a": 1}));
        assert_eq!(object.decoded_data(), json!({"a": 1}));
    }
}

use serde::{Deserialize, Serialize};

/// Outbound wire frame: a JSON object with an event name, an opaque payload
/// and an optional reference used to correlate replies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientMessage {
    pub event: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r#ref: Option<String>,
}

impl ClientMessage {
    pub fn new(event: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            payload,
            r#ref: None,
        }
    }

    pub fn with_ref(mut self, r#ref: String) -> Self {
        self.r#ref = Some(r#ref);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message() {
        let message = ClientMessage::new("chat.message", serde_json::Value::Null);
        assert_eq!(message.event, "chat.message");
        assert_eq!(message.payload, serde_json::Value::Null);
        assert_eq!(message.r#ref, None);
    }

    #[test]
    fn test_serialization_without_ref() {
        let message = ClientMessage::new("chat.message", serde_json::json!({"text": "hi"}));

        let json = serde_json::to_string(&message).unwrap();
        assert!(!json.contains(r#""ref":"#));
    }

    #[test]
    fn test_serialization_with_ref() {
        let message = ClientMessage::new("ping", serde_json::json!({})).with_ref("123".to_string());

        let json = serde_json::to_string(&message).unwrap();
        assert!(json.contains(r#""ref":"123""#));
    }

    #[test]
    fn test_round_trip() {
        let message =
            ClientMessage::new("ping", serde_json::json!({})).with_ref("1".to_string());

        let serialized = serde_json::to_string(&message).unwrap();
        let deserialized: ClientMessage = serde_json::from_str(&serialized).unwrap();

        assert_eq!(message, deserialized);
    }
}

use crate::types::constants::wire_events;
use crate::types::error::Result;
use serde::{Deserialize, Serialize};

/// The closed set of inbound event names.
///
/// Unknown names do not parse; frames carrying them are logged and dropped
/// by the router instead of being dispatched with an untyped payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    NotificationCreated,
    UploadProgress,
    UploadCompleted,
    UploadError,
    Pong,
}

impl EventKind {
    /// Parse a wire event name into an `EventKind`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            wire_events::NOTIFICATION_CREATED => Some(Self::NotificationCreated),
            wire_events::UPLOAD_PROGRESS => Some(Self::UploadProgress),
            wire_events::UPLOAD_COMPLETED => Some(Self::UploadCompleted),
            wire_events::UPLOAD_ERROR => Some(Self::UploadError),
            wire_events::PONG => Some(Self::Pong),
            _ => None,
        }
    }

    /// Convert the event kind to its wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotificationCreated => wire_events::NOTIFICATION_CREATED,
            Self::UploadProgress => wire_events::UPLOAD_PROGRESS,
            Self::UploadCompleted => wire_events::UPLOAD_COMPLETED,
            Self::UploadError => wire_events::UPLOAD_ERROR,
            Self::Pong => wire_events::PONG,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Raw inbound frame as decoded from a JSON text message.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerFrame {
    pub event: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(default)]
    pub r#ref: Option<String>,
}

/// Severity of a server-pushed notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Info,
    Success,
    Warning,
    Error,
}

/// A server-pushed notification record.
///
/// `persistent` notifications survive bulk "remove read" sweeps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    /// Creation time, epoch milliseconds
    pub timestamp: u64,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub persistent: bool,
}

/// Status of an upload as reported through progress events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Uploading,
    Completed,
    Error,
}

impl UploadStatus {
    /// Completed and errored uploads accept no further progress updates.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadProgressEvent {
    pub upload_id: String,
    pub progress: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadCompletedEvent {
    pub upload_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadErrorEvent {
    pub upload_id: String,
    #[serde(default)]
    pub error: Option<String>,
}

/// Heartbeat reply. The ref echoes the ping that prompted it.
#[derive(Debug, Clone, PartialEq)]
pub struct PongEvent {
    pub r#ref: Option<String>,
}

/// A fully decoded inbound event with a typed payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    NotificationCreated(Notification),
    UploadProgress(UploadProgressEvent),
    UploadCompleted(UploadCompletedEvent),
    UploadError(UploadErrorEvent),
    Pong(PongEvent),
}

impl ServerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::NotificationCreated(_) => EventKind::NotificationCreated,
            Self::UploadProgress(_) => EventKind::UploadProgress,
            Self::UploadCompleted(_) => EventKind::UploadCompleted,
            Self::UploadError(_) => EventKind::UploadError,
            Self::Pong(_) => EventKind::Pong,
        }
    }

    /// Decode a raw frame into a typed event.
    ///
    /// Returns `Ok(None)` for event names outside the closed set; returns an
    /// error when the name is known but the payload does not match its shape.
    pub fn decode(frame: ServerFrame) -> Result<Option<Self>> {
        let Some(kind) = EventKind::parse(&frame.event) else {
            return Ok(None);
        };

        let event = match kind {
            EventKind::NotificationCreated => {
                Self::NotificationCreated(serde_json::from_value(frame.payload)?)
            }
            EventKind::UploadProgress => {
                Self::UploadProgress(serde_json::from_value(frame.payload)?)
            }
            EventKind::UploadCompleted => {
                Self::UploadCompleted(serde_json::from_value(frame.payload)?)
            }
            EventKind::UploadError => Self::UploadError(serde_json::from_value(frame.payload)?),
            EventKind::Pong => Self::Pong(PongEvent { r#ref: frame.r#ref }),
        };

        Ok(Some(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_round_trip() {
        let kinds = vec![
            EventKind::NotificationCreated,
            EventKind::UploadProgress,
            EventKind::UploadCompleted,
            EventKind::UploadError,
            EventKind::Pong,
        ];

        for kind in kinds {
            assert_eq!(EventKind::parse(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn test_unknown_event_name_does_not_parse() {
        assert_eq!(EventKind::parse("presence.join"), None);
        assert_eq!(EventKind::parse(""), None);
    }

    #[test]
    fn test_decode_notification() {
        let frame: ServerFrame = serde_json::from_str(
            r#"{
                "event": "notification.created",
                "payload": {
                    "id": "n1",
                    "type": "warning",
                    "title": "Storage",
                    "message": "Quota almost reached",
                    "timestamp": 1712000000000
                }
            }"#,
        )
        .unwrap();

        let event = ServerEvent::decode(frame).unwrap().unwrap();
        match event {
            ServerEvent::NotificationCreated(n) => {
                assert_eq!(n.id, "n1");
                assert_eq!(n.kind, NotificationKind::Warning);
                assert!(!n.read);
                assert!(!n.persistent);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_decode_upload_progress_ignores_extra_fields() {
        let frame: ServerFrame = serde_json::from_str(
            r#"{
                "event": "upload.progress",
                "payload": {"uploadId": "u1", "progress": 75, "status": "uploading"}
            }"#,
        )
        .unwrap();

        let event = ServerEvent::decode(frame).unwrap().unwrap();
        assert_eq!(
            event,
            ServerEvent::UploadProgress(UploadProgressEvent {
                upload_id: "u1".to_string(),
                progress: 75,
            })
        );
    }

    #[test]
    fn test_decode_unknown_event_is_none() {
        let frame: ServerFrame =
            serde_json::from_str(r#"{"event": "presence.join", "payload": {}}"#).unwrap();
        assert_eq!(ServerEvent::decode(frame).unwrap(), None);
    }

    #[test]
    fn test_decode_malformed_payload_is_error() {
        let frame: ServerFrame =
            serde_json::from_str(r#"{"event": "upload.progress", "payload": {"progress": 10}}"#)
                .unwrap();
        assert!(ServerEvent::decode(frame).is_err());
    }

    #[test]
    fn test_decode_pong_carries_frame_ref() {
        let frame: ServerFrame =
            serde_json::from_str(r#"{"event": "pong", "ref": "7"}"#).unwrap();
        let event = ServerEvent::decode(frame).unwrap().unwrap();
        assert_eq!(
            event,
            ServerEvent::Pong(PongEvent {
                r#ref: Some("7".to_string())
            })
        );
    }
}

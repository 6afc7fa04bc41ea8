//! Frames exchanged on the notification push channel.

use serde::{Deserialize, Serialize};

use vessa_core::types::NotificationId;

use super::priority::AlertPriority;

/// First frame a client sends after connecting.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename = "auth")]
pub struct PushAuth {
    pub token: String,
}

/// Frames the gateway sends.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushFrame {
    /// The token in [`PushAuth`] was accepted.
    AuthSuccess,
    /// The gateway refused the connection or a frame.
    Error {
        #[serde(default)]
        message: String,
    },
    /// A notification was created for the signed-in user.
    Notification { data: PushedNotification },
    /// Frame types this client does not know about.
    #[serde(other)]
    Unknown,
}

/// Summary of a notification delivered over the push channel.
///
/// The full record is fetched by the next listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PushedNotification {
    pub id: NotificationId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub priority: AlertPriority,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_frame_shape() {
        let frame = PushAuth {
            token: "tok".into(),
        };
        let json = serde_json::to_value(&frame).expect("serialize");
        assert_eq!(json, serde_json::json!({"type": "auth", "token": "tok"}));
    }

    #[test]
    fn test_notification_frame() {
        let raw = r#"{
            "type": "notification",
            "data": {
                "id": "n-7",
                "title": "Port scan detected",
                "message": "10.0.0.4 scanned 120 ports",
                "priority": "high",
                "created_at": "2024-03-01T10:00:00",
                "data": {"source_ip": "10.0.0.4"}
            }
        }"#;
        let PushFrame::Notification { data } = serde_json::from_str(raw).expect("deserialize")
        else {
            panic!("expected a notification frame");
        };
        assert_eq!(data.id, NotificationId::new("n-7"));
        assert_eq!(data.priority, AlertPriority::High);
    }

    #[test]
    fn test_error_and_unknown_frames() {
        let frame: PushFrame =
            serde_json::from_str(r#"{"type":"error","message":"Invalid token"}"#).expect("error");
        assert!(matches!(frame, PushFrame::Error { message } if message == "Invalid token"));

        let frame: PushFrame = serde_json::from_str(r#"{"type":"ping"}"#).expect("unknown");
        assert!(matches!(frame, PushFrame::Unknown));

        let frame: PushFrame =
            serde_json::from_str(r#"{"type":"auth_success","message":"ok"}"#).expect("success");
        assert!(matches!(frame, PushFrame::AuthSuccess));
    }
}

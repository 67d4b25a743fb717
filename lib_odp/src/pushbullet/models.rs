//! Wire types for the Pushbullet v2 REST API and realtime stream.

use serde::{Deserialize, Serialize};

fn default_active() -> bool {
    true
}

/// A device registered with the account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub iden: String,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub created: Option<f64>,
    #[serde(default)]
    pub modified: Option<f64>,
}

impl Device {
    pub fn new(iden: impl Into<String>, nickname: impl Into<String>) -> Self {
        Self {
            iden: iden.into(),
            nickname: Some(nickname.into()),
            active: true,
            created: None,
            modified: None,
        }
    }

    /// Nickname, or an empty string for unnamed devices.
    pub fn name(&self) -> &str {
        self.nickname.as_deref().unwrap_or("")
    }
}

/// A push as returned by `GET /v2/pushes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Push {
    pub iden: String,
    #[serde(default = "default_active")]
    pub active: bool,
    /// Seconds since the epoch, with sub-second precision.
    #[serde(default)]
    pub modified: f64,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub source_device_iden: Option<String>,
    #[serde(default)]
    pub target_device_iden: Option<String>,
}

impl Push {
    /// Minimal note push between two devices.
    pub fn note(
        iden: impl Into<String>,
        body: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
        modified: f64,
    ) -> Self {
        Self {
            iden: iden.into(),
            active: true,
            modified,
            kind: Some("note".to_string()),
            title: None,
            body: Some(body.into()),
            source_device_iden: Some(source.into()),
            target_device_iden: Some(target.into()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeviceList {
    #[serde(default)]
    pub devices: Vec<Device>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PushList {
    #[serde(default)]
    pub pushes: Vec<Push>,
    #[serde(default)]
    pub cursor: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct NewDevice<'a> {
    pub nickname: &'a str,
    pub model: &'a str,
    pub manufacturer: &'a str,
    pub icon: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct NewNote<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub device_iden: &'a str,
    pub title: &'a str,
    pub body: &'a str,
}

/// A frame from `wss://stream.pushbullet.com/websocket/<token>`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamMessage {
    /// Keep-alive, sent every 30 seconds.
    Nop,
    /// Something changed; `subtype` names the collection ("push", "device").
    Tickle { subtype: String },
    /// Ephemeral (mirrored notification, SMS, clipboard).
    Push { push: serde_json::Value },
    #[serde(other)]
    Other,
}

impl StreamMessage {
    /// True for the notification that the push list changed.
    pub fn is_push_tickle(&self) -> bool {
        matches!(self, StreamMessage::Tickle { subtype } if subtype == "push")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_tolerates_missing_fields() {
        let push: Push = serde_json::from_str(
            r#"{"iden": "p1", "active": false, "modified": 1500000000.25, "dismissed": true}"#,
        )
        .unwrap();
        assert!(!push.active);
        assert_eq!(push.modified, 1500000000.25);
        assert!(push.body.is_none());
        assert!(push.source_device_iden.is_none());
    }

    #[test]
    fn test_stream_messages() {
        let nop: StreamMessage = serde_json::from_str(r#"{"type": "nop"}"#).unwrap();
        assert_eq!(nop, StreamMessage::Nop);

        let tickle: StreamMessage =
            serde_json::from_str(r#"{"type": "tickle", "subtype": "push"}"#).unwrap();
        assert!(tickle.is_push_tickle());

        let device_tickle: StreamMessage =
            serde_json::from_str(r#"{"type": "tickle", "subtype": "device"}"#).unwrap();
        assert!(!device_tickle.is_push_tickle());

        let ephemeral: StreamMessage =
            serde_json::from_str(r#"{"type": "push", "push": {"type": "mirror"}}"#).unwrap();
        assert!(matches!(ephemeral, StreamMessage::Push { .. }));

        let unknown: StreamMessage = serde_json::from_str(r#"{"type": "brand-new"}"#).unwrap();
        assert_eq!(unknown, StreamMessage::Other);
    }
}

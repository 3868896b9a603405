//! Message envelopes
//!
//! Inbound: `{ "type": string, "data": any }`.
//! Outbound: `{ "type": string, "data"?: any, "timestamp": number }`.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::connection::Frame;

/// Wire names of the built-in message types
pub mod kinds {
    pub const CONNECTED: &str = "connected";
    pub const PING: &str = "ping";
    pub const PONG: &str = "pong";
    pub const REQUEST_ANALYTICS: &str = "request_analytics";
    pub const ANALYTICS_UPDATE: &str = "analytics_update";
    pub const REQUEST_SYSTEM_STATUS: &str = "request_system_status";
    pub const SYSTEM_STATUS: &str = "system_status";
    pub const USER_ACTIVITY: &str = "user_activity";
    pub const JOB_UPDATE: &str = "job_update";
    pub const CONTENT_UPDATE: &str = "content_update";
    pub const NOTIFICATION: &str = "notification";

    /// Acknowledgement type for `kind`
    pub fn success(kind: &str) -> String {
        format!("{kind}_success")
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InboundMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}

impl InboundMessage {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundMessage {
    #[serde(rename = "type")]
    pub kind: Cow<'static, str>,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub data: Value,
    pub timestamp: i64,
}

impl OutboundMessage {
    pub fn new(kind: impl Into<Cow<'static, str>>, data: Value, timestamp: i64) -> Self {
        Self {
            kind: kind.into(),
            data,
            timestamp,
        }
    }

    /// Envelope without a `data` field
    pub fn bare(kind: impl Into<Cow<'static, str>>, timestamp: i64) -> Self {
        Self::new(kind, Value::Null, timestamp)
    }

    pub fn to_frame(&self) -> Option<Frame> {
        match serde_json::to_string(self) {
            Ok(json) => Some(Frame::from(json)),
            Err(e) => {
                tracing::error!(kind = %self.kind, error = %e, "Failed to serialize outbound message");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_inbound_data_defaults_to_null() {
        let msg = InboundMessage::parse(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(msg.kind, "ping");
        assert!(msg.data.is_null());
    }

    #[test]
    fn test_inbound_requires_type() {
        assert!(InboundMessage::parse(r#"{"data":{}}"#).is_err());
        assert!(InboundMessage::parse("not json").is_err());
    }

    #[test]
    fn test_bare_outbound_omits_data() {
        let frame = OutboundMessage::bare(kinds::PONG, 42).to_frame().unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value, json!({ "type": "pong", "timestamp": 42 }));
    }

    #[test]
    fn test_success_kind() {
        assert_eq!(kinds::success(kinds::JOB_UPDATE), "job_update_success");
    }
}

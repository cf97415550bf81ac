//! Request parsing and the outgoing envelope.
//!
//! Requests are flat: `{"messageType", "messageId", "sessionToken"?, ...fields}`.
//! A request may instead carry its fields under a `payload` object; both
//! shapes resolve to the same [`Request::body`].
//!
//! Every outgoing frame, response or push, uses one shape:
//! `{"messageType", "messageId", "timestamp", "payload": {"status", "data" | "message", "code"?}}`.

use chrono::{DateTime, Utc};
use lexis_core::LexisError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ProtocolError;
use crate::types::PushType;

const MESSAGE_TYPE: &str = "messageType";
const MESSAGE_ID: &str = "messageId";
const SESSION_TOKEN: &str = "sessionToken";
const PAYLOAD: &str = "payload";

/// A parsed incoming frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Request {
    pub message_type: String,
    /// Echoed back verbatim. Numeric ids are kept as their decimal text.
    pub message_id: Option<String>,
    pub session_token: Option<String>,
    /// Remaining fields, always a JSON object.
    pub body: Value,
}

impl Request {
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let value: Value =
            serde_json::from_str(line).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
        let Value::Object(mut fields) = value else {
            return Err(ProtocolError::Malformed("expected a JSON object".into()));
        };

        let message_id = match fields.remove(MESSAGE_ID) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(_) => {
                return Err(ProtocolError::Malformed(
                    "messageId must be a string or number".into(),
                ))
            }
        };

        let message_type = match fields.remove(MESSAGE_TYPE) {
            Some(Value::String(s)) if !s.trim().is_empty() => s,
            Some(Value::String(_)) | None | Some(Value::Null) => {
                return Err(ProtocolError::MissingField(MESSAGE_TYPE))
            }
            Some(_) => return Err(ProtocolError::Malformed("messageType must be a string".into())),
        };

        let mut session_token = take_token(&mut fields);

        // Nested form: fields live under "payload".
        if fields.len() == 1 && matches!(fields.get(PAYLOAD), Some(Value::Object(_))) {
            if let Some(Value::Object(inner)) = fields.remove(PAYLOAD) {
                fields = inner;
                if session_token.is_none() {
                    session_token = take_token(&mut fields);
                }
            }
        }

        Ok(Self {
            message_type,
            message_id,
            session_token,
            body: Value::Object(fields),
        })
    }

    /// Best-effort messageId recovery from a frame that failed to parse, so
    /// the error response can still be correlated.
    pub fn salvage_message_id(line: &str) -> Option<String> {
        let value: Value = serde_json::from_str(line).ok()?;
        match value.get(MESSAGE_ID)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

fn take_token(fields: &mut Map<String, Value>) -> Option<String> {
    match fields.remove(SESSION_TOKEN) {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        _ => None,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// One outgoing frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub message_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub payload: Payload,
}

impl Envelope {
    pub fn success(
        message_type: impl Into<String>,
        message_id: Option<String>,
        data: Value,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            message_type: message_type.into(),
            message_id,
            timestamp: now.timestamp_millis(),
            payload: Payload {
                status: Status::Success,
                data: Some(data),
                message: None,
                code: None,
            },
        }
    }

    /// Error envelope. Internal error details never reach the wire.
    pub fn error(
        message_type: impl Into<String>,
        message_id: Option<String>,
        err: &LexisError,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            message_type: message_type.into(),
            message_id,
            timestamp: now.timestamp_millis(),
            payload: Payload {
                status: Status::Error,
                data: None,
                message: Some(err.client_message()),
                code: Some(err.code().to_owned()),
            },
        }
    }

    pub fn push(kind: PushType, data: Value, now: DateTime<Utc>) -> Self {
        Self::success(kind.as_str(), None, data, now)
    }

    pub fn is_success(&self) -> bool {
        self.payload.status == Status::Success
    }

    /// The `data` object, or `Value::Null` for error envelopes.
    pub fn data(&self) -> &Value {
        self.payload.data.as_ref().unwrap_or(&Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn parse_flat_request() {
        let req = Request::parse(
            r#"{"messageType":"LOGIN_REQUEST","messageId":"7","email":"a@x.com","password":"p"}"#,
        )
        .unwrap();
        assert_eq!(req.message_type, "LOGIN_REQUEST");
        assert_eq!(req.message_id.as_deref(), Some("7"));
        assert!(req.session_token.is_none());
        assert_eq!(req.body["email"], "a@x.com");
        assert!(req.body.get("messageType").is_none());
    }

    #[test]
    fn parse_nested_payload_and_token() {
        let req = Request::parse(
            r#"{"messageType":"SEND_MESSAGE_REQUEST","messageId":3,"payload":{"sessionToken":"tok","recipientId":"usr_b","content":"hi"}}"#,
        )
        .unwrap();
        assert_eq!(req.message_id.as_deref(), Some("3"));
        assert_eq!(req.session_token.as_deref(), Some("tok"));
        assert_eq!(req.body["recipientId"], "usr_b");
        assert!(req.body.get("sessionToken").is_none());
    }

    #[test]
    fn top_level_token_wins() {
        let req = Request::parse(
            r#"{"messageType":"PING_REQUEST","sessionToken":"outer","payload":{"x":1}}"#,
        )
        .unwrap();
        assert_eq!(req.session_token.as_deref(), Some("outer"));
        assert_eq!(req.body["x"], 1);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_matches!(Request::parse("not json"), Err(ProtocolError::Malformed(_)));
        assert_matches!(Request::parse("[1,2]"), Err(ProtocolError::Malformed(_)));
        assert_matches!(
            Request::parse(r#"{"messageId":"1"}"#),
            Err(ProtocolError::MissingField("messageType"))
        );
        assert_matches!(
            Request::parse(r#"{"messageType":5}"#),
            Err(ProtocolError::Malformed(_))
        );
    }

    #[test]
    fn salvage_id_from_bad_frame() {
        assert_eq!(
            Request::salvage_message_id(r#"{"messageId":"9","messageType":7}"#).as_deref(),
            Some("9")
        );
        assert_eq!(Request::salvage_message_id("{{{"), None);
    }

    #[test]
    fn success_envelope_shape() {
        let now = Utc::now();
        let env = Envelope::success("PING_RESPONSE", Some("1".into()), json!({"ok": true}), now);
        let v = serde_json::to_value(&env).unwrap();
        assert_eq!(v["messageType"], "PING_RESPONSE");
        assert_eq!(v["messageId"], "1");
        assert_eq!(v["timestamp"], now.timestamp_millis());
        assert_eq!(v["payload"]["status"], "success");
        assert_eq!(v["payload"]["data"]["ok"], true);
        assert!(v["payload"].get("message").is_none());
    }

    #[test]
    fn error_envelope_carries_code_and_sanitises() {
        let env = Envelope::error(
            "ERROR_RESPONSE",
            None,
            &LexisError::Internal("lock poisoned at store.rs:42".into()),
            Utc::now(),
        );
        let v = serde_json::to_value(&env).unwrap();
        assert_eq!(v["payload"]["status"], "error");
        assert_eq!(v["payload"]["message"], "Internal error");
        assert_eq!(v["payload"]["code"], "INTERNAL_ERROR");
        assert!(v.get("messageId").is_none());
        assert!(!env.is_success());
        assert!(env.data().is_null());
    }

    #[test]
    fn push_envelope_has_no_message_id() {
        let env = Envelope::push(PushType::ReceiveMessage, json!({"content": "hi"}), Utc::now());
        assert_eq!(env.message_type, "RECEIVE_MESSAGE");
        assert!(env.message_id.is_none());
        assert!(env.is_success());
    }
}

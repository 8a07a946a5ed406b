use serde::{Deserialize, Serialize};
use serde_json::json;

/// Frame types of the graphql-ws protocol spoken by the realtime endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    ConnectionInit,
    ConnectionAck,
    ConnectionError,
    /// Keep-alive
    Ka,
    Start,
    StartAck,
    Data,
    Error,
    Stop,
    Complete,
}

/// A full frame sent or received over the WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeMessage {
    #[serde(rename = "type")]
    pub message_type: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl RealtimeMessage {
    pub fn connection_init() -> Self {
        Self {
            message_type: MessageType::ConnectionInit,
            id: None,
            payload: None,
        }
    }

    /// `data` is the JSON-encoded `{query, variables}` document.
    pub fn start(id: &str, data: String, authorization: serde_json::Value) -> Self {
        Self {
            message_type: MessageType::Start,
            id: Some(id.to_string()),
            payload: Some(json!({
                "data": data,
                "extensions": { "authorization": authorization }
            })),
        }
    }

    pub fn stop(id: &str) -> Self {
        Self {
            message_type: MessageType::Stop,
            id: Some(id.to_string()),
            payload: None,
        }
    }

    /// Keep-alive window announced by `connection_ack`
    pub fn connection_timeout_ms(&self) -> Option<u64> {
        self.payload
            .as_ref()
            .and_then(|p| p.get("connectionTimeoutMs"))
            .and_then(|v| v.as_u64())
    }

    /// Error messages carried by `error` and `connection_error` frames, joined
    pub fn error_text(&self) -> String {
        let errors = self
            .payload
            .as_ref()
            .and_then(|p| p.get("errors"))
            .and_then(|e| e.as_array());
        match errors {
            Some(errors) if !errors.is_empty() => errors
                .iter()
                .map(|e| {
                    let kind = e.get("errorType").and_then(|v| v.as_str());
                    let message = e
                        .get("message")
                        .and_then(|v| v.as_str())
                        .unwrap_or("unknown error");
                    match kind {
                        Some(kind) => format!("{}: {}", kind, message),
                        None => message.to_string(),
                    }
                })
                .collect::<Vec<_>>()
                .join("; "),
            _ => "unknown error".to_string(),
        }
    }
}

/// What a subscription yields
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionEvent {
    /// The `data` object of a `data` frame, e.g. `{"onCreateTodo": {...}}`
    Data(serde_json::Value),
    Error(String),
    Complete,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_type_names() {
        let init = serde_json::to_value(RealtimeMessage::connection_init()).unwrap();
        assert_eq!(init, json!({"type": "connection_init"}));

        let ka: RealtimeMessage = serde_json::from_str(r#"{"type":"ka"}"#).unwrap();
        assert_eq!(ka.message_type, MessageType::Ka);

        let ack: RealtimeMessage =
            serde_json::from_str(r#"{"type":"start_ack","id":"abc"}"#).unwrap();
        assert_eq!(ack.message_type, MessageType::StartAck);
        assert_eq!(ack.id.as_deref(), Some("abc"));
    }

    #[test]
    fn test_start_frame_carries_authorization() {
        let auth = json!({"host": "api.example.com", "Authorization": "jwt"});
        let frame = serde_json::to_value(RealtimeMessage::start(
            "sub-1",
            "{\"query\":\"subscription { x }\"}".to_string(),
            auth.clone(),
        ))
        .unwrap();
        assert_eq!(frame["type"], "start");
        assert_eq!(frame["id"], "sub-1");
        assert_eq!(frame["payload"]["extensions"]["authorization"], auth);
        assert!(frame["payload"]["data"].is_string());
    }

    #[test]
    fn test_connection_ack_timeout() {
        let ack: RealtimeMessage = serde_json::from_str(
            r#"{"type":"connection_ack","payload":{"connectionTimeoutMs":300000}}"#,
        )
        .unwrap();
        assert_eq!(ack.connection_timeout_ms(), Some(300_000));
    }

    #[test]
    fn test_error_text() {
        let err: RealtimeMessage = serde_json::from_str(
            r#"{"type":"error","id":"x","payload":{"errors":[{"errorType":"Unauthorized","message":"Not Authorized to access onCreateTodo"}]}}"#,
        )
        .unwrap();
        assert_eq!(
            err.error_text(),
            "Unauthorized: Not Authorized to access onCreateTodo"
        );
        assert_eq!(RealtimeMessage::stop("x").error_text(), "unknown error");
    }
}

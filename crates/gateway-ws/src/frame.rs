use gateway_core::{now_ms, ErrorCode, Message};
use serde_json::{json, Value};

/// Client→server frames (spec §6). Parsed by hand rather than via a derived
/// tagged enum so an unrecognized `type` lands in [`FrameError::UnknownType`]
/// instead of failing the whole deserialization (spec §9: "unknown types
/// land in a catch-all variant that triggers the ERROR path").
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Ping { id: String },
    UserMessage { content: String },
    Subscribe { symbols: Vec<String> },
    Unsubscribe { symbols: Vec<String> },
    GetSubscriptions,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameError {
    MalformedJson,
    UnknownType(String),
}

fn string_array(value: &Value, field: &str) -> Vec<String> {
    value
        .get(field)
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

/// Parses one text frame (spec §4.G frame routing, §6 client→server shapes).
pub fn parse_inbound(text: &str) -> Result<InboundFrame, FrameError> {
    let value: Value = serde_json::from_str(text).map_err(|_| FrameError::MalformedJson)?;
    let kind = value.get("type").and_then(Value::as_str).unwrap_or("");
    match kind {
        "PING" => Ok(InboundFrame::Ping {
            id: value.get("id").and_then(Value::as_str).unwrap_or_default().to_string(),
        }),
        "USER_MESSAGE" => Ok(InboundFrame::UserMessage {
            content: value.get("content").and_then(Value::as_str).unwrap_or_default().to_string(),
        }),
        "SUBSCRIBE" => Ok(InboundFrame::Subscribe {
            symbols: string_array(&value, "symbols"),
        }),
        "UNSUBSCRIBE" => Ok(InboundFrame::Unsubscribe {
            symbols: string_array(&value, "symbols"),
        }),
        "GET_SUBSCRIPTIONS" => Ok(InboundFrame::GetSubscriptions),
        other => Err(FrameError::UnknownType(other.to_string())),
    }
}

/// `CONNECTION_ESTABLISHED` (spec §6).
pub fn connection_established(session_id: &str) -> Value {
    json!({"type": "CONNECTION_ESTABLISHED", "sessionId": session_id, "timestamp": now_ms()})
}

/// `PONG` (spec §6, §4.G).
pub fn pong(id: &str) -> Value {
    json!({"type": "PONG", "id": id, "timestamp": now_ms()})
}

/// `ASSISTANT_MESSAGE` (spec §6, §4.F step 9).
pub fn assistant_message(message: &Message) -> Value {
    let mut value = serde_json::to_value(message).unwrap_or(Value::Null);
    if let Value::Object(ref mut obj) = value {
        obj.insert("type".to_string(), Value::String("ASSISTANT_MESSAGE".to_string()));
        obj.insert("timestamp".to_string(), Value::from(now_ms()));
    }
    value
}

/// `ERROR` (spec §6, §4.G malformed/unknown-frame path). `id` correlates
/// the request when one was recoverable from the malformed input.
pub fn error_frame(message: &str, code: ErrorCode, status_code: u16, id: Option<&str>) -> Value {
    json!({
        "type": "ERROR",
        "id": id,
        "error": {
            "message": message,
            "code": code.to_string(),
            "statusCode": status_code,
            "timestamp": now_ms(),
        },
        "timestamp": now_ms(),
    })
}

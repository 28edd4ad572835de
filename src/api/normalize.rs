use crate::api::stream::{EventRecord, EventType};
use serde_json::Value;

pub const UNKNOWN_TOOL_NAME: &str = "unknown_tool";
const DEFAULT_TOOL_OUTPUT: &str = "No result";
const DEFAULT_ERROR_TEXT: &str = "Unknown error";

/// Canonical event shape consumed by the session reducer. Producers spell the
/// same field several ways (`content`/`text`, `name`/`tool`,
/// `input`/`params`/`arguments`, `output`/`result`, `error`/`message`); all
/// of that alternation is resolved here and nowhere else.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    Start,
    Message {
        text: String,
    },
    Thinking {
        text: String,
    },
    ToolCall {
        id: Option<String>,
        name: String,
        arguments: Value,
    },
    ToolResult {
        id: Option<String>,
        name: Option<String>,
        output: String,
    },
    ToolError {
        id: Option<String>,
        name: Option<String>,
        error: String,
    },
    Error {
        message: String,
    },
    Done,
    End,
}

pub fn normalize(record: EventRecord) -> ChatEvent {
    let data = record.data.unwrap_or(Value::Null);
    match record.event_type {
        EventType::Start => ChatEvent::Start,
        EventType::Message => ChatEvent::Message {
            text: text_field(&data),
        },
        EventType::Thinking => ChatEvent::Thinking {
            text: text_field(&data),
        },
        EventType::ToolCall => ChatEvent::ToolCall {
            id: id_field(&data),
            name: tool_name(&data).unwrap_or_else(|| UNKNOWN_TOOL_NAME.to_string()),
            arguments: arguments_field(&data),
        },
        EventType::ToolResult => ChatEvent::ToolResult {
            id: id_field(&data),
            name: tool_name(&data),
            output: resolve_tool_output(record.raw_output, &data),
        },
        EventType::ToolError => ChatEvent::ToolError {
            id: id_field(&data),
            name: tool_name(&data),
            error: record
                .raw_error
                .or_else(|| error_text(&data))
                .unwrap_or_else(|| DEFAULT_ERROR_TEXT.to_string()),
        },
        EventType::Error => ChatEvent::Error {
            message: error_text(&data).unwrap_or_else(|| DEFAULT_ERROR_TEXT.to_string()),
        },
        EventType::Done => ChatEvent::Done,
        EventType::End => ChatEvent::End,
    }
}

fn text_field(data: &Value) -> String {
    string_of(data.get("content"))
        .or_else(|| string_of(data.get("text")))
        .unwrap_or_default()
}

fn id_field(data: &Value) -> Option<String> {
    string_of(data.get("id"))
}

fn tool_name(data: &Value) -> Option<String> {
    string_of(data.get("name")).or_else(|| string_of(data.get("tool")))
}

fn arguments_field(data: &Value) -> Value {
    for key in ["input", "params", "arguments"] {
        if let Some(value) = data.get(key) {
            if !value.is_null() {
                return value.clone();
            }
        }
    }
    Value::Object(serde_json::Map::new())
}

fn error_text(data: &Value) -> Option<String> {
    string_of(data.get("error")).or_else(|| string_of(data.get("message")))
}

/// The raw `output:` line wins over the JSON payload. A structured value is
/// collapsed to its first element's `text` property when it has one, and
/// pretty-printed otherwise; a result is never left empty.
fn resolve_tool_output(raw_output: Option<String>, data: &Value) -> String {
    if let Some(raw) = raw_output {
        if !raw.is_empty() {
            return raw;
        }
    }

    let payload = data
        .get("output")
        .filter(|v| !v.is_null())
        .or_else(|| data.get("result").filter(|v| !v.is_null()));
    let Some(payload) = payload else {
        return DEFAULT_TOOL_OUTPUT.to_string();
    };

    match payload {
        Value::String(text) if !text.is_empty() => text.clone(),
        Value::String(_) => DEFAULT_TOOL_OUTPUT.to_string(),
        Value::Array(items) => match items.first() {
            Some(Value::Object(obj)) if obj.get("text").is_some_and(Value::is_string) => obj
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_TOOL_OUTPUT)
                .to_string(),
            Some(_) => pretty_or_default(payload),
            None => DEFAULT_TOOL_OUTPUT.to_string(),
        },
        other => pretty_or_default(other),
    }
}

fn pretty_or_default(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| DEFAULT_TOOL_OUTPUT.to_string())
}

fn string_of(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(ToOwned::to_owned)
}

//! Wire records of the line-delimited event stream emitted by the driven CLI.
//!
//! Every field is defaulted: the producer omits fields freely, and a missing
//! field or an explicit `null` must read the same as an empty one.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// `null` decodes to the type's default instead of failing.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Top-level discriminator shared by every record.
#[derive(Debug, Default, Deserialize)]
pub(super) struct RecordKind {
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: String,
}

// ── stream_event ─────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub(super) struct StreamEventRecord {
    #[serde(default, deserialize_with = "null_as_default")]
    pub event: StreamEvent,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct StreamEvent {
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content_block: StreamContentBlock,
    #[serde(default, deserialize_with = "null_as_default")]
    pub delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct StreamContentBlock {
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct StreamDelta {
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub partial_json: String,
}

// ── user (tool results) ──────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub(super) struct UserRecord {
    #[serde(default)]
    pub tool_use_result: Value,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: UserMessage,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct UserMessage {
    /// Normally a list of [`ToolResultEntry`]; any other shape carries no
    /// entries.
    #[serde(default)]
    pub content: Value,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct ToolResultEntry {
    #[serde(default, deserialize_with = "null_as_default")]
    pub tool_use_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_error: bool,
    #[serde(default)]
    pub content: Value,
}

impl UserMessage {
    pub fn entries(&self) -> Vec<ToolResultEntry> {
        self.content
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| ToolResultEntry::deserialize(item).ok())
                    .collect()
            })
            .unwrap_or_default()
    }
}

// ── result (session end) ─────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub(super) struct ResultRecord {
    #[serde(default, deserialize_with = "null_as_default")]
    pub subtype: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub result: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub duration_ms: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_cost_usd: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub usage: ResultUsage,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct ResultUsage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub input_tokens: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub output_tokens: i64,
}

// ── proxy_error ──────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub(super) struct ProxyErrorRecord {
    #[serde(default, deserialize_with = "null_as_default")]
    pub error: String,
}

/// Text form of a JSON value: strings unquoted, `null` empty, anything else
/// as its compact JSON encoding. Always trimmed.
pub(super) fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        other => other.to_string().trim().to_string(),
    }
}

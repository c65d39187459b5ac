//! Turn parser for the driven CLI's line-delimited event stream.
//!
//! [`StreamParser`] consumes one line at a time and yields finished chat
//! messages. Narrative text is buffered per turn; a turn that requested tools
//! is held back per invocation id until the matching tool result arrives, at
//! which point the narrative and a rendering of the outcome go out together.
//!
//! One parser instance serves one session and is never shared across threads.

mod events;
mod render;

use crate::error::StreamError;
use events::{
    ProxyErrorRecord, RecordKind, ResultRecord, StreamEventRecord, UserRecord, value_text,
};
use render::{extract_tool_use_error, format_turn_message, format_usage_footer};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;

const GENERIC_TOOL_ERROR: &str = "tool call failed";

/// Text sent for a `proxy_error` record, followed by the error detail.
pub const PROXY_ERROR_PREFIX: &str = "proxy call failed";

/// A tool call requested by the model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    pub input: Map<String, Value>,
}

/// Outcome of one tool call, assembled from a `user` record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolResult {
    pub tool_use_id: String,
    pub is_error: bool,
    pub error_text: String,
    pub stdout: String,
    pub num_lines: Option<u64>,
}

#[derive(Debug, Default)]
struct AssistantTurn {
    narrative: String,
    invocations: Vec<ToolInvocation>,
}

#[derive(Debug)]
enum ContentBlock {
    Text(String),
    ToolUse {
        id: String,
        name: String,
        partial_json: String,
    },
    Unsupported,
}

#[derive(Debug)]
struct PendingTurn {
    narrative: String,
    invocation: ToolInvocation,
}

#[derive(Debug, Default)]
pub struct StreamParser {
    current_turn: Option<AssistantTurn>,
    current_block: Option<ContentBlock>,
    pending: HashMap<String, PendingTurn>,
    pending_final_text: String,
}

impl StreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one raw line. A line that is not a well-formed record returns an
    /// error and leaves the parser state untouched.
    pub fn feed_line(&mut self, line: &str) -> Result<Vec<String>, StreamError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Vec::new());
        }

        let value: Value = serde_json::from_str(line)?;
        if !value.is_object() {
            return Err(StreamError::NotAnObject);
        }

        let kind = RecordKind::deserialize(&value)?;
        match kind.kind.as_str() {
            "stream_event" => {
                self.handle_stream_event(StreamEventRecord::deserialize(&value)?);
                Ok(Vec::new())
            }
            "user" => {
                let record = UserRecord::deserialize(&value)?;
                Ok(self.handle_tool_result(&record).into_iter().collect())
            }
            "result" => {
                let record = ResultRecord::deserialize(&value)?;
                Ok(self.handle_final_result(&record).into_iter().collect())
            }
            "system" | "assistant" => Ok(Vec::new()),
            "proxy_error" => Ok(vec![format_proxy_error(line, &value)]),
            _ => Ok(vec![line.to_string()]),
        }
    }

    /// Drain narrative that never saw a terminating `result` record.
    pub fn flush(&mut self) -> Vec<String> {
        let text = std::mem::take(&mut self.pending_final_text);
        if text.trim().is_empty() {
            Vec::new()
        } else {
            vec![text]
        }
    }

    /// Number of tool invocations still waiting for their result.
    pub fn pending_tool_calls(&self) -> usize {
        self.pending.len()
    }

    fn handle_stream_event(&mut self, record: StreamEventRecord) {
        let event = record.event;
        match event.kind.as_str() {
            "message_start" => {
                self.current_turn = Some(AssistantTurn::default());
            }
            "content_block_start" => {
                let block = event.content_block;
                self.current_block = Some(match block.kind.trim() {
                    "text" => ContentBlock::Text(String::new()),
                    "tool_use" => ContentBlock::ToolUse {
                        id: block.id.trim().to_string(),
                        name: block.name.trim().to_string(),
                        partial_json: String::new(),
                    },
                    _ => ContentBlock::Unsupported,
                });
            }
            "content_block_delta" => match self.current_block.as_mut() {
                Some(ContentBlock::Text(text)) => text.push_str(&event.delta.text),
                Some(ContentBlock::ToolUse { partial_json, .. }) => {
                    partial_json.push_str(&event.delta.partial_json);
                }
                Some(ContentBlock::Unsupported) | None => {}
            },
            "content_block_stop" => self.finish_block(),
            "message_stop" => self.finish_turn(),
            _ => {}
        }
    }

    fn finish_block(&mut self) {
        let Some(block) = self.current_block.take() else {
            return;
        };
        let Some(turn) = self.current_turn.as_mut() else {
            return;
        };

        match block {
            // Text after a tool call in the same turn is replay noise.
            ContentBlock::Text(text) => {
                if turn.invocations.is_empty() {
                    turn.narrative.push_str(&text);
                }
            }
            ContentBlock::ToolUse {
                id,
                name,
                partial_json,
            } => {
                let raw = partial_json.trim();
                let input = if raw.is_empty() {
                    Map::new()
                } else {
                    serde_json::from_str::<Map<String, Value>>(raw).unwrap_or_default()
                };
                turn.invocations.push(ToolInvocation { id, name, input });
            }
            ContentBlock::Unsupported => {}
        }
    }

    fn finish_turn(&mut self) {
        let Some(turn) = self.current_turn.take() else {
            return;
        };

        let narrative = turn.narrative.trim();
        if turn.invocations.is_empty() {
            if !narrative.is_empty() {
                self.pending_final_text = narrative.to_string();
            }
            return;
        }

        for (index, invocation) in turn.invocations.into_iter().enumerate() {
            if invocation.id.trim().is_empty() {
                continue;
            }
            let narrative = if index == 0 {
                narrative.to_string()
            } else {
                String::new()
            };
            self.pending.insert(
                invocation.id.clone(),
                PendingTurn {
                    narrative,
                    invocation,
                },
            );
        }
    }

    fn handle_tool_result(&mut self, record: &UserRecord) -> Option<String> {
        let mut result = ToolResult::default();
        for entry in record.message.entries() {
            let id = entry.tool_use_id.trim();
            if !id.is_empty() {
                result.tool_use_id = id.to_string();
            }
            if entry.is_error {
                result.is_error = true;
            }
            if let Some(message) = extract_tool_use_error(&value_text(&entry.content)) {
                result.is_error = true;
                result.error_text = message;
            }
        }
        if result.tool_use_id.is_empty() {
            return None;
        }

        merge_raw_tool_result(&mut result, &record.tool_use_result);
        if result.is_error && result.error_text.trim().is_empty() {
            result.error_text = GENERIC_TOOL_ERROR.to_string();
        }

        let turn = self.pending.remove(&result.tool_use_id)?;
        let message = format_turn_message(&turn.narrative, &turn.invocation, &result);
        (!message.trim().is_empty()).then_some(message)
    }

    fn handle_final_result(&mut self, record: &ResultRecord) -> Option<String> {
        if record.subtype.trim() != "success" {
            return None;
        }

        let pending = std::mem::take(&mut self.pending_final_text);
        let mut body = pending.trim();
        if body.is_empty() {
            body = record.result.trim();
        }

        let footer = format_usage_footer(
            record.duration_ms,
            record.total_cost_usd,
            record.usage.input_tokens,
            record.usage.output_tokens,
        );
        match (body.is_empty(), footer.is_empty()) {
            (true, true) => None,
            (true, false) => Some(footer),
            (false, true) => Some(body.to_string()),
            (false, false) => Some(format!("{body}\n\n{footer}")),
        }
    }
}

/// Fold the supplementary `tool_use_result` field into `result`.
fn merge_raw_tool_result(result: &mut ToolResult, raw: &Value) {
    match raw {
        Value::String(text) => {
            let mut text = text.trim();
            if text
                .get(..6)
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case("error:"))
            {
                result.is_error = true;
                text = text[6..].trim();
            }
            if result.is_error && !text.is_empty() && result.error_text.is_empty() {
                result.error_text = text.to_string();
            }
        }
        Value::Object(fields) => {
            let stdout = str_field(fields, "stdout");
            if !stdout.is_empty() {
                result.stdout = stdout.to_string();
            }
            if let Some(lines) = fields
                .get("file")
                .and_then(|file| file.get("numLines"))
                .and_then(Value::as_u64)
                .filter(|lines| *lines > 0)
            {
                result.num_lines = Some(lines);
            }
            let stderr = str_field(fields, "stderr");
            if !stderr.is_empty() {
                result.is_error = true;
                if result.error_text.is_empty() {
                    result.error_text = stderr.to_string();
                }
            }
        }
        _ => {}
    }
}

fn str_field<'a>(fields: &'a Map<String, Value>, name: &str) -> &'a str {
    fields
        .get(name)
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default()
}

fn format_proxy_error(line: &str, value: &Value) -> String {
    match ProxyErrorRecord::deserialize(value) {
        Ok(record) => {
            let message = record.error.trim();
            let message = if message.is_empty() { line } else { message };
            format!("{PROXY_ERROR_PREFIX}: {message}")
        }
        Err(_) => line.to_string(),
    }
}

#[cfg(test)]
mod tests;

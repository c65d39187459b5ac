use super::{ToolInvocation, ToolResult};
use crate::utils::text::{block_quote_lines, sanitize_line};
use serde_json::{Map, Value};

/// Narrative header followed by the tool callout, separated by a blank line.
pub(super) fn format_turn_message(
    narrative: &str,
    invocation: &ToolInvocation,
    result: &ToolResult,
) -> String {
    let header = narrative.trim();
    let action = format_tool_action(invocation, result);
    match (header.is_empty(), action.is_empty()) {
        (true, _) => action,
        (false, true) => header.to_string(),
        (false, false) => format!("{header}\n\n{action}"),
    }
}

pub(super) fn format_tool_action(invocation: &ToolInvocation, result: &ToolResult) -> String {
    let error = sanitize_line(&result.error_text);
    match invocation.name.trim().to_lowercase().as_str() {
        "write" => {
            let file = base_name_from_input(&invocation.input, "file_path");
            if result.is_error {
                format!("> {file} write intercepted: {error}")
            } else {
                format!("> {file} written, ok")
            }
        }
        "read" => {
            let file = base_name_from_input(&invocation.input, "file_path");
            if result.is_error {
                format!("> {file} read intercepted: {error}")
            } else if let Some(lines) = result.num_lines {
                format!("> {file} read ok ({lines} lines)")
            } else {
                format!("> {file} read ok")
            }
        }
        "bash" | "shell" => {
            let mut command = sanitize_line(&string_from_input(&invocation.input, "command"));
            if command.is_empty() {
                command = "(empty command)".into();
            }
            if result.is_error {
                return format!("> $ {command}\n>\n> intercepted: {error}");
            }
            let stdout = result.stdout.trim();
            if stdout.is_empty() {
                format!("> $ {command}\n>\n> (no output)")
            } else {
                format!(
                    "> $ {command}\n>\n> ```\n{}\n> ```",
                    block_quote_lines(stdout)
                )
            }
        }
        _ => {
            let name = sanitize_line(&invocation.name);
            if result.is_error {
                format!("> {name} intercepted: {error}")
            } else {
                format!("> {name} invoked, ok")
            }
        }
    }
}

pub(super) fn format_usage_footer(
    duration_ms: i64,
    cost_usd: f64,
    input_tokens: i64,
    output_tokens: i64,
) -> String {
    #[allow(clippy::cast_precision_loss)]
    let seconds = duration_ms as f64 / 1000.0;
    format!(
        "> ⏱️ {seconds:.1}s  |  🪙 est. ${cost_usd:.2}  |  📊 IN: {} / OUT: {} tokens",
        abbrev_tokens(input_tokens),
        abbrev_tokens(output_tokens),
    )
}

/// `999` stays as is, `1500` becomes `1.5k`, `2000` becomes `2k`.
pub(super) fn abbrev_tokens(value: i64) -> String {
    if value >= 1000 {
        #[allow(clippy::cast_precision_loss)]
        let thousands = value as f64 / 1000.0;
        let formatted = format!("{thousands:.1}");
        let trimmed = formatted.strip_suffix(".0").unwrap_or(&formatted);
        format!("{trimmed}k")
    } else {
        value.to_string()
    }
}

fn string_from_input(input: &Map<String, Value>, key: &str) -> String {
    input
        .get(key)
        .map(super::events::value_text)
        .unwrap_or_default()
}

fn base_name_from_input(input: &Map<String, Value>, key: &str) -> String {
    let path = string_from_input(input, key);
    if path.is_empty() {
        return "unknown".into();
    }
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/".into();
    }
    trimmed
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or(trimmed)
        .to_string()
}

/// Inner text of the first `<tool_use_error>...</tool_use_error>` span, trimmed.
pub(super) fn extract_tool_use_error(text: &str) -> Option<String> {
    const OPEN: &str = "<tool_use_error>";
    const CLOSE: &str = "</tool_use_error>";

    let start = text.find(OPEN)? + OPEN.len();
    let len = text[start..].find(CLOSE)?;
    let inner = text[start..start + len].trim();
    (!inner.is_empty()).then(|| inner.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn invocation(name: &str, input: Value) -> ToolInvocation {
        ToolInvocation {
            id: "toolu_1".into(),
            name: name.into(),
            input: input.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn abbrev_tokens_thresholds() {
        assert_eq!(abbrev_tokens(0), "0");
        assert_eq!(abbrev_tokens(999), "999");
        assert_eq!(abbrev_tokens(1000), "1k");
        assert_eq!(abbrev_tokens(1500), "1.5k");
        assert_eq!(abbrev_tokens(23_400), "23.4k");
    }

    #[test]
    fn footer_formats_seconds_cost_and_tokens() {
        let footer = format_usage_footer(12_340, 0.0567, 1200, 340);
        assert_eq!(
            footer,
            "> ⏱️ 12.3s  |  🪙 est. $0.06  |  📊 IN: 1.2k / OUT: 340 tokens"
        );
    }

    #[test]
    fn extract_tool_use_error_spans_lines() {
        let text = "prefix <tool_use_error>\n  denied by policy\n</tool_use_error> tail";
        assert_eq!(
            extract_tool_use_error(text).as_deref(),
            Some("denied by policy")
        );
        assert_eq!(extract_tool_use_error("no marker here"), None);
        assert_eq!(
            extract_tool_use_error("<tool_use_error>   </tool_use_error>"),
            None
        );
    }

    #[test]
    fn file_tools_use_base_name_or_unknown() {
        let ok = ToolResult::default();
        let write = invocation("Write", json!({"file_path": "/tmp/work/notes.md"}));
        assert_eq!(format_tool_action(&write, &ok), "> notes.md written, ok");

        let nameless = invocation("write", json!({}));
        assert_eq!(format_tool_action(&nameless, &ok), "> unknown written, ok");
    }

    #[test]
    fn unknown_tool_gets_generic_rendering() {
        let failed = ToolResult {
            is_error: true,
            error_text: "quota\nexceeded".into(),
            ..ToolResult::default()
        };
        let tool = invocation("WebFetch", json!({"url": "https://example.com"}));
        assert_eq!(
            format_tool_action(&tool, &failed),
            "> WebFetch intercepted: quota exceeded"
        );
        assert_eq!(
            format_tool_action(&tool, &ToolResult::default()),
            "> WebFetch invoked, ok"
        );
    }

    #[test]
    fn shell_without_output_uses_marker() {
        let tool = invocation("SHELL", json!({"command": "true"}));
        assert_eq!(
            format_tool_action(&tool, &ToolResult::default()),
            "> $ true\n>\n> (no output)"
        );
    }

    #[test]
    fn turn_message_joins_header_and_action() {
        let tool = invocation("read", json!({"file_path": "a/b.rs"}));
        let result = ToolResult {
            num_lines: Some(3),
            ..ToolResult::default()
        };
        assert_eq!(
            format_turn_message("  Looking.  ", &tool, &result),
            "Looking.\n\n> b.rs read ok (3 lines)"
        );
        assert_eq!(
            format_turn_message("", &tool, &result),
            "> b.rs read ok (3 lines)"
        );
    }
}

use super::*;
use serde_json::json;

fn line(value: &Value) -> String {
    value.to_string()
}

fn event(body: Value) -> String {
    line(&json!({"type": "stream_event", "event": body}))
}

fn feed_all(parser: &mut StreamParser, lines: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    for l in lines {
        out.extend(parser.feed_line(l).unwrap());
    }
    out
}

fn text_turn(text: &str) -> Vec<String> {
    vec![
        event(json!({"type": "message_start", "message": {"id": "msg_1"}})),
        event(json!({"type": "content_block_start", "content_block": {"type": "text"}})),
        event(json!({"type": "content_block_delta", "delta": {"type": "text_delta", "text": text}})),
        event(json!({"type": "content_block_stop"})),
        event(json!({"type": "message_stop"})),
    ]
}

fn tool_block(id: &str, name: &str, input_json: &str) -> Vec<String> {
    vec![
        event(json!({
            "type": "content_block_start",
            "content_block": {"type": "tool_use", "id": id, "name": name}
        })),
        event(json!({
            "type": "content_block_delta",
            "delta": {"type": "input_json_delta", "partial_json": input_json}
        })),
        event(json!({"type": "content_block_stop"})),
    ]
}

fn tool_result(id: &str, content: &str, raw: Value) -> String {
    line(&json!({
        "type": "user",
        "message": {"content": [{"type": "tool_result", "tool_use_id": id, "content": content}]},
        "tool_use_result": raw,
    }))
}

fn success(result: &str) -> String {
    line(&json!({
        "type": "result",
        "subtype": "success",
        "result": result,
        "duration_ms": 4200,
        "total_cost_usd": 0.1271,
        "usage": {"input_tokens": 15_300, "output_tokens": 820}
    }))
}

#[test]
fn blank_lines_produce_nothing() {
    let mut parser = StreamParser::new();
    assert!(parser.feed_line("").unwrap().is_empty());
    assert!(parser.feed_line("   \t ").unwrap().is_empty());
}

#[test]
fn malformed_line_is_an_error_without_output() {
    let mut parser = StreamParser::new();
    assert!(parser.feed_line("{not json").is_err());
    assert!(parser.feed_line("[1, 2").is_err());
}

#[test]
fn system_and_assistant_records_are_ignored() {
    let mut parser = StreamParser::new();
    assert!(parser.feed_line(r#"{"type":"system","subtype":"init"}"#).unwrap().is_empty());
    assert!(parser.feed_line(r#"{"type":"assistant","message":{}}"#).unwrap().is_empty());
}

#[test]
fn unknown_record_passes_through_verbatim() {
    let mut parser = StreamParser::new();
    let raw = r#"{"type":"rate_limit","retry_after":3}"#;
    assert_eq!(parser.feed_line(raw).unwrap(), vec![raw.to_string()]);
}

#[test]
fn proxy_error_uses_embedded_text_or_raw_line() {
    let mut parser = StreamParser::new();
    assert_eq!(
        parser
            .feed_line(r#"{"type":"proxy_error","error":"  cli exited 1 "}"#)
            .unwrap(),
        vec!["proxy call failed: cli exited 1".to_string()]
    );

    let empty = r#"{"type":"proxy_error","error":""}"#;
    assert_eq!(
        parser.feed_line(empty).unwrap(),
        vec![format!("proxy call failed: {empty}")]
    );

    let odd = r#"{"type":"proxy_error","error":42}"#;
    assert_eq!(parser.feed_line(odd).unwrap(), vec![odd.to_string()]);
}

#[test]
fn narrative_only_turn_waits_for_result() {
    let mut parser = StreamParser::new();
    assert!(feed_all(&mut parser, &text_turn("  All done.  ")).is_empty());

    let out = parser.feed_line(&success("")).unwrap();
    assert_eq!(
        out,
        vec!["All done.\n\n> ⏱️ 4.2s  |  🪙 est. $0.13  |  📊 IN: 15.3k / OUT: 820 tokens".to_string()]
    );
    assert!(parser.flush().is_empty());
}

#[test]
fn later_no_tool_turn_overwrites_pending_text() {
    let mut parser = StreamParser::new();
    feed_all(&mut parser, &text_turn("first draft"));
    feed_all(&mut parser, &text_turn("final answer"));
    assert_eq!(parser.flush(), vec!["final answer".to_string()]);
}

#[test]
fn result_text_is_used_when_nothing_pending() {
    let mut parser = StreamParser::new();
    let out = parser.feed_line(&success("short summary")).unwrap();
    assert_eq!(out.len(), 1);
    assert!(out[0].starts_with("short summary\n\n> ⏱️ 4.2s"));
}

#[test]
fn non_success_result_is_silent_but_keeps_pending_text() {
    let mut parser = StreamParser::new();
    feed_all(&mut parser, &text_turn("partial"));
    let out = parser
        .feed_line(r#"{"type":"result","subtype":"error_max_turns"}"#)
        .unwrap();
    assert!(out.is_empty());
    assert_eq!(parser.flush(), vec!["partial".to_string()]);
}

#[test]
fn tool_turn_emits_on_matching_result() {
    let mut parser = StreamParser::new();
    let mut lines = vec![
        event(json!({"type": "message_start", "message": {"id": "m"}})),
        event(json!({"type": "content_block_start", "content_block": {"type": "text"}})),
        event(json!({"type": "content_block_delta", "delta": {"text": "Checking the file."}})),
        event(json!({"type": "content_block_stop"})),
    ];
    lines.extend(tool_block("toolu_a", "Read", r#"{"file_path":"/repo/src/main.rs"}"#));
    lines.push(event(json!({"type": "message_stop"})));
    assert!(feed_all(&mut parser, &lines).is_empty());
    assert_eq!(parser.pending_tool_calls(), 1);

    let out = parser
        .feed_line(&tool_result("toolu_a", "ok", json!({"file": {"numLines": 42}})))
        .unwrap();
    assert_eq!(
        out,
        vec!["Checking the file.\n\n> main.rs read ok (42 lines)".to_string()]
    );
    assert_eq!(parser.pending_tool_calls(), 0);
}

#[test]
fn unmatched_tool_result_is_dropped() {
    let mut parser = StreamParser::new();
    let out = parser
        .feed_line(&tool_result("toolu_missing", "ok", Value::Null))
        .unwrap();
    assert!(out.is_empty());
}

#[test]
fn narrative_attaches_only_to_first_invocation() {
    let mut parser = StreamParser::new();
    let mut lines = vec![
        event(json!({"type": "message_start"})),
        event(json!({"type": "content_block_start", "content_block": {"type": "text"}})),
        event(json!({"type": "content_block_delta", "delta": {"text": "Two steps."}})),
        event(json!({"type": "content_block_stop"})),
    ];
    lines.extend(tool_block("t1", "Write", r#"{"file_path":"a.txt"}"#));
    lines.extend(tool_block("t2", "Write", r#"{"file_path":"b.txt"}"#));
    lines.push(event(json!({"type": "message_stop"})));
    feed_all(&mut parser, &lines);

    let second = parser.feed_line(&tool_result("t2", "ok", Value::Null)).unwrap();
    let first = parser.feed_line(&tool_result("t1", "ok", Value::Null)).unwrap();
    assert_eq!(second, vec!["> b.txt written, ok".to_string()]);
    assert_eq!(first, vec!["Two steps.\n\n> a.txt written, ok".to_string()]);
}

#[test]
fn text_after_tool_use_in_same_turn_is_dropped() {
    let mut parser = StreamParser::new();
    let mut lines = vec![event(json!({"type": "message_start"}))];
    lines.extend(tool_block("t1", "Bash", r#"{"command":"ls"}"#));
    lines.extend([
        event(json!({"type": "content_block_start", "content_block": {"type": "text"}})),
        event(json!({"type": "content_block_delta", "delta": {"text": "[User] <tool_result>"}})),
        event(json!({"type": "content_block_stop"})),
        event(json!({"type": "message_stop"})),
    ]);
    feed_all(&mut parser, &lines);

    let out = parser
        .feed_line(&tool_result("t1", "", json!({"stdout": "a\nb"})))
        .unwrap();
    assert_eq!(out, vec!["> $ ls\n>\n> ```\n> a\n> b\n> ```".to_string()]);
}

#[test]
fn invalid_tool_input_becomes_empty_mapping() {
    let mut parser = StreamParser::new();
    let mut lines = vec![event(json!({"type": "message_start"}))];
    lines.extend(tool_block("t1", "Write", r#"{"file_path": "trunc"#));
    lines.push(event(json!({"type": "message_stop"})));
    feed_all(&mut parser, &lines);

    let out = parser.feed_line(&tool_result("t1", "ok", Value::Null)).unwrap();
    assert_eq!(out, vec!["> unknown written, ok".to_string()]);
}

#[test]
fn invocation_without_id_is_never_registered() {
    let mut parser = StreamParser::new();
    let mut lines = vec![event(json!({"type": "message_start"}))];
    lines.extend(tool_block("  ", "Write", "{}"));
    lines.push(event(json!({"type": "message_stop"})));
    feed_all(&mut parser, &lines);
    assert_eq!(parser.pending_tool_calls(), 0);
}

#[test]
fn block_events_without_open_block_are_ignored() {
    let mut parser = StreamParser::new();
    let lines = vec![
        event(json!({"type": "content_block_delta", "delta": {"text": "orphan"}})),
        event(json!({"type": "content_block_stop"})),
        event(json!({"type": "message_stop"})),
    ];
    assert!(feed_all(&mut parser, &lines).is_empty());
    assert!(parser.flush().is_empty());
}

#[test]
fn error_marker_forces_error_flag() {
    let mut parser = StreamParser::new();
    let mut lines = vec![event(json!({"type": "message_start"}))];
    lines.extend(tool_block("t1", "Write", r#"{"file_path":"/etc/hosts"}"#));
    lines.push(event(json!({"type": "message_stop"})));
    feed_all(&mut parser, &lines);

    let out = parser
        .feed_line(&tool_result(
            "t1",
            "<tool_use_error>path outside\nworkspace</tool_use_error>",
            Value::Null,
        ))
        .unwrap();
    assert_eq!(
        out,
        vec!["> hosts write intercepted: path outside workspace".to_string()]
    );
}

#[test]
fn string_raw_result_with_error_prefix() {
    let mut parser = StreamParser::new();
    let mut lines = vec![event(json!({"type": "message_start"}))];
    lines.extend(tool_block("t1", "Grep", r#"{"pattern":"x"}"#));
    lines.push(event(json!({"type": "message_stop"})));
    feed_all(&mut parser, &lines);

    let out = parser
        .feed_line(&tool_result("t1", "", json!("ERROR: regex too large")))
        .unwrap();
    assert_eq!(out, vec!["> Grep intercepted: regex too large".to_string()]);
}

#[test]
fn stderr_marks_error_and_flag_without_text_gets_generic_message() {
    let mut parser = StreamParser::new();
    let mut lines = vec![event(json!({"type": "message_start"}))];
    lines.extend(tool_block("t1", "Bash", r#"{"command":"make"}"#));
    lines.extend(tool_block("t2", "Edit", "{}"));
    lines.push(event(json!({"type": "message_stop"})));
    feed_all(&mut parser, &lines);

    let out = parser
        .feed_line(&tool_result("t1", "", json!({"stdout": "", "stderr": "no rule"})))
        .unwrap();
    assert_eq!(out, vec!["> $ make\n>\n> intercepted: no rule".to_string()]);

    let flagged = line(&json!({
        "type": "user",
        "message": {"content": [{"tool_use_id": "t2", "is_error": true, "content": [{"type": "text"}]}]}
    }));
    let out = parser.feed_line(&flagged).unwrap();
    assert_eq!(out, vec!["> Edit intercepted: tool call failed".to_string()]);
}

#[test]
fn non_list_user_content_carries_no_entries() {
    let mut parser = StreamParser::new();
    let out = parser
        .feed_line(r#"{"type":"user","message":{"content":"plain prompt"}}"#)
        .unwrap();
    assert!(out.is_empty());
}

#[test]
fn malformed_line_does_not_disturb_open_turn() {
    let mut parser = StreamParser::new();
    let turn = text_turn("kept");
    feed_all(&mut parser, &turn[..3]);
    assert!(parser.feed_line("garbage").is_err());
    feed_all(&mut parser, &turn[3..]);
    assert_eq!(parser.flush(), vec!["kept".to_string()]);
}

#[test]
fn flush_returns_text_once() {
    let mut parser = StreamParser::new();
    feed_all(&mut parser, &text_turn("unterminated"));
    assert_eq!(parser.flush(), vec!["unterminated".to_string()]);
    assert!(parser.flush().is_empty());
}

#[test]
fn null_result_and_usage_still_close_the_session() {
    let mut parser = StreamParser::new();
    feed_all(&mut parser, &text_turn("Done."));

    let out = parser
        .feed_line(&line(&json!({
            "type": "result",
            "subtype": "success",
            "result": null,
            "duration_ms": 1500,
            "total_cost_usd": null,
            "usage": null,
        })))
        .unwrap();
    assert_eq!(
        out,
        vec!["Done.\n\n> ⏱️ 1.5s  |  🪙 est. $0.00  |  📊 IN: 0 / OUT: 0 tokens".to_string()]
    );
    assert!(parser.flush().is_empty());
}

#[test]
fn null_fields_in_stream_events_read_as_empty() {
    let mut parser = StreamParser::new();
    let lines = vec![
        event(json!({"type": "message_start", "message": {"id": null}})),
        event(json!({"type": "content_block_start", "content_block": {"type": "text", "id": null}})),
        event(json!({"type": "content_block_delta", "delta": {"type": "text_delta", "text": null}})),
        event(json!({"type": "content_block_delta", "delta": {"type": "text_delta", "text": "after"}})),
        event(json!({"type": "content_block_stop", "delta": null})),
        event(json!({"type": "message_stop"})),
    ];
    assert!(feed_all(&mut parser, &lines).is_empty());
    assert_eq!(parser.flush(), vec!["after".to_string()]);
}

#[test]
fn null_error_flag_keeps_the_tool_use_id() {
    let mut parser = StreamParser::new();
    let mut lines = vec![event(json!({"type": "message_start"}))];
    lines.extend(tool_block("t1", "Glob", r#"{"pattern":"*.md"}"#));
    lines.push(event(json!({"type": "message_stop"})));
    feed_all(&mut parser, &lines);

    let out = parser
        .feed_line(&line(&json!({
            "type": "user",
            "message": {"content": [{"tool_use_id": "t1", "is_error": null, "content": "a.md"}]},
            "tool_use_result": null,
        })))
        .unwrap();
    assert_eq!(out, vec!["> Glob invoked, ok".to_string()]);
    assert_eq!(parser.pending_tool_calls(), 0);
}

#[test]
fn non_object_lines_are_malformed() {
    let mut parser = StreamParser::new();
    for raw in ["[]", r#"["stream_event"]"#, "42", r#""result""#, "null"] {
        assert!(
            matches!(parser.feed_line(raw), Err(StreamError::NotAnObject)),
            "{raw} should be rejected"
        );
    }
    assert!(parser.feed_line(r#"{"type":"rate_limit"}"#).is_ok());
}

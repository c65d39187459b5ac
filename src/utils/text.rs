#[must_use]
pub fn truncate_with_ellipsis(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => {
            let truncated = &s[..idx];
            format!("{}...", truncated.trim_end())
        }
        None => s.to_string(),
    }
}

/// Collapse carriage returns and newlines into spaces and trim, so free text
/// can be embedded in a single quoted callout line.
#[must_use]
pub fn sanitize_line(s: &str) -> String {
    s.replace(['\r', '\n'], " ").trim().to_string()
}

/// Prefix every line with `> ` so multi-line output stays inside a quote.
#[must_use]
pub fn block_quote_lines(s: &str) -> String {
    s.replace("\r\n", "\n")
        .split('\n')
        .map(|line| format!("> {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

//! Locating JSON candidates inside free text.

/// A fenced block: the info string after the opening fence and the body
/// between the fences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FencedBlock<'a> {
    pub lang: &'a str,
    pub body: &'a str,
}

impl FencedBlock<'_> {
    pub fn is_json(&self) -> bool {
        self.lang
            .split_whitespace()
            .next()
            .is_some_and(|tag| tag.eq_ignore_ascii_case("json"))
    }
}

/// All closed ``` fenced blocks in order of appearance.
///
/// An opening fence may follow prose on the same line; its info string runs
/// to the end of that line. A closing fence must start its own line, but text
/// after it may open the next block. An unclosed trailing fence is ignored.
pub(crate) fn fenced_blocks(text: &str) -> Vec<FencedBlock<'_>> {
    let mut blocks = Vec::new();
    let mut from = 0;

    while let Some(found) = text[from..].find("```") {
        let open = from + found;
        let info_start = open + text[open..].len() - text[open..].trim_start_matches('`').len();
        let Some(eol) = text[info_start..].find('\n') else {
            break;
        };
        let info = &text[info_start..info_start + eol];
        // ```inline``` code on a single line is not a block.
        if let Some(inline) = info.find("```") {
            from = info_start + inline + 3;
            continue;
        }

        let body_start = info_start + eol + 1;
        let Some((close, body_end)) = closing_fence(text, body_start) else {
            break;
        };
        let body = &text[body_start..body_end];
        let body = body
            .strip_suffix('\n')
            .map(|b| b.strip_suffix('\r').unwrap_or(b))
            .unwrap_or(body);
        blocks.push(FencedBlock {
            lang: info.trim(),
            body,
        });
        from = close + 3;
    }
    blocks
}

/// Offset of the first closing fence at or after `from`, and the offset of
/// the line it starts.
fn closing_fence(text: &str, from: usize) -> Option<(usize, usize)> {
    let mut offset = from;
    for line in text[from..].split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") {
            return Some((line_start + line.len() - trimmed.len(), line_start));
        }
    }
    None
}

/// Top-level balanced `{...}` spans, in order. Braces inside JSON strings
/// are ignored once a span is open. A `{` that never balances is skipped and
/// the search resumes at the next one.
pub(crate) fn brace_spans(text: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut from = 0;

    while let Some(found) = text[from..].find('{') {
        let start = from + found;
        match balanced_len(&text[start..]) {
            Some(len) => {
                spans.push(&text[start..start + len]);
                from = start + len;
            }
            None => from = start + 1,
        }
    }
    spans
}

/// Length of the balanced span opening at the start of `text`.
fn balanced_len(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_blocks_in_order() {
        let text = "intro\n```python\nprint(1)\n```\nmid\n```JSON\n{\"a\": 1}\n```\n";
        let blocks = fenced_blocks(text);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].lang, "python");
        assert_eq!(blocks[0].body, "print(1)");
        assert!(!blocks[0].is_json());
        assert!(blocks[1].is_json());
        assert_eq!(blocks[1].body, "{\"a\": 1}");
    }

    #[test]
    fn test_unclosed_fence_is_ignored() {
        assert!(fenced_blocks("```json\n{\"a\": 1}\n").is_empty());
    }

    #[test]
    fn test_crlf_fences() {
        let blocks = fenced_blocks("```json\r\n{}\r\n```\r\n");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].body, "{}");
    }

    #[test]
    fn test_brace_spans_skip_braces_in_strings() {
        let text = r#"Here: {"code": "fn main() { }", "n": {"x": 1}} and {tail}"#;
        let spans = brace_spans(text);
        assert_eq!(spans[0], r#"{"code": "fn main() { }", "n": {"x": 1}}"#);
        assert_eq!(spans[1], "{tail}");
    }

    #[test]
    fn test_brace_spans_handle_escaped_quotes() {
        let spans = brace_spans(r#"{"s": "a \" } b"}"#);
        assert_eq!(spans, [r#"{"s": "a \" } b"}"#]);
    }

    #[test]
    fn test_unbalanced_span_yields_nothing() {
        assert!(brace_spans("{ \"a\": 1").is_empty());
    }

    #[test]
    fn test_fence_after_prose_on_same_line() {
        let text = "Here is the file: ```json\n{\"a\": 1}\n``` then ```json\n{\"b\": 2}\n```";
        let blocks = fenced_blocks(text);
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].is_json());
        assert_eq!(blocks[0].body, "{\"a\": 1}");
        assert_eq!(blocks[1].body, "{\"b\": 2}");
    }

    #[test]
    fn test_inline_code_is_not_a_fence() {
        let text = "run ```make``` first\n```json\n{}\n```\n";
        let blocks = fenced_blocks(text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].body, "{}");
    }

    #[test]
    fn test_stray_brace_does_not_hide_later_span() {
        let spans = brace_spans(r#"Use { carefully. {"name": "a.txt"} and {"b": 1}"#);
        assert_eq!(spans, [r#"{"name": "a.txt"}"#, r#"{"b": 1}"#]);
    }
}

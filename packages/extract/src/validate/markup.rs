//! Tag balance for HTML documents.

use forge_core::SyntaxError;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose end tag may be omitted.
const OPTIONAL_CLOSE: &[&str] = &[
    "p", "li", "dt", "dd", "tr", "td", "th", "thead", "tbody", "tfoot", "option", "colgroup",
    "html", "head", "body",
];

const RAW_TEXT: &[&str] = &["script", "style", "textarea", "title"];

fn position(source: &str, offset: usize) -> (usize, usize) {
    let before = &source[..offset];
    let line = before.matches('\n').count() + 1;
    let column = before
        .rfind('\n')
        .map_or(before.chars().count(), |nl| before[nl + 1..].chars().count())
        + 1;
    (line, column)
}

fn error(source: &str, offset: usize, message: impl Into<String>) -> SyntaxError {
    let (line, column) = position(source, offset);
    SyntaxError {
        line,
        column,
        message: message.into(),
    }
}

/// Check that every non-void element is closed in nesting order.
pub(crate) fn check_tags(source: &str) -> Result<(), SyntaxError> {
    let lower = source.to_ascii_lowercase();
    let mut stack: Vec<(String, usize)> = Vec::new();
    let mut pos = 0;

    while let Some(found) = lower[pos..].find('<') {
        let start = pos + found;
        let rest = &lower[start..];

        if rest.starts_with("<!--") {
            let Some(end) = rest.find("-->") else {
                return Err(error(source, start, "unterminated comment"));
            };
            pos = start + end + 3;
            continue;
        }
        if rest.starts_with("<!") || rest.starts_with("<?") {
            pos = start + rest.find('>').map_or(rest.len(), |end| end + 1);
            continue;
        }

        let closing = rest.starts_with("</");
        let name_start = start + if closing { 2 } else { 1 };
        let name: String = lower[name_start..]
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '-')
            .collect();
        if !name.starts_with(|c: char| c.is_ascii_alphabetic()) {
            // A bare `<` in text.
            pos = start + 1;
            continue;
        }

        let Some(tag_end) = find_tag_end(&lower, name_start) else {
            return Err(error(source, start, format!("unterminated tag <{}>", name)));
        };
        let self_closing = lower[..tag_end].ends_with('/');
        pos = tag_end + 1;

        if closing {
            close_element(source, &mut stack, &name, start)?;
        } else if !self_closing && !VOID_ELEMENTS.contains(&name.as_str()) {
            if RAW_TEXT.contains(&name.as_str()) {
                let end_tag = format!("</{}", name);
                match lower[pos..].find(&end_tag) {
                    Some(end) => pos += end,
                    None => {
                        return Err(error(source, start, format!("unclosed <{}>", name)));
                    }
                }
            }
            stack.push((name, start));
        }
    }

    while let Some((name, start)) = stack.pop() {
        if !OPTIONAL_CLOSE.contains(&name.as_str()) {
            return Err(error(source, start, format!("unclosed <{}>", name)));
        }
    }
    Ok(())
}

/// Offset of the `>` ending a tag, skipping quoted attribute values.
fn find_tag_end(lower: &str, from: usize) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, c) in lower[from..].char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '>') => return Some(from + i),
            _ => {}
        }
    }
    None
}

fn close_element(
    source: &str,
    stack: &mut Vec<(String, usize)>,
    name: &str,
    at: usize,
) -> Result<(), SyntaxError> {
    if VOID_ELEMENTS.contains(&name) {
        return Ok(());
    }
    if !stack.iter().any(|(open, _)| open == name) {
        return Err(error(source, at, format!("unexpected closing tag </{}>", name)));
    }
    while let Some((open, start)) = stack.pop() {
        if open == name {
            return Ok(());
        }
        if !OPTIONAL_CLOSE.contains(&open.as_str()) {
            return Err(error(
                source,
                start,
                format!("<{}> is not closed before </{}>", open, name),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use super::*;

    #[test]
    fn test_well_formed_document() {
        let html = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>A < B</title>
  <link rel="stylesheet" href="styles.css">
  <style>div > p { color: red; }</style>
</head>
<body>
  <!-- <div> in a comment -->
  <ul><li>one<li>two</ul>
  <img src="x.png" alt="a > b"/>
  <p>Text<br>more
  <script>if (a < b && c > d) { render("<div>"); }</script>
</body>
</html>
"#;
        assert!(check_tags(html).is_ok());
    }

    #[test]
    fn test_unclosed_div() {
        let err = check_tags("<body>\n  <div class=\"x\">\n</body>").unwrap_err();
        assert_eq!((err.line, err.column), (2, 3));
        assert!(err.message.contains("<div>"));
    }

    #[test]
    fn test_stray_closing_tag() {
        let err = check_tags("<p>hi</p>\n</section>").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("</section>"));
    }

    #[test]
    fn test_unclosed_script() {
        assert!(check_tags("<script>let a = 1;").is_err());
    }
}

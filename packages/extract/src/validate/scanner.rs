//! Delimiter, string and comment balance for C-family and Python sources.
//!
//! This is a structural check, not a parser: it catches truncated output,
//! unbalanced brackets and unterminated literals, which is what generated
//! code gets wrong most often.

use forge_core::SyntaxError;

/// Lexical rules for one language family.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Grammar {
    pub line_comment: Option<&'static str>,
    pub block_comment: Option<(&'static str, &'static str)>,
    pub nested_block_comments: bool,
    /// Quote characters whose literals end at the line break.
    pub quotes: &'static [char],
    /// Quote characters whose literals may span lines.
    pub multiline_quotes: &'static [char],
    /// `'''` and `"""` literals.
    pub triple_quotes: bool,
    /// `'` may start a lifetime or label instead of a char literal.
    pub lifetimes: bool,
    /// `r"..."` and `r#"..."#` literals.
    pub raw_strings: bool,
}

impl Grammar {
    pub const C_LIKE: Grammar = Grammar {
        line_comment: Some("//"),
        block_comment: Some(("/*", "*/")),
        nested_block_comments: false,
        quotes: &['"', '\''],
        multiline_quotes: &[],
        triple_quotes: false,
        lifetimes: false,
        raw_strings: false,
    };

    pub const GO: Grammar = Grammar {
        multiline_quotes: &['`'],
        ..Grammar::C_LIKE
    };

    pub const JAVASCRIPT: Grammar = Grammar {
        multiline_quotes: &['`'],
        ..Grammar::C_LIKE
    };

    pub const RUST: Grammar = Grammar {
        nested_block_comments: true,
        quotes: &[],
        multiline_quotes: &['"'],
        lifetimes: true,
        raw_strings: true,
        ..Grammar::C_LIKE
    };

    pub const CSS: Grammar = Grammar {
        line_comment: None,
        ..Grammar::C_LIKE
    };

    pub const PYTHON: Grammar = Grammar {
        line_comment: Some("#"),
        block_comment: None,
        nested_block_comments: false,
        quotes: &['"', '\''],
        multiline_quotes: &[],
        triple_quotes: true,
        lifetimes: false,
        raw_strings: false,
    };
}

struct Cursor {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

impl Cursor {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn starts_with(&self, token: &str) -> bool {
        token
            .chars()
            .enumerate()
            .all(|(i, c)| self.peek_at(i) == Some(c))
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn bump_n(&mut self, n: usize) {
        for _ in 0..n {
            self.bump();
        }
    }

    fn at(&self) -> (usize, usize) {
        (self.line, self.column)
    }
}

fn error_at((line, column): (usize, usize), message: impl Into<String>) -> SyntaxError {
    SyntaxError {
        line,
        column,
        message: message.into(),
    }
}

fn closing_for(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}

/// Check that brackets balance and every literal and comment terminates.
pub(crate) fn check_balance(source: &str, grammar: &Grammar) -> Result<(), SyntaxError> {
    let mut cur = Cursor::new(source);
    let mut stack: Vec<(char, (usize, usize))> = Vec::new();

    while let Some(c) = cur.peek() {
        if let Some(token) = grammar.line_comment
            && cur.starts_with(token)
        {
            while cur.peek().is_some_and(|c| c != '\n') {
                cur.bump();
            }
            continue;
        }

        if let Some((open, close)) = grammar.block_comment
            && cur.starts_with(open)
        {
            skip_block_comment(&mut cur, open, close, grammar.nested_block_comments)?;
            continue;
        }

        if grammar.triple_quotes
            && (cur.starts_with("\"\"\"") || cur.starts_with("'''"))
        {
            skip_triple_quoted(&mut cur, c)?;
            continue;
        }

        if grammar.raw_strings && c == 'r' && is_raw_string_start(&cur) {
            skip_raw_string(&mut cur)?;
            continue;
        }

        if grammar.lifetimes && c == '\'' {
            skip_char_or_lifetime(&mut cur)?;
            continue;
        }

        if grammar.quotes.contains(&c) {
            skip_quoted(&mut cur, c, false)?;
            continue;
        }
        if grammar.multiline_quotes.contains(&c) {
            skip_quoted(&mut cur, c, true)?;
            continue;
        }

        match c {
            '(' | '[' | '{' => {
                stack.push((c, cur.at()));
            }
            ')' | ']' | '}' => match stack.pop() {
                Some((open, _)) if closing_for(open) == c => {}
                Some((open, (line, _))) => {
                    return Err(error_at(
                        cur.at(),
                        format!(
                            "mismatched '{}', expected '{}' to close '{}' from line {}",
                            c,
                            closing_for(open),
                            open,
                            line
                        ),
                    ));
                }
                None => return Err(error_at(cur.at(), format!("unexpected '{}'", c))),
            },
            _ => {}
        }
        cur.bump();
    }

    match stack.pop() {
        Some((open, at)) => Err(error_at(at, format!("unclosed '{}'", open))),
        None => Ok(()),
    }
}

fn skip_block_comment(
    cur: &mut Cursor,
    open: &str,
    close: &str,
    nested: bool,
) -> Result<(), SyntaxError> {
    let start = cur.at();
    let open_len = open.chars().count();
    let close_len = close.chars().count();
    cur.bump_n(open_len);
    let mut depth = 1;

    while cur.peek().is_some() {
        if cur.starts_with(close) {
            cur.bump_n(close_len);
            depth -= 1;
            if depth == 0 {
                return Ok(());
            }
        } else if nested && cur.starts_with(open) {
            cur.bump_n(open_len);
            depth += 1;
        } else {
            cur.bump();
        }
    }
    Err(error_at(start, "unterminated block comment"))
}

fn skip_quoted(cur: &mut Cursor, quote: char, multiline: bool) -> Result<(), SyntaxError> {
    let start = cur.at();
    cur.bump();
    while let Some(c) = cur.peek() {
        match c {
            '\\' => {
                cur.bump();
                cur.bump();
            }
            '\n' if !multiline => break,
            _ if c == quote => {
                cur.bump();
                return Ok(());
            }
            _ => {
                cur.bump();
            }
        }
    }
    Err(error_at(start, "unterminated string literal"))
}

fn skip_triple_quoted(cur: &mut Cursor, quote: char) -> Result<(), SyntaxError> {
    let start = cur.at();
    let delimiter: String = std::iter::repeat_n(quote, 3).collect();
    cur.bump_n(3);
    while let Some(c) = cur.peek() {
        if c == '\\' {
            cur.bump_n(2);
        } else if cur.starts_with(&delimiter) {
            cur.bump_n(3);
            return Ok(());
        } else {
            cur.bump();
        }
    }
    Err(error_at(start, "unterminated triple-quoted string"))
}

fn is_raw_string_start(cur: &Cursor) -> bool {
    // `r` must not be the tail of an identifier such as `bar"`.
    if cur.pos > 0
        && cur
            .chars
            .get(cur.pos - 1)
            .is_some_and(|c| c.is_alphanumeric() || *c == '_')
    {
        return false;
    }
    let mut offset = 1;
    while cur.peek_at(offset) == Some('#') {
        offset += 1;
    }
    cur.peek_at(offset) == Some('"')
}

fn skip_raw_string(cur: &mut Cursor) -> Result<(), SyntaxError> {
    let start = cur.at();
    cur.bump();
    let mut hashes = 0;
    while cur.peek() == Some('#') {
        hashes += 1;
        cur.bump();
    }
    cur.bump();

    let terminator: String = std::iter::once('"')
        .chain(std::iter::repeat_n('#', hashes))
        .collect();
    while cur.peek().is_some() {
        if cur.starts_with(&terminator) {
            cur.bump_n(terminator.len());
            return Ok(());
        }
        cur.bump();
    }
    Err(error_at(start, "unterminated raw string literal"))
}

/// `'a'`, `'\n'` and `'\u{1F600}'` are char literals; `'a` and `'outer:` are
/// lifetimes or labels.
fn skip_char_or_lifetime(cur: &mut Cursor) -> Result<(), SyntaxError> {
    match (cur.peek_at(1), cur.peek_at(2)) {
        (Some('\\'), _) => skip_quoted(cur, '\'', false),
        (Some(c), Some('\'')) if c != '\n' => {
            cur.bump_n(3);
            Ok(())
        }
        _ => {
            cur.bump();
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use super::*;

    #[test]
    fn test_balanced_go() {
        let src = "package main\n\nimport \"fmt\"\n\nfunc main() {\n\tfmt.Println(\"}\")\n\ts := `raw\n{`\n\t_ = s\n}\n";
        assert!(check_balance(src, &Grammar::GO).is_ok());
    }

    #[test]
    fn test_unclosed_brace_reports_opener() {
        let err = check_balance("func main() {\n\tx := 1\n", &Grammar::GO).unwrap_err();
        assert_eq!((err.line, err.column), (1, 13));
        assert!(err.message.contains("unclosed '{'"));
    }

    #[test]
    fn test_mismatched_close() {
        let err = check_balance("call(a, [b)\n", &Grammar::JAVASCRIPT).unwrap_err();
        assert_eq!((err.line, err.column), (1, 11));
        assert!(err.message.contains("mismatched"));
    }

    #[test]
    fn test_unexpected_close() {
        let err = check_balance("a = 1\n)\n", &Grammar::PYTHON).unwrap_err();
        assert_eq!((err.line, err.column), (2, 1));
    }

    #[test]
    fn test_python_strings_and_comments() {
        let src = "def f():\n    # not a bracket (\n    s = 'it''s'\n    doc = \"\"\"\n    ( { [\n    \"\"\"\n    return s\n";
        assert!(check_balance(src, &Grammar::PYTHON).is_ok());
    }

    #[test]
    fn test_python_unterminated_string() {
        let err = check_balance("x = 'abc\ny = 2\n", &Grammar::PYTHON).unwrap_err();
        assert_eq!((err.line, err.column), (1, 5));
        assert!(err.message.contains("unterminated string"));
    }

    #[test]
    fn test_rust_lifetimes_and_raw_strings() {
        let src = "fn f<'a>(s: &'a str) -> char {\n    let _ = r#\"}\"#;\n    /* outer /* inner */ } */\n    '{'\n}\n";
        assert!(check_balance(src, &Grammar::RUST).is_ok());
    }

    #[test]
    fn test_unterminated_block_comment() {
        let err = check_balance("a {\n/* never closed\n}", &Grammar::CSS).unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("block comment"));
    }
}

//! Cascading output extraction.
//!
//! Strategies run in a fixed order and the first success wins:
//! 1. [`Strategy::Typed`]: the output is already a record of the wanted shape
//! 2. [`Strategy::Direct`]: the whole text parses as JSON of that shape
//! 3. [`Strategy::Fenced`]: a ```` ```json ```` block parses, first match wins
//! 4. [`Strategy::BareSpan`]: the first balanced `{...}` span that is valid JSON
//!
//! Every candidate must also pass [`Shape::is_usable`], so blank names and
//! whitespace-only content count as failures.

use forge_core::{FileBundle, FileUnit};
use serde::de::DeserializeOwned;

use crate::scan::{brace_spans, fenced_blocks};
use crate::{ExtractError, RawOutput};

/// Which strategy recovered a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    Typed,
    Direct,
    Fenced,
    BareSpan,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Typed => "typed",
            Strategy::Direct => "direct",
            Strategy::Fenced => "fenced block",
            Strategy::BareSpan => "bare span",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value the extractor can recover.
pub trait Shape: DeserializeOwned + Sized {
    /// Human-readable name used in errors.
    const NAME: &'static str;

    /// Strategy 1: take the value straight from a typed output.
    fn from_typed(raw: &RawOutput) -> Option<Self>;

    /// Whether a parsed candidate is acceptable.
    fn is_usable(&self) -> bool;
}

impl Shape for FileUnit {
    const NAME: &'static str = "file unit";

    fn from_typed(raw: &RawOutput) -> Option<Self> {
        match raw {
            RawOutput::File(unit) => Some(unit.clone()),
            RawOutput::Value(value) if value.is_object() => {
                serde_json::from_value(value.clone()).ok()
            }
            _ => None,
        }
    }

    fn is_usable(&self) -> bool {
        FileUnit::is_usable(self)
    }
}

impl Shape for FileBundle {
    const NAME: &'static str = "file bundle";

    fn from_typed(raw: &RawOutput) -> Option<Self> {
        match raw {
            RawOutput::Bundle(bundle) => Some(bundle.clone()),
            RawOutput::Value(value) if value.is_object() => {
                serde_json::from_value(value.clone()).ok()
            }
            _ => None,
        }
    }

    fn is_usable(&self) -> bool {
        FileBundle::is_usable(self)
    }
}

/// A recovered value and the strategy that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted<T> {
    pub value: T,
    pub strategy: Strategy,
}

/// Recover a `T` from one pipeline output.
pub fn extract<T: Shape>(raw: &RawOutput) -> Result<Extracted<T>, ExtractError> {
    if let Some(value) = T::from_typed(raw)
        && value.is_usable()
    {
        return Ok(Extracted {
            value,
            strategy: Strategy::Typed,
        });
    }

    let Some(text) = raw.as_text() else {
        return Err(ExtractError::NoMatch { shape: T::NAME });
    };
    let text = text.trim();
    if text.is_empty() {
        return Err(ExtractError::Empty);
    }

    if let Some(value) = parse_usable::<T>(text) {
        return Ok(Extracted {
            value,
            strategy: Strategy::Direct,
        });
    }

    let fenced = fenced_blocks(text)
        .into_iter()
        .filter(|block| block.is_json())
        .map(|block| block.body.trim())
        .filter(|body| !body.is_empty())
        .find_map(parse_usable::<T>);
    if let Some(value) = fenced {
        return Ok(Extracted {
            value,
            strategy: Strategy::Fenced,
        });
    }

    let span = brace_spans(text)
        .into_iter()
        .find_map(|span| serde_json::from_str::<serde_json::Value>(span).ok());
    if let Some(span) = span
        && let Ok(value) = serde_json::from_value::<T>(span)
        && value.is_usable()
    {
        return Ok(Extracted {
            value,
            strategy: Strategy::BareSpan,
        });
    }

    tracing::debug!("No {} found in {} bytes of text", T::NAME, text.len());
    Err(ExtractError::NoMatch { shape: T::NAME })
}

fn parse_usable<T: Shape>(candidate: &str) -> Option<T> {
    serde_json::from_str::<T>(candidate)
        .ok()
        .filter(T::is_usable)
}

/// Recover files from one output, as a single unit or else as a bundle.
pub fn extract_files(raw: &RawOutput) -> Result<Extracted<Vec<FileUnit>>, ExtractError> {
    match extract::<FileUnit>(raw) {
        Ok(unit) => Ok(Extracted {
            value: vec![unit.value],
            strategy: unit.strategy,
        }),
        Err(ExtractError::Empty) => Err(ExtractError::Empty),
        Err(_) => match extract::<FileBundle>(raw) {
            Ok(bundle) => Ok(Extracted {
                value: bundle.value.into_units(),
                strategy: bundle.strategy,
            }),
            Err(_) => Err(ExtractError::NoMatch {
                shape: "file unit or file bundle",
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use super::*;
    use serde_json::json;

    #[test]
    fn test_typed_unit_is_taken_verbatim() {
        let content = "package main\n\n// {not json}\nfunc main() {}\n";
        let raw = RawOutput::File(FileUnit::new("main.go", content));
        let got = extract::<FileUnit>(&raw).unwrap();
        assert_eq!(got.strategy, Strategy::Typed);
        assert_eq!(got.value.content, content);
    }

    #[test]
    fn test_typed_value_object() {
        let raw = RawOutput::Value(json!({"filename": "app.js", "code": "run()"}));
        let got = extract::<FileUnit>(&raw).unwrap();
        assert_eq!(got.strategy, Strategy::Typed);
        assert_eq!(got.value.name, "app.js");
    }

    #[test]
    fn test_direct_parse() {
        let raw = RawOutput::from(r#"  {"name": "README.md", "content": "hello"}  "#);
        let got = extract::<FileUnit>(&raw).unwrap();
        assert_eq!(got.strategy, Strategy::Direct);
        assert_eq!(got.value.content, "hello");
    }

    #[test]
    fn test_fenced_block_with_prose() {
        let text = "Here is the file:\n```json\n{\"name\":\"README.md\",\"content\":\"hi\"}\n```\nDone.";
        let got = extract::<FileUnit>(&RawOutput::from(text)).unwrap();
        assert_eq!(got.strategy, Strategy::Fenced);
        assert_eq!(got.value, FileUnit::new("README.md", "hi"));
    }

    #[test]
    fn test_fenced_tag_is_case_insensitive_and_first_valid_wins() {
        let text = concat!(
            "```json\n{\"name\": \"\", \"content\": \"x\"}\n```\n",
            "```python\n{\"name\": \"skip.py\", \"content\": \"x\"}\n```\n",
            "```JSON\n{\"name\": \"b.txt\", \"content\": \"second\"}\n```\n",
            "```json\n{\"name\": \"c.txt\", \"content\": \"third\"}\n```\n",
        );
        let got = extract::<FileUnit>(&RawOutput::from(text)).unwrap();
        assert_eq!(got.strategy, Strategy::Fenced);
        assert_eq!(got.value.name, "b.txt");
    }

    #[test]
    fn test_bare_span() {
        let text = r#"Sure! The result is {"filename": "main.py", "code": "print('{')"} as requested."#;
        let got = extract::<FileUnit>(&RawOutput::from(text)).unwrap();
        assert_eq!(got.strategy, Strategy::BareSpan);
        assert_eq!(got.value.content, "print('{')");
    }

    #[test]
    fn test_bare_span_skips_non_json_braces() {
        let text = r#"Use {placeholders} freely. {"name": "a.css", "content": "body {}"}"#;
        let got = extract::<FileUnit>(&RawOutput::from(text)).unwrap();
        assert_eq!(got.strategy, Strategy::BareSpan);
        assert_eq!(got.value.name, "a.css");
    }

    #[test]
    fn test_whitespace_is_empty() {
        assert_eq!(
            extract::<FileUnit>(&RawOutput::from(" \n\t ")),
            Err(ExtractError::Empty)
        );
    }

    #[test]
    fn test_blank_content_fails() {
        let raw = RawOutput::from(r#"{"name": "main.py", "content": "   "}"#);
        assert!(matches!(
            extract::<FileUnit>(&raw),
            Err(ExtractError::NoMatch { .. })
        ));
    }

    #[test]
    fn test_prose_only_fails() {
        let raw = RawOutput::from("I could not generate the file, sorry.");
        assert_eq!(
            extract_files(&raw),
            Err(ExtractError::NoMatch {
                shape: "file unit or file bundle"
            })
        );
    }

    #[test]
    fn test_extract_is_idempotent() {
        let text = "prefix ```json\n{\"name\":\"x.txt\",\"content\":\"y\"}\n```";
        let first = extract::<FileUnit>(&RawOutput::from(text)).unwrap();
        let second = extract::<FileUnit>(&RawOutput::File(first.value.clone())).unwrap();
        assert_eq!(second.value, first.value);
        assert_eq!(
            extract::<FileUnit>(&RawOutput::from(text)).unwrap(),
            first
        );
    }

    #[test]
    fn test_extract_files_bundle_in_fence() {
        let text = concat!(
            "Generated project:\n```json\n",
            r##"{"files": [{"filename": "main.py", "code": "print(1)"}, {"filename": "README.md", "code": "# App"}],"##,
            r#" "tests": {"tests/test_main.py": "def test(): pass"}}"#,
            "\n```\n"
        );
        let got = extract_files(&RawOutput::from(text)).unwrap();
        assert_eq!(got.strategy, Strategy::Fenced);
        let names: Vec<_> = got.value.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, ["main.py", "README.md", "tests/test_main.py"]);
    }

    #[test]
    fn test_fence_after_prose_on_same_line() {
        let text = "Here is the file: ```json\n{\"name\":\"x.py\",\"content\":\"pass\"}\n```";
        let got = extract::<FileUnit>(&RawOutput::from(text)).unwrap();
        assert_eq!(got.strategy, Strategy::Fenced);
        assert_eq!(got.value.name, "x.py");
    }

    #[test]
    fn test_first_matching_inline_fence_wins() {
        let text = concat!(
            "Draft: ```json\n{\"note\":\"draft\"}\n``` ",
            "Final: ```json\n{\"name\":\"x.py\",\"content\":\"pass\"}\n``` ",
            "Alt: ```json\n{\"name\":\"y.py\",\"content\":\"pass\"}\n```"
        );
        let got = extract::<FileUnit>(&RawOutput::from(text)).unwrap();
        assert_eq!(got.strategy, Strategy::Fenced);
        assert_eq!(got.value.name, "x.py");
    }

    #[test]
    fn test_bare_span_after_stray_brace() {
        let text = "Use { carefully. {\"name\":\"a.txt\",\"content\":\"b\"}";
        let got = extract::<FileUnit>(&RawOutput::from(text)).unwrap();
        assert_eq!(got.strategy, Strategy::BareSpan);
        assert_eq!(got.value.name, "a.txt");
    }

    #[test]
    fn test_extract_files_typed_bundle() {
        let bundle = FileBundle::new(vec![FileUnit::new("index.html", "<p>hi</p>")]);
        let got = extract_files(&RawOutput::Bundle(bundle)).unwrap();
        assert_eq!(got.strategy, Strategy::Typed);
        assert_eq!(got.value.len(), 1);
    }

    #[test]
    fn test_unsafe_path_fails() {
        let raw = RawOutput::File(FileUnit::new("../../etc/cron.d/x", "boom"));
        assert!(extract_files(&raw).is_err());
    }
}

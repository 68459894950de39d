//! Per-language syntax checks.

use forge_core::{FileMetrics, FileUnit, SyntaxCheck, SyntaxError};
use serde::Deserialize;

use super::markup::check_tags;
use super::scanner::{Grammar, check_balance};

/// Languages the validator knows how to check, keyed by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Json,
    Toml,
    Yaml,
    Python,
    Go,
    JavaScript,
    TypeScript,
    Rust,
    Css,
    Java,
    C,
    Html,
}

impl Language {
    /// Detect the language from a file name's extension.
    pub fn detect(name: &str) -> Option<Language> {
        let (_, extension) = name.rsplit_once('.')?;
        let language = match extension.to_ascii_lowercase().as_str() {
            "json" => Language::Json,
            "toml" => Language::Toml,
            "yaml" | "yml" => Language::Yaml,
            "py" => Language::Python,
            "go" => Language::Go,
            "js" | "mjs" | "cjs" | "jsx" => Language::JavaScript,
            "ts" | "tsx" => Language::TypeScript,
            "rs" => Language::Rust,
            "css" => Language::Css,
            "java" => Language::Java,
            "c" | "h" | "cc" | "cpp" | "hpp" => Language::C,
            "html" | "htm" => Language::Html,
            _ => return None,
        };
        Some(language)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Json => "json",
            Language::Toml => "toml",
            Language::Yaml => "yaml",
            Language::Python => "python",
            Language::Go => "go",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Rust => "rust",
            Language::Css => "css",
            Language::Java => "java",
            Language::C => "c",
            Language::Html => "html",
        }
    }

    fn line_comment(&self) -> Option<&'static str> {
        match self {
            Language::Toml | Language::Yaml | Language::Python => Some("#"),
            Language::Json | Language::Css | Language::Html => None,
            _ => Some("//"),
        }
    }

    /// Check `source`, returning the first problem found.
    pub fn check(&self, source: &str) -> Result<(), SyntaxError> {
        match self {
            Language::Json => check_json(source),
            Language::Toml => check_toml(source),
            Language::Yaml => check_yaml(source),
            Language::Python => check_balance(source, &Grammar::PYTHON),
            Language::Go => check_balance(source, &Grammar::GO),
            Language::JavaScript | Language::TypeScript => {
                check_balance(source, &Grammar::JAVASCRIPT)
            }
            Language::Rust => check_balance(source, &Grammar::RUST),
            Language::Css => check_balance(source, &Grammar::CSS),
            Language::Java | Language::C => check_balance(source, &Grammar::C_LIKE),
            Language::Html => check_tags(source),
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn check_json(source: &str) -> Result<(), SyntaxError> {
    serde_json::from_str::<serde_json::Value>(source)
        .map(|_| ())
        .map_err(|e| SyntaxError {
            line: e.line().max(1),
            column: e.column().max(1),
            message: e.to_string(),
        })
}

fn check_toml(source: &str) -> Result<(), SyntaxError> {
    let err = match source.parse::<toml::Table>() {
        Ok(_) => return Ok(()),
        Err(err) => err,
    };
    let (line, column) = err
        .span()
        .map_or((1, 1), |span| line_col(source, span.start));
    Err(SyntaxError {
        line,
        column,
        message: err.message().to_string(),
    })
}

fn check_yaml(source: &str) -> Result<(), SyntaxError> {
    for document in serde_yaml::Deserializer::from_str(source) {
        if let Err(err) = serde_yaml::Value::deserialize(document) {
            let (line, column) = err
                .location()
                .map_or((1, 1), |loc| (loc.line().max(1), loc.column().max(1)));
            return Err(SyntaxError {
                line,
                column,
                message: err.to_string(),
            });
        }
    }
    Ok(())
}

/// 1-based line and column of a byte offset.
fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let mut offset = offset.min(source.len());
    while !source.is_char_boundary(offset) {
        offset -= 1;
    }
    let before = &source[..offset];
    let line = before.matches('\n').count() + 1;
    let column = match before.rfind('\n') {
        Some(nl) => before[nl + 1..].chars().count() + 1,
        None => before.chars().count() + 1,
    };
    (line, column)
}

/// Check one file; files with unknown extensions pass unchecked.
pub fn check_file(unit: &FileUnit) -> SyntaxCheck {
    let language = Language::detect(unit.file_name());
    let error = language.and_then(|lang| lang.check(&unit.content).err());
    SyntaxCheck {
        file: unit.name.clone(),
        language: language.map(|lang| lang.as_str().to_string()),
        valid: error.is_none(),
        error,
    }
}

/// Check every file, in input order.
pub fn check_syntax(files: &[FileUnit]) -> Vec<SyntaxCheck> {
    files.iter().map(check_file).collect()
}

/// Count total lines and lines carrying code.
pub(crate) fn metrics(unit: &FileUnit) -> FileMetrics {
    let comment = Language::detect(unit.file_name()).and_then(|lang| lang.line_comment());
    let mut metrics = FileMetrics::default();
    for line in unit.content.lines() {
        metrics.total_lines += 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || comment.is_some_and(|prefix| trimmed.starts_with(prefix)) {
            continue;
        }
        metrics.code_lines += 1;
    }
    metrics
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use super::*;

    #[test]
    fn test_detect() {
        assert_eq!(Language::detect("main.GO"), Some(Language::Go));
        assert_eq!(Language::detect("config/app.yml"), Some(Language::Yaml));
        assert_eq!(Language::detect("README.md"), None);
        assert_eq!(Language::detect("Makefile"), None);
    }

    #[test]
    fn test_json_error_location() {
        let err = Language::Json.check("{\n  \"a\": 1,\n  \"b\": \n}").unwrap_err();
        assert_eq!(err.line, 4);
    }

    #[test]
    fn test_toml_error_location() {
        let err = Language::Toml
            .check("[package]\nname = \"x\"\nversion = \n")
            .unwrap_err();
        assert_eq!(err.line, 3);
    }

    #[test]
    fn test_valid_structured_files() {
        assert!(Language::Toml.check("[a]\nb = 1\n").is_ok());
        assert!(Language::Yaml.check("a: 1\n---\nb: [1, 2]\n").is_ok());
        assert!(Language::Json.check("[1, 2, {\"x\": null}]").is_ok());
    }

    #[test]
    fn test_yaml_error() {
        let err = Language::Yaml.check("a: [1, 2\nb: 3\n").unwrap_err();
        assert!(err.line >= 1);
    }

    #[test]
    fn test_unknown_extension_passes() {
        let check = check_file(&FileUnit::new("notes.txt", "{{{"));
        assert!(check.valid);
        assert!(check.language.is_none());
    }

    #[test]
    fn test_check_file_reports_language_and_error() {
        let check = check_file(&FileUnit::new("pkg/main.go", "func main() {\n"));
        assert!(!check.valid);
        assert_eq!(check.language.as_deref(), Some("go"));
        assert_eq!(check.error.unwrap().line, 1);
    }

    #[test]
    fn test_metrics_skip_blank_and_comment_lines() {
        let unit = FileUnit::new("main.py", "# header\n\nimport os\n\nprint(os.name)  # trailing\n");
        let metrics = metrics(&unit);
        assert_eq!(metrics.total_lines, 5);
        assert_eq!(metrics.code_lines, 2);
    }

    #[test]
    fn test_line_col() {
        assert_eq!(line_col("ab\ncd", 4), (2, 2));
        assert_eq!(line_col("abc", 0), (1, 1));
    }
}

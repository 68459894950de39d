//! Static verification results for a generated bundle.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Location and cause of the first syntax problem in a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxError {
    /// 1-based line number.
    pub line: usize,
    /// 1-based column number.
    pub column: usize,
    pub message: String,
}

impl std::fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "syntax error at line {}, column {}: {}",
            self.line, self.column, self.message
        )
    }
}

/// Outcome of checking one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxCheck {
    pub file: String,
    /// Language the checker recognized, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<SyntaxError>,
}

/// Line counts for one file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetrics {
    pub total_lines: usize,
    /// Lines that are neither blank nor comment-only.
    pub code_lines: usize,
}

/// Verification of a bundle against syntax and required-file rules.
///
/// `passed` is `syntax_ok && structure_ok`. Warnings and suggestions never
/// affect it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub passed: bool,
    pub syntax_ok: bool,
    pub structure_ok: bool,
    /// Blocking problems, in discovery order.
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    /// Required file names that were not produced.
    #[serde(default)]
    pub missing: Vec<String>,
    #[serde(default)]
    pub files: Vec<SyntaxCheck>,
    #[serde(default)]
    pub metrics: BTreeMap<String, FileMetrics>,
}

impl Default for VerificationReport {
    fn default() -> Self {
        Self {
            passed: true,
            syntax_ok: true,
            structure_ok: true,
            issues: Vec::new(),
            warnings: Vec::new(),
            suggestions: Vec::new(),
            missing: Vec::new(),
            files: Vec::new(),
            metrics: BTreeMap::new(),
        }
    }
}

impl VerificationReport {
    /// One-line summary for progress logs.
    pub fn summary(&self) -> String {
        let verdict = if self.passed { "passed" } else { "failed" };
        format!(
            "verification {}: {} file(s) checked, {} issue(s), {} warning(s)",
            verdict,
            self.files.len(),
            self.issues.len(),
            self.warnings.len()
        )
    }
}

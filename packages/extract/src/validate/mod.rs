//! Static verification of a generated bundle.
//!
//! The validator never executes content. It combines per-file syntax checks
//! with a required-file check into one [`VerificationReport`].

mod markup;
mod scanner;
mod structure;
mod syntax;

use std::collections::BTreeMap;

use forge_core::{FileUnit, VerificationReport};

pub use structure::check_structure;
pub use syntax::{Language, check_file, check_syntax};

/// Below this many code lines across the bundle, suggest more substance.
const THIN_BUNDLE_CODE_LINES: usize = 50;

/// Verify a bundle against the syntax rules and the required-file list.
pub fn verify(files: &[FileUnit], required: &[String]) -> VerificationReport {
    let checks = check_syntax(files);
    let missing = check_structure(files, required);

    let mut issues: Vec<String> = missing
        .iter()
        .map(|name| format!("Missing required file: {}", name))
        .collect();
    for check in &checks {
        if let Some(error) = &check.error {
            issues.push(format!("{}: {}", check.file, error));
        }
    }

    let mut warnings = Vec::new();
    let mut by_final_name: BTreeMap<String, Vec<&str>> = BTreeMap::new();
    for unit in files {
        if unit.content.trim().is_empty() {
            warnings.push(format!("{}: file is empty", unit.name));
        }
        by_final_name
            .entry(unit.file_name().to_lowercase())
            .or_default()
            .push(&unit.name);
    }
    for (name, paths) in &by_final_name {
        if paths.len() > 1 {
            warnings.push(format!(
                "{} files are named {}: {}",
                paths.len(),
                name,
                paths.join(", ")
            ));
        }
    }

    let metrics: BTreeMap<_, _> = files
        .iter()
        .map(|unit| (unit.name.clone(), syntax::metrics(unit)))
        .collect();
    let code_lines: usize = metrics.values().map(|m| m.code_lines).sum();

    let mut suggestions = Vec::new();
    if code_lines < THIN_BUNDLE_CODE_LINES {
        suggestions
            .push("Consider adding more implementation details or documentation".to_string());
    }
    if !by_final_name.keys().any(|name| name.starts_with("readme")) {
        suggestions.push("Consider adding a README describing how to run the project".to_string());
    }

    let syntax_ok = checks.iter().all(|check| check.valid);
    let structure_ok = missing.is_empty();
    VerificationReport {
        passed: syntax_ok && structure_ok,
        syntax_ok,
        structure_ok,
        issues,
        warnings,
        suggestions,
        missing,
        files: checks,
        metrics,
    }
}

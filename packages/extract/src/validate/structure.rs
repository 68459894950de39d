//! Required-file presence checks.

use std::collections::HashSet;

use forge_core::FileUnit;

fn final_segment(name: &str) -> &str {
    let name = name.trim().trim_end_matches(['/', '\\']);
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

/// Required names with no produced file of the same final path segment,
/// compared case-insensitively, in the order they were required.
pub fn check_structure(files: &[FileUnit], required: &[String]) -> Vec<String> {
    let present: HashSet<String> = files
        .iter()
        .map(|unit| unit.file_name().to_lowercase())
        .collect();

    let mut seen = HashSet::new();
    required
        .iter()
        .filter(|name| {
            let key = final_segment(name).to_lowercase();
            !present.contains(&key) && seen.insert(key)
        })
        .cloned()
        .collect()
}

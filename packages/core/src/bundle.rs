//! Files recovered from pipeline outputs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One generated file: a relative path plus its full text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileUnit {
    #[serde(alias = "filename", alias = "path")]
    pub name: String,
    #[serde(alias = "code")]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FileUnit {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            description: None,
        }
    }

    /// The relative path with `./` prefixes, backslashes and empty segments
    /// normalized away.
    ///
    /// Returns `None` when the name is blank, absolute, or climbs out of the
    /// bundle root.
    pub fn normalized_name(&self) -> Option<String> {
        let name = self.name.trim().replace('\\', "/");
        if name.is_empty() || name.starts_with('/') || name.contains(':') {
            return None;
        }

        let mut segments = Vec::new();
        for segment in name.split('/') {
            match segment {
                "" | "." => continue,
                ".." => return None,
                other => segments.push(other),
            }
        }
        if segments.is_empty() {
            return None;
        }
        Some(segments.join("/"))
    }

    /// Final path segment of the name.
    pub fn file_name(&self) -> &str {
        let name = self.name.trim_end_matches(['/', '\\']);
        name.rsplit(['/', '\\']).next().unwrap_or(name)
    }

    /// A unit is usable when it has a safe name and non-blank content.
    pub fn is_usable(&self) -> bool {
        self.normalized_name().is_some() && !self.content.trim().is_empty()
    }
}

/// A set of files produced by one pipeline task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileBundle {
    pub files: Vec<FileUnit>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<String>,
    /// Test files keyed by relative path.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tests: BTreeMap<String, String>,
}

impl FileBundle {
    pub fn new(files: Vec<FileUnit>) -> Self {
        Self {
            files,
            dependencies: Vec::new(),
            entrypoint: None,
            tests: BTreeMap::new(),
        }
    }

    /// A bundle is usable when it has at least one file and every file,
    /// including tests, is usable.
    pub fn is_usable(&self) -> bool {
        !self.files.is_empty()
            && self.files.iter().all(FileUnit::is_usable)
            && self
                .tests
                .iter()
                .all(|(name, content)| FileUnit::new(name, content).is_usable())
    }

    /// Flatten into file units, tests last.
    pub fn into_units(self) -> Vec<FileUnit> {
        let mut units = self.files;
        units.extend(
            self.tests
                .into_iter()
                .map(|(name, content)| FileUnit::new(name, content)),
        );
        units
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use super::*;

    #[test]
    fn test_accepts_field_aliases() {
        let unit: FileUnit =
            serde_json::from_str(r#"{"filename": "main.go", "code": "package main"}"#).unwrap();
        assert_eq!(unit.name, "main.go");
        assert_eq!(unit.content, "package main");

        let unit: FileUnit =
            serde_json::from_str(r#"{"path": "src/app.js", "content": "x()"}"#).unwrap();
        assert_eq!(unit.name, "src/app.js");
    }

    #[test]
    fn test_normalized_name() {
        assert_eq!(
            FileUnit::new("./src//lib.rs", "x").normalized_name().as_deref(),
            Some("src/lib.rs")
        );
        assert_eq!(
            FileUnit::new("src\\main.py", "x").normalized_name().as_deref(),
            Some("src/main.py")
        );
        assert!(FileUnit::new("../etc/passwd", "x").normalized_name().is_none());
        assert!(FileUnit::new("/etc/passwd", "x").normalized_name().is_none());
        assert!(FileUnit::new("C:/temp/a", "x").normalized_name().is_none());
        assert!(FileUnit::new("   ", "x").normalized_name().is_none());
    }

    #[test]
    fn test_file_name() {
        assert_eq!(FileUnit::new("cmd/server/main.go", "").file_name(), "main.go");
        assert_eq!(FileUnit::new("README.md", "").file_name(), "README.md");
    }

    #[test]
    fn test_blank_content_is_unusable() {
        assert!(!FileUnit::new("main.py", "  \n\t").is_usable());
        assert!(FileUnit::new("main.py", "print(1)").is_usable());
    }

    #[test]
    fn test_bundle_units_include_tests() {
        let mut bundle = FileBundle::new(vec![FileUnit::new("main.py", "print(1)")]);
        bundle
            .tests
            .insert("tests/test_main.py".to_string(), "assert True".to_string());
        assert!(bundle.is_usable());

        let names: Vec<_> = bundle.into_units().into_iter().map(|u| u.name).collect();
        assert_eq!(names, ["main.py", "tests/test_main.py"]);
    }

    #[test]
    fn test_empty_bundle_is_unusable() {
        assert!(!FileBundle::new(Vec::new()).is_usable());
    }
}

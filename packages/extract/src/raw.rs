use forge_core::{FileBundle, FileUnit};
use serde::{Deserialize, Serialize};

/// One task output as handed back by a pipeline.
///
/// Pipelines are inconsistent: some return records, some return JSON values,
/// some return prose with JSON buried inside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum RawOutput {
    File(FileUnit),
    Bundle(FileBundle),
    Value(serde_json::Value),
    Text(String),
}

impl RawOutput {
    /// The output's text payload, if it carries one.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            RawOutput::Text(text) => Some(text),
            RawOutput::Value(serde_json::Value::String(text)) => Some(text),
            _ => None,
        }
    }
}

impl From<FileUnit> for RawOutput {
    fn from(unit: FileUnit) -> Self {
        RawOutput::File(unit)
    }
}

impl From<FileBundle> for RawOutput {
    fn from(bundle: FileBundle) -> Self {
        RawOutput::Bundle(bundle)
    }
}

impl From<String> for RawOutput {
    fn from(text: String) -> Self {
        RawOutput::Text(text)
    }
}

impl From<&str> for RawOutput {
    fn from(text: &str) -> Self {
        RawOutput::Text(text.to_string())
    }
}

impl From<serde_json::Value> for RawOutput {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(text) => RawOutput::Text(text),
            other => RawOutput::Value(other),
        }
    }
}

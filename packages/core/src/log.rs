//! Per-job progress log lines.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Severity of a progress line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Success => "SUCCESS",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line in a job's log history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    /// Position in the job's history, starting at zero.
    pub seq: u64,
    pub timestamp: DateTime<Local>,
    pub level: LogLevel,
    pub message: String,
}

impl LogLine {
    pub fn new(seq: u64, level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            seq,
            timestamp: Local::now(),
            level,
            message: message.into(),
        }
    }

    /// Render as `[HH:MM:SS] LEVEL: message`.
    pub fn render(&self) -> String {
        format!(
            "[{}] {}: {}",
            self.timestamp.format("%H:%M:%S"),
            self.level,
            self.message
        )
    }
}

impl std::fmt::Display for LogLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_render_format() {
        let line = LogLine {
            seq: 3,
            timestamp: Local.with_ymd_and_hms(2024, 5, 1, 9, 4, 7).unwrap(),
            level: LogLevel::Success,
            message: "Bundle written".to_string(),
        };
        assert_eq!(line.render(), "[09:04:07] SUCCESS: Bundle written");
    }
}

//! Event types for the live job log stream.

use serde::{Deserialize, Serialize};

use crate::{JobId, JobState, LogLine};

/// Events delivered to a log stream subscriber.
///
/// A stream yields one `Connected`, then every history line as `Log`, then
/// live `Log` and `Heartbeat` events until a single final `Status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// The subscription is open.
    Connected { job_id: JobId, status: JobState },
    /// A rendered log line.
    Log { message: String },
    /// No line arrived within the heartbeat interval.
    Heartbeat,
    /// The job reached a terminal state. Always the last event.
    Status {
        status: JobState,
        #[serde(rename = "final")]
        is_final: bool,
    },
}

impl StreamEvent {
    pub fn log(line: &LogLine) -> Self {
        StreamEvent::Log {
            message: line.render(),
        }
    }

    pub fn terminal(status: JobState) -> Self {
        StreamEvent::Status {
            status,
            is_final: true,
        }
    }

    /// Get the event's wire tag.
    pub fn event_type(&self) -> &'static str {
        match self {
            StreamEvent::Connected { .. } => "connected",
            StreamEvent::Log { .. } => "log",
            StreamEvent::Heartbeat => "heartbeat",
            StreamEvent::Status { .. } => "status",
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, StreamEvent::Status { is_final: true, .. })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use super::*;

    #[test]
    fn test_wire_format() {
        let json = serde_json::to_value(StreamEvent::terminal(JobState::Completed)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "status", "status": "completed", "final": true})
        );

        let json = serde_json::to_value(StreamEvent::Heartbeat).unwrap();
        assert_eq!(json, serde_json::json!({"type": "heartbeat"}));

        let id = JobId::new();
        let json = serde_json::to_value(StreamEvent::Connected {
            job_id: id,
            status: JobState::Pending,
        })
        .unwrap();
        assert_eq!(json["type"], "connected");
        assert_eq!(json["job_id"], id.to_string());
        assert_eq!(json["status"], "pending");
    }
}

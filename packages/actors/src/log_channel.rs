//! Per-job log history with a bounded live feed.

use std::sync::{Mutex, MutexGuard, PoisonError};

use forge_core::{JobId, JobState, LogLevel, LogLine};
use tokio::sync::{broadcast, watch};

/// Default number of lines buffered for live subscribers.
pub const DEFAULT_LIVE_CAPACITY: usize = 256;

/// Everything a subscriber needs to replay and then tail a channel.
///
/// `history` and `live` are taken under the same lock, so the first live line
/// is exactly the one after the last history line.
pub struct Subscription {
    pub history: Vec<LogLine>,
    pub live: broadcast::Receiver<LogLine>,
    /// Current job state, or `None` once the job is deleted.
    pub state: watch::Receiver<Option<JobState>>,
}

/// Log channel for one job.
///
/// Every line is appended to the history before it is sent live. The live
/// feed is bounded: a slow subscriber misses live lines but can always catch
/// up from history by sequence number.
pub struct LogChannel {
    job_id: JobId,
    history: Mutex<Vec<LogLine>>,
    live: broadcast::Sender<LogLine>,
    state: watch::Sender<Option<JobState>>,
}

impl std::fmt::Debug for LogChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogChannel")
            .field("job_id", &self.job_id)
            .field("lines", &self.len())
            .field("state", &self.state())
            .finish()
    }
}

impl LogChannel {
    pub fn new(job_id: JobId, capacity: usize) -> Self {
        let (live, _) = broadcast::channel(capacity.max(1));
        let (state, _) = watch::channel(Some(JobState::Pending));
        Self {
            job_id,
            history: Mutex::new(Vec::new()),
            live,
            state,
        }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    fn lock(&self) -> MutexGuard<'_, Vec<LogLine>> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a line and publish it to live subscribers. Never blocks on
    /// subscribers.
    pub fn append(&self, level: LogLevel, message: impl Into<String>) -> LogLine {
        let message = message.into();
        match level {
            LogLevel::Error => tracing::error!(job_id = %self.job_id, "{}", message),
            LogLevel::Warning => tracing::warn!(job_id = %self.job_id, "{}", message),
            LogLevel::Debug => tracing::debug!(job_id = %self.job_id, "{}", message),
            LogLevel::Info | LogLevel::Success => {
                tracing::info!(job_id = %self.job_id, "{}", message)
            }
        }

        let mut history = self.lock();
        let line = LogLine::new(history.len() as u64, level, message);
        history.push(line.clone());
        // No receivers is fine: history keeps the line.
        let _ = self.live.send(line.clone());
        line
    }

    pub fn info(&self, message: impl Into<String>) -> LogLine {
        self.append(LogLevel::Info, message)
    }

    pub fn success(&self, message: impl Into<String>) -> LogLine {
        self.append(LogLevel::Success, message)
    }

    pub fn warning(&self, message: impl Into<String>) -> LogLine {
        self.append(LogLevel::Warning, message)
    }

    pub fn error(&self, message: impl Into<String>) -> LogLine {
        self.append(LogLevel::Error, message)
    }

    /// Snapshot of the full history.
    pub fn history(&self) -> Vec<LogLine> {
        self.lock().clone()
    }

    /// History lines with `seq >= from`.
    pub fn history_from(&self, from: u64) -> Vec<LogLine> {
        let history = self.lock();
        let start = usize::try_from(from).unwrap_or(usize::MAX).min(history.len());
        history[start..].to_vec()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn subscribe(&self) -> Subscription {
        let history = self.lock();
        Subscription {
            history: history.clone(),
            live: self.live.subscribe(),
            state: self.state.subscribe(),
        }
    }

    /// Publish the job's current state to subscribers.
    pub fn set_state(&self, state: JobState) {
        self.state.send_replace(Some(state));
    }

    /// Mark the job as deleted; tailing subscribers end.
    pub fn close(&self) {
        self.state.send_replace(None);
    }

    pub fn state(&self) -> Option<JobState> {
        *self.state.borrow()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use super::*;

    #[test]
    fn test_append_assigns_sequence_numbers() {
        let channel = LogChannel::new(JobId::new(), 8);
        channel.info("one");
        channel.warning("two");
        let line = channel.success("three");

        assert_eq!(line.seq, 2);
        let history = channel.history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[1].level, LogLevel::Warning);
        assert_eq!(channel.history_from(1).len(), 2);
        assert!(channel.history_from(10).is_empty());
    }

    #[tokio::test]
    async fn test_subscription_continues_after_history() {
        let channel = LogChannel::new(JobId::new(), 8);
        channel.info("before");

        let mut sub = channel.subscribe();
        channel.info("after");

        assert_eq!(sub.history.len(), 1);
        let live = sub.live.recv().await.unwrap();
        assert_eq!(live.seq, 1);
        assert_eq!(live.message, "after");
    }

    #[tokio::test]
    async fn test_full_live_feed_does_not_block_append() {
        let channel = LogChannel::new(JobId::new(), 2);
        let mut sub = channel.subscribe();
        for i in 0..10 {
            channel.info(format!("line {i}"));
        }

        assert_eq!(channel.len(), 10);
        assert!(matches!(
            sub.live.recv().await,
            Err(broadcast::error::RecvError::Lagged(_))
        ));
    }

    #[test]
    fn test_state_and_close() {
        let channel = LogChannel::new(JobId::new(), 2);
        let sub = channel.subscribe();
        assert_eq!(*sub.state.borrow(), Some(JobState::Pending));

        channel.set_state(JobState::Processing);
        assert_eq!(channel.state(), Some(JobState::Processing));

        channel.close();
        assert_eq!(*sub.state.borrow(), None);
    }
}

//! Replay-then-tail view of a job's log channel.

use std::sync::Arc;
use std::time::Duration;

use forge_core::StreamEvent;
use futures_util::Stream;
use tokio::sync::broadcast::error::RecvError;

use crate::log_channel::{LogChannel, Subscription};

/// How long the tail waits for a line before sending a heartbeat.
pub const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(1);

enum Wake {
    Lines,
    StateChanged,
    Heartbeat,
    Closed,
}

/// Stream a job's log.
///
/// Yields `Connected` with the current state, every history line, then live
/// lines with a `Heartbeat` whenever `heartbeat` passes without one. When
/// the job reaches a terminal state the remaining lines are flushed and a
/// final `Status` ends the stream. If the job is deleted the stream ends
/// without a final status.
///
/// The channel is subscribed when this is called, so `Connected` reports the
/// state at that moment rather than at first poll.
///
/// Lines are delivered by sequence number, so a subscriber that falls behind
/// the live feed resumes from history with no gaps or repeats. Dropping the
/// stream has no effect on the job.
pub fn event_stream(
    channel: Arc<LogChannel>,
    heartbeat: Duration,
) -> impl Stream<Item = StreamEvent> + Send + 'static {
    let Subscription {
        history,
        mut live,
        mut state,
    } = channel.subscribe();
    async_stream::stream! {
        let initial = *state.borrow_and_update();
        let Some(initial) = initial else {
            return;
        };

        yield StreamEvent::Connected {
            job_id: channel.job_id(),
            status: initial,
        };

        let mut next_seq = 0;
        for line in history {
            next_seq = line.seq + 1;
            yield StreamEvent::log(&line);
        }

        loop {
            let current = *state.borrow_and_update();
            match current {
                None => break,
                Some(status) if status.is_terminal() => {
                    for line in channel.history_from(next_seq) {
                        yield StreamEvent::log(&line);
                    }
                    yield StreamEvent::terminal(status);
                    break;
                }
                Some(_) => {}
            }

            let wake = tokio::select! {
                received = live.recv() => match received {
                    Ok(line) if line.seq < next_seq => continue,
                    Ok(_) | Err(RecvError::Lagged(_)) => Wake::Lines,
                    Err(RecvError::Closed) => Wake::Closed,
                },
                changed = state.changed() => match changed {
                    Ok(()) => Wake::StateChanged,
                    Err(_) => Wake::Closed,
                },
                _ = tokio::time::sleep(heartbeat) => Wake::Heartbeat,
            };

            match wake {
                Wake::Lines => {
                    for line in channel.history_from(next_seq) {
                        next_seq = line.seq + 1;
                        yield StreamEvent::log(&line);
                    }
                }
                Wake::StateChanged => {}
                Wake::Heartbeat => yield StreamEvent::Heartbeat,
                Wake::Closed => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use forge_core::{JobId, JobState};
    use futures_util::StreamExt;

    use super::*;

    fn messages(events: &[StreamEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|event| match event {
                StreamEvent::Log { message } => {
                    Some(message.split_once(": ").map_or(message.clone(), |(_, m)| m.to_string()))
                }
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_replays_history_then_final_status() {
        let channel = Arc::new(LogChannel::new(JobId::new(), 8));
        channel.info("a");
        channel.info("b");
        channel.set_state(JobState::Processing);
        channel.set_state(JobState::Completed);

        let events: Vec<_> = event_stream(channel.clone(), DEFAULT_HEARTBEAT)
            .collect()
            .await;

        assert!(matches!(
            events[0],
            StreamEvent::Connected {
                status: JobState::Completed,
                ..
            }
        ));
        assert_eq!(messages(&events), ["a", "b"]);
        assert_eq!(events.last(), Some(&StreamEvent::terminal(JobState::Completed)));
        assert_eq!(events.iter().filter(|e| e.is_final()).count(), 1);
    }

    #[tokio::test]
    async fn test_connected_reports_state_at_subscribe_time() {
        let channel = Arc::new(LogChannel::new(JobId::new(), 8));
        let stream = event_stream(channel.clone(), DEFAULT_HEARTBEAT);

        channel.set_state(JobState::Processing);
        channel.info("working");
        channel.set_state(JobState::Completed);
        let events: Vec<_> = stream.collect().await;

        assert!(matches!(
            events[0],
            StreamEvent::Connected {
                status: JobState::Pending,
                ..
            }
        ));
        assert_eq!(messages(&events), ["working"]);
        assert_eq!(events.last(), Some(&StreamEvent::terminal(JobState::Completed)));
    }

    #[tokio::test]
    async fn test_live_lines_and_heartbeat() {
        let channel = Arc::new(LogChannel::new(JobId::new(), 8));
        channel.set_state(JobState::Processing);
        let mut stream = Box::pin(event_stream(channel.clone(), Duration::from_millis(20)));

        assert!(matches!(stream.next().await, Some(StreamEvent::Connected { .. })));
        assert_eq!(stream.next().await, Some(StreamEvent::Heartbeat));

        channel.info("live");
        let event = stream.next().await.unwrap();
        assert_eq!(messages(&[event]), ["live"]);

        channel.error("Error: pipeline failed");
        channel.set_state(JobState::Failed);
        let rest: Vec<_> = stream.collect().await;
        let logs = messages(&rest);
        assert_eq!(logs, ["Error: pipeline failed"]);
        assert_eq!(rest.last(), Some(&StreamEvent::terminal(JobState::Failed)));
    }

    #[tokio::test]
    async fn test_lagging_subscriber_has_no_gaps_or_repeats() {
        let channel = Arc::new(LogChannel::new(JobId::new(), 2));
        channel.set_state(JobState::Processing);
        let mut stream = Box::pin(event_stream(channel.clone(), DEFAULT_HEARTBEAT));
        assert!(matches!(stream.next().await, Some(StreamEvent::Connected { .. })));

        for i in 0..50 {
            channel.info(format!("line {i}"));
        }
        channel.set_state(JobState::Completed);

        let rest: Vec<_> = stream.collect().await;
        let expected: Vec<String> = (0..50).map(|i| format!("line {i}")).collect();
        assert_eq!(messages(&rest), expected);
    }

    #[tokio::test]
    async fn test_closed_channel_ends_without_status() {
        let channel = Arc::new(LogChannel::new(JobId::new(), 8));
        channel.set_state(JobState::Processing);
        let mut stream = Box::pin(event_stream(channel.clone(), DEFAULT_HEARTBEAT));
        assert!(matches!(stream.next().await, Some(StreamEvent::Connected { .. })));

        channel.close();
        let rest: Vec<_> = stream.collect().await;
        assert!(rest.iter().all(|e| !e.is_final()));
    }
}

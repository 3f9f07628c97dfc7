//! Per-question countdowns.
//!
//! Each started timer runs as a tokio task that sleeps until its deadline and
//! then sends a single [`TimerEvent`] to the owner's channel, unless the
//! returned [`TimerHandle`] was cancelled or dropped first.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::types::{PlayerId, SessionId};

/// Delivered when a question's countdown runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerEvent {
    pub player: PlayerId,
    pub session_id: SessionId,
    /// Sequence number of the question the timer was started for
    pub seq: u32,
}

/// Starts countdowns that report to one event channel.
#[derive(Debug, Clone)]
pub struct Timer {
    events: mpsc::UnboundedSender<TimerEvent>,
}

impl Timer {
    pub fn new(events: mpsc::UnboundedSender<TimerEvent>) -> Self {
        Self { events }
    }

    /// Starts a countdown. `event` is sent once when `duration` elapses.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, duration: Duration, event: TimerEvent) -> TimerHandle {
        let deadline = Instant::now() + duration;
        let token = CancellationToken::new();
        let fired = Arc::new(AtomicBool::new(false));

        let task_token = token.clone();
        let task_fired = Arc::clone(&fired);
        let events = self.events.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = task_token.cancelled() => {}
                _ = tokio::time::sleep_until(deadline) => {
                    if !task_token.is_cancelled() && !task_fired.swap(true, Ordering::AcqRel) {
                        // receiver gone means the owner shut down
                        let _ = events.send(event);
                    }
                }
            }
        });

        TimerHandle {
            token,
            fired,
            deadline,
            duration,
        }
    }
}

/// Owner's side of a running countdown. Dropping it cancels the countdown.
#[derive(Debug)]
pub struct TimerHandle {
    token: CancellationToken,
    fired: Arc<AtomicBool>,
    deadline: Instant,
    duration: Duration,
}

impl TimerHandle {
    /// Stops the countdown. No-op if it already fired or was cancelled.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// True once the expiry event has been sent.
    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    /// True once the deadline has passed, whether or not the event was delivered yet.
    pub fn is_expired(&self) -> bool {
        self.has_fired() || Instant::now() >= self.deadline
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Budget the countdown was started with.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn event(seq: u32) -> TimerEvent {
        TimerEvent {
            player: PlayerId(1),
            session_id: Uuid::nil(),
            seq,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_exactly_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let timer = Timer::new(tx);
        let handle = timer.start(Duration::from_secs(15), event(1));

        assert!(!handle.is_expired());
        let received = rx.recv().await.unwrap();
        assert_eq!(received, event(1));
        assert!(handle.has_fired());
        assert!(handle.is_expired());
        assert_eq!(handle.remaining(), Duration::ZERO);

        // cancelling after expiry is a no-op
        handle.cancel();
        drop(handle);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_suppresses_event() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let timer = Timer::new(tx);
        let handle = timer.start(Duration::from_secs(15), event(1));

        tokio::time::sleep(Duration::from_secs(5)).await;
        handle.cancel();
        handle.cancel();
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert!(handle.is_cancelled());
        assert!(!handle.has_fired());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let timer = Timer::new(tx);
        drop(timer.start(Duration::from_secs(1), event(1)));
        let kept = timer.start(Duration::from_secs(2), event(2));

        assert_eq!(rx.recv().await.unwrap().seq, 2);
        assert!(kept.has_fired());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_remaining_counts_down() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let timer = Timer::new(tx);
        let handle = timer.start(Duration::from_secs(20), event(1));

        tokio::time::sleep(Duration::from_secs(8)).await;
        assert_eq!(handle.remaining(), Duration::from_secs(12));
        assert_eq!(handle.duration(), Duration::from_secs(20));
        assert!(!handle.is_expired());
    }
}

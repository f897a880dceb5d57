//! Recording timer
//!
//! Periodic tick source that runs only while a segment is being recorded.
//! Each tick reports the fixed interval, not measured wall-clock time.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

/// Default tick interval
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

pub struct RecordingTimer {
    interval: Duration,
    ticker: Option<JoinHandle<()>>,
}

impl RecordingTimer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            ticker: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_active(&self) -> bool {
        self.ticker
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Start delivering ticks to `on_tick`.
    ///
    /// No-op when already active. The task ends when `on_tick` returns
    /// `false`, e.g. because its receiver is gone.
    pub fn start<F>(&mut self, mut on_tick: F)
    where
        F: FnMut(Duration) -> bool + Send + 'static,
    {
        if self.is_active() {
            return;
        }

        let interval = self.interval;
        let handle = tokio::spawn(async move {
            let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if !on_tick(interval) {
                    tracing::debug!("Tick receiver gone, stopping timer");
                    break;
                }
            }
        });

        self.ticker = Some(handle);
        tracing::debug!("Recording timer started ({:?} interval)", self.interval);
    }

    /// Stop delivering ticks. No-op when inactive.
    pub fn stop(&mut self) {
        if let Some(handle) = self.ticker.take() {
            handle.abort();
            tracing::debug!("Recording timer stopped");
        }
    }
}

impl Default for RecordingTimer {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_INTERVAL)
    }
}

impl Drop for RecordingTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_ticks_deliver_fixed_interval() {
        let mut timer = RecordingTimer::default();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        timer.start(move |delta| tx.send(delta).is_ok());

        for _ in 0..3 {
            let delta = rx.recv().await.unwrap();
            assert_eq!(delta, DEFAULT_TICK_INTERVAL);
        }
        timer.stop();
        assert!(!timer.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_twice_keeps_single_ticker() {
        let count = Arc::new(AtomicU32::new(0));
        let mut timer = RecordingTimer::new(Duration::from_millis(100));

        for _ in 0..2 {
            let count = count.clone();
            timer.start(move |_| {
                count.fetch_add(1, Ordering::SeqCst);
                true
            });
        }

        time::sleep(Duration::from_millis(1050)).await;
        timer.stop();
        assert_eq!(count.load(Ordering::SeqCst), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_when_inactive_is_noop() {
        let mut timer = RecordingTimer::default();
        timer.stop();
        assert!(!timer.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_callback_returning_false_ends_timer() {
        let mut timer = RecordingTimer::default();
        timer.start(|_| false);

        time::sleep(Duration::from_millis(250)).await;
        assert!(!timer.is_active());
    }
}

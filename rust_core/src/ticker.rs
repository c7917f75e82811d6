//! Fixed-period scheduler.
//!
//! A [`Ticker`] owns one background task that invokes its callback every
//! `period`. It is a pure timing primitive: callbacks handle their own
//! errors, and a slow callback causes missed periods to be skipped rather
//! than replayed in a burst.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

use crate::error::LineError;

/// Handle to a running periodic callback. Dropping it stops the ticker.
#[derive(Debug)]
pub struct Ticker {
    /// Held while deciding to start a run and while stopping
    stopped: Arc<Mutex<bool>>,
    stop_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl Ticker {
    /// Invoke `callback` once per `period`, first one full period from now.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<F, Fut>(period: Duration, mut callback: F) -> Result<Self, LineError>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if period.is_zero() {
            return Err(LineError::invalid_argument("ticker period must be non-zero"));
        }

        let stopped = Arc::new(Mutex::new(false));
        let gate = stopped.clone();
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    // Also fires when the handle is dropped
                    _ = stop_rx.changed() => break,
                }

                let run = {
                    let stopped = gate.lock();
                    if *stopped {
                        break;
                    }
                    callback()
                };
                run.await;
            }

            debug!(period_ms = period.as_millis() as u64, "Ticker stopped");
        });

        Ok(Self {
            stopped,
            stop_tx,
            task: Some(task),
        })
    }

    /// Prevent any further callback from starting. Does not wait for an
    /// in-flight callback; calling it again is a no-op.
    pub fn stop(&self) {
        *self.stopped.lock() = true;
        self.stop_tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.stopped.lock()
    }

    /// Stop and wait for an in-flight callback to finish.
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn counting_ticker(period: Duration) -> (Ticker, Arc<AtomicU32>) {
        let count = Arc::new(AtomicU32::new(0));
        let counter = count.clone();
        let ticker = Ticker::start(period, move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        })
        .unwrap();
        (ticker, count)
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_within_one_and_a_half_periods() {
        let (ticker, count) = counting_ticker(Duration::from_secs(1));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);

        ticker.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_invocation_after_stop() {
        let (ticker, count) = counting_ticker(Duration::from_secs(1));

        tokio::time::sleep(Duration::from_millis(3500)).await;
        ticker.stop();
        let seen = count.load(Ordering::SeqCst);
        assert_eq!(seen, 3);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), seen);
        assert!(ticker.is_stopped());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent() {
        let (ticker, count) = counting_ticker(Duration::from_millis(100));

        ticker.stop();
        ticker.stop();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_during_in_flight_callback() {
        let started = Arc::new(AtomicU32::new(0));
        let finished = Arc::new(AtomicU32::new(0));
        let (s, f) = (started.clone(), finished.clone());

        let ticker = Ticker::start(Duration::from_secs(1), move || {
            let (s, f) = (s.clone(), f.clone());
            async move {
                s.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(5)).await;
                f.fetch_add(1, Ordering::SeqCst);
            }
        })
        .unwrap();

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(started.load(Ordering::SeqCst), 1);

        // Returns immediately even though the callback is mid-flight
        ticker.stop();
        ticker.shutdown().await;

        assert_eq!(started.load(Ordering::SeqCst), 1);
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_callback_never_overlaps() {
        let count = Arc::new(AtomicU32::new(0));
        let in_flight = Arc::new(AtomicU32::new(0));
        let max_in_flight = Arc::new(AtomicU32::new(0));
        let (c, i, m) = (count.clone(), in_flight.clone(), max_in_flight.clone());

        let ticker = Ticker::start(Duration::from_secs(1), move || {
            let (c, i, m) = (c.clone(), i.clone(), m.clone());
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                let now = i.fetch_add(1, Ordering::SeqCst) + 1;
                m.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(3500)).await;
                i.fetch_sub(1, Ordering::SeqCst);
            }
        })
        .unwrap();

        // First run covers 1s..4.5s; the missed periods collapse into a
        // single run starting at 4.5s
        tokio::time::sleep(Duration::from_millis(4800)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);

        ticker.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_ticker() {
        let (ticker, count) = counting_ticker(Duration::from_secs(1));
        drop(ticker);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_independent_tickers() {
        let (fast, fast_count) = counting_ticker(Duration::from_secs(1));
        let (slow, slow_count) = counting_ticker(Duration::from_secs(2));

        tokio::time::sleep(Duration::from_millis(4500)).await;
        fast.stop();
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(fast_count.load(Ordering::SeqCst), 4);
        assert_eq!(slow_count.load(Ordering::SeqCst), 3);
        slow.stop();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_no_run_starts_once_stop_returns() {
        for _ in 0..50 {
            let count = Arc::new(AtomicU32::new(0));
            let counter = count.clone();
            // Counted when the run is started, not when its future is polled
            let ticker = Ticker::start(Duration::from_millis(1), move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async {}
            })
            .unwrap();

            tokio::time::sleep(Duration::from_millis(5)).await;
            ticker.stop();
            let seen = count.load(Ordering::SeqCst);

            tokio::time::sleep(Duration::from_millis(10)).await;
            assert_eq!(count.load(Ordering::SeqCst), seen);
        }
    }

    #[tokio::test]
    async fn test_zero_period_rejected() {
        let result = Ticker::start(Duration::ZERO, || async {});
        assert!(result.unwrap_err().is_invalid_argument());
    }
}

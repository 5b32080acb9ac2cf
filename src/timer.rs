// src/timer.rs - Cancellable recurring timer for the periodic check
use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Periodic background task. Fires the callback once per period, the first
/// time a full period after spawn. Cancellation is cooperative: a tick that
/// is already running finishes, and no further ticks fire.
pub struct RecurringTimer {
    shutdown_tx: broadcast::Sender<()>,
    handle: JoinHandle<()>,
}

impl RecurringTimer {
    pub fn spawn<F, Fut>(period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ControlFlow<()>> + Send + 'static,
    {
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // An interval yields immediately on its first tick; consume it so
            // the callback first runs one full period from now.
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        tracing::debug!("recurring timer cancelled");
                        break;
                    }
                    _ = interval.tick() => {
                        if tick().await.is_break() {
                            break;
                        }
                    }
                }
            }
        });
        Self {
            shutdown_tx,
            handle,
        }
    }

    /// Stops future firings. Safe to call more than once.
    pub fn cancel(&self) {
        let _ = self.shutdown_tx.send(());
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn counting_timer(period: Duration, stop_after: Option<u32>) -> (RecurringTimer, Arc<AtomicU32>) {
        let count = Arc::new(AtomicU32::new(0));
        let ticks = Arc::clone(&count);
        let timer = RecurringTimer::spawn(period, move || {
            let ticks = Arc::clone(&ticks);
            async move {
                let seen = ticks.fetch_add(1, Ordering::SeqCst) + 1;
                match stop_after {
                    Some(limit) if seen >= limit => ControlFlow::Break(()),
                    _ => ControlFlow::Continue(()),
                }
            }
        });
        (timer, count)
    }

    #[tokio::test(start_paused = true)]
    async fn fires_once_per_period_until_cancelled() {
        let (timer, count) = counting_timer(Duration::from_secs(30), None);
        tokio::time::sleep(Duration::from_secs(95)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);

        timer.cancel();
        timer.cancel();
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert!(timer.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn does_not_fire_before_the_first_period() {
        let (_timer, count) = counting_timer(Duration::from_secs(30), None);
        tokio::time::sleep(Duration::from_secs(29)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn break_from_the_callback_stops_the_timer() {
        let (timer, count) = counting_timer(Duration::from_secs(30), Some(1));
        tokio::time::sleep(Duration::from_secs(200)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(timer.is_finished());
    }
}

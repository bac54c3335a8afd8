//! Cancellable periodic tasks.
//!
//! A `PeriodicTask` runs a callback every `period` on the context's timeline
//! until it is stopped, dropped, or the callback asks to break. Stopping is
//! synchronous: once `stop()` returns the callback will not run again.

use railview_env::RailViewContext;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Shortest period a task will run at; a zero period would never yield to the timer.
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Handle to a running periodic task. Dropping it stops the task.
pub struct PeriodicTask {
    name: String,
    stop_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    /// Spawns `tick` every `period` through `ctx`.
    ///
    /// # Arguments
    /// * `ctx` - Context providing time and task spawning
    /// * `name` - Task name (for logging)
    /// * `period` - Delay between ticks, at least [`MIN_PERIOD`]; the first tick
    ///   fires after one period
    /// * `tick` - Callback; returning `ControlFlow::Break` ends the task
    pub fn spawn<Ctx, F>(ctx: Arc<Ctx>, name: &str, period: Duration, mut tick: F) -> Self
    where
        Ctx: RailViewContext,
        F: FnMut() -> ControlFlow<()> + Send + 'static,
    {
        if period < MIN_PERIOD {
            warn!(task = name, ?period, "period too short, using {:?}", MIN_PERIOD);
        }
        let period = period.max(MIN_PERIOD);
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let task_ctx = ctx.clone();
        let task_name = name.to_string();

        let handle = ctx.spawn(name, async move {
            loop {
                tokio::select! {
                    biased;
                    // Also fires when the sender is dropped
                    _ = stop_rx.changed() => break,
                    _ = task_ctx.sleep(period) => {}
                }
                if *stop_rx.borrow() {
                    break;
                }
                if tick().is_break() {
                    debug!(task = %task_name, "periodic task finished itself");
                    break;
                }
            }
        });

        Self {
            name: name.to_string(),
            stop_tx,
            handle: Some(handle),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// True once the task has exited (stopped or finished itself).
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map(|h| h.is_finished()).unwrap_or(true)
    }

    /// Signals and aborts the task.
    pub fn stop(&mut self) {
        let _ = self.stop_tx.send(true);
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!(task = %self.name, "periodic task stopped");
        }
    }

    /// Signals the task and waits for it to exit.
    pub async fn shutdown(mut self) {
        let _ = self.stop_tx.send(true);
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
            debug!(task = %self.name, "periodic task shut down");
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use railview_env::TokioContext;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(counter: &Arc<AtomicUsize>) -> impl FnMut() -> ControlFlow<()> + Send + 'static {
        let counter = counter.clone();
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            ControlFlow::Continue(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_task_ticks_and_stops() {
        let ctx = TokioContext::shared();
        let counter = Arc::new(AtomicUsize::new(0));

        let mut task = PeriodicTask::spawn(ctx, "tick", Duration::from_millis(100), counting(&counter));

        tokio::time::sleep(Duration::from_millis(450)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 4);

        task.stop();
        assert!(task.is_finished());
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_task() {
        let ctx = TokioContext::shared();
        let counter = Arc::new(AtomicUsize::new(0));

        let task = PeriodicTask::spawn(ctx, "blink", Duration::from_millis(50), counting(&counter));
        tokio::time::sleep(Duration::from_millis(120)).await;
        drop(task);

        let seen = counter.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(counter.load(Ordering::SeqCst), seen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_waits_for_exit() {
        let ctx = TokioContext::shared();
        let counter = Arc::new(AtomicUsize::new(0));

        let task = PeriodicTask::spawn(ctx, "tick", Duration::from_millis(100), counting(&counter));
        tokio::time::sleep(Duration::from_millis(250)).await;
        task.shutdown().await;

        let seen = counter.load(Ordering::SeqCst);
        assert_eq!(seen, 2);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(counter.load(Ordering::SeqCst), seen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_period_is_floored() {
        let ctx = TokioContext::shared();
        let counter = Arc::new(AtomicUsize::new(0));

        let mut task = PeriodicTask::spawn(ctx, "zero", Duration::ZERO, counting(&counter));
        tokio::time::sleep(Duration::from_micros(10_500)).await;
        task.stop();

        assert_eq!(counter.load(Ordering::SeqCst), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_break_ends_task() {
        let ctx = TokioContext::shared();
        let counter = Arc::new(AtomicUsize::new(0));
        let task_counter = counter.clone();

        let task = PeriodicTask::spawn(ctx, "once", Duration::from_millis(10), move || {
            if task_counter.fetch_add(1, Ordering::SeqCst) >= 2 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert!(task.is_finished());
    }
}

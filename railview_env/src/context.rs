//! Core environment context trait for RailView runtimes.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

/// The central interface for time and task management.
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `tokio::time` and `tokio::spawn`
/// - **Simulation**: `SimContext` (in `railview_sim`) - a manually advanced
///   virtual clock
///
/// Periodic work (the simulation tick, the held-entity blink) is always
/// spawned through the context, and the returned handle is owned by
/// whoever must tear it down.
#[async_trait]
pub trait RailViewContext: Send + Sync + 'static {
    /// Returns the current monotonic time since context creation.
    fn now(&self) -> Duration;

    /// Suspends execution for the given duration.
    ///
    /// In production: wraps `tokio::time::sleep`
    /// In simulation: advances the virtual clock and yields
    async fn sleep(&self, duration: Duration);

    /// Spawns a background task and returns its handle.
    ///
    /// The caller owns the handle; aborting it must stop the task before
    /// its next suspension point.
    fn spawn<F>(&self, name: &str, future: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static;
}

//! Deferred notification of scheduling decisions.

use std::future::Future;

use async_trait::async_trait;

use crate::core::events::DispatchEvent;

/// Abstraction for spawning notification work on a runtime.
pub trait Spawn {
    /// Spawn an async task that returns a future.
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static;
}

/// Receives dispatch events after the decision has been applied.
///
/// Listeners run outside the scheduler lock, typically forwarding the job
/// to the resource or persisting the event. They cannot influence the
/// decision.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use grid_scheduler::core::{DispatchEvent, DispatchListener};
///
/// struct Forwarder;
///
/// #[async_trait]
/// impl DispatchListener for Forwarder {
///     async fn on_dispatch(&self, event: DispatchEvent) {
///         tracing::info!("forwarding {} to {}", event.job_id, event.resource_id);
///     }
/// }
/// ```
#[async_trait]
pub trait DispatchListener: Send + Sync + 'static {
    /// Handle one dispatch.
    async fn on_dispatch(&self, event: DispatchEvent);
}

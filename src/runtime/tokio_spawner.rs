//! Tokio runtime spawner for dispatch notifications.

use std::future::Future;
use std::sync::Arc;

use tracing::Instrument;

use crate::core::Spawn;

/// Runs listener futures on a tokio runtime.
///
/// Each future is attached to the span active at spawn time, so listener
/// logs line up with the scheduling decision that produced them.
#[derive(Clone)]
pub struct TokioSpawner {
    handle: Arc<tokio::runtime::Handle>,
}

impl TokioSpawner {
    /// Spawner on the runtime behind `handle`.
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self {
            handle: Arc::new(handle),
        }
    }

    /// Spawner on the runtime driving the current task, if any.
    pub fn try_current() -> Option<Self> {
        tokio::runtime::Handle::try_current().ok().map(Self::new)
    }
}

impl Spawn for TokioSpawner {
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handle.spawn(fut.in_current_span());
    }
}

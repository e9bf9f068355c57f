//! Error types for scheduler operations.

use thiserror::Error;

use crate::expr::ExpressionError;
use crate::util::serde::JobId;

/// Errors produced by scheduler components.
///
/// Only boundary errors (`InvalidJob`, `InvalidResource`, `DuplicateJob`,
/// `QueueFull`) reach submitters. `OutOfRange` and `JobVanished` indicate a
/// bug in a scheduling policy and abort the current scheduling tick.
/// Expression failures are contained inside `schedule` and never surface
/// from it.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Malformed job record at the submission boundary.
    #[error("invalid job: {0}")]
    InvalidJob(String),
    /// Malformed resource record at the heartbeat boundary.
    #[error("invalid resource: {0}")]
    InvalidResource(String),
    /// A job with the same identifier is already queued.
    #[error("duplicate job: {0} is already queued")]
    DuplicateJob(JobId),
    /// Queue is full.
    #[error("queue full: {0}")]
    QueueFull(String),
    /// `dequeue_at` was called with an index past the end of the queue.
    #[error("queue index {index} out of range (len {len})")]
    OutOfRange {
        /// Requested index.
        index: usize,
        /// Queue length at the time of the call.
        len: usize,
    },
    /// A selected job disappeared from the queue before it could be dispatched.
    #[error("job {0} vanished from the queue during dispatch")]
    JobVanished(JobId),
    /// A price or filter expression failed to parse or evaluate.
    #[error("expression error: {0}")]
    Expression(#[from] ExpressionError),
    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Backend-specific failure with context.
    #[error("backend error: {0}")]
    Backend(String),
}

impl SchedulerError {
    /// True for errors caused by the caller's input rather than by the scheduler.
    pub const fn is_boundary(&self) -> bool {
        matches!(
            self,
            Self::InvalidJob(_)
                | Self::InvalidResource(_)
                | Self::DuplicateJob(_)
                | Self::QueueFull(_)
                | Self::InvalidConfig(_)
        )
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;

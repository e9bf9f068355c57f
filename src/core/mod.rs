//! Core scheduling abstractions: model, filter, queue, policies, history and load.

pub mod error;
pub mod events;
pub mod filter;
pub mod history;
pub mod job;
pub mod listener;
pub mod load;
pub mod policy;
pub mod queue;
pub mod resource;
pub mod scheduler;

pub use error::{AppResult, SchedulerError};
pub use events::{
    CompletionReport, DispatchEvent, EventSink, ExitKind, InMemoryEventLog, SchedulerEvent,
};
pub use filter::{FilterContext, Incompatibility, Verdict};
pub use history::{History, HistoryEntry};
pub use job::{Job, JobType, Requirements, ScheduleHint};
pub use listener::{DispatchListener, Spawn};
pub use load::{LoadTracker, Sale};
pub use policy::{
    BestPrice, Candidate, FirstFit, PolicyContext, PolicyKind, RandomPolicy, SchedulingPolicy,
    Selection,
};
pub use queue::{JobQueue, QueueSnapshot};
pub use resource::{JobTypeSupport, Resource};
pub use scheduler::{DeclineReason, Decision, Dispatch, MustMatch, Scheduler};

//! Infrastructure adapters for queues and event journals.

pub mod journal;
pub mod queue;
pub use journal::FileJournal;
pub use queue::InMemoryJobQueue;

//! Runtime adapters and the API surface around the scheduling core.

pub mod api;
pub mod registry;
pub mod service;
#[cfg(feature = "tokio-runtime")]
pub mod tokio_spawner;

pub use api::{health, Health, JobSubmission, ResourceHeartbeat, SchedulerStatus};
pub use registry::ResourceRegistry;
pub use service::SchedulerService;
#[cfg(feature = "tokio-runtime")]
pub use tokio_spawner::TokioSpawner;

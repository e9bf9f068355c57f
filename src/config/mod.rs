//! Configuration models for the scheduler, history, pricing and journal backends.

pub mod scheduler;

pub use scheduler::{
    HistoryConfig, JournalBackendConfig, PricingConfig, SchedulerConfig, ENV_PREFIX,
};

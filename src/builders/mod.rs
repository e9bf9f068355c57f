//! Builders to construct scheduler components from configuration.

pub mod scheduler_builder;

pub use scheduler_builder::{
    build_event_sink, build_scheduler, build_service, rebuild_scheduler, restore_scheduler,
};

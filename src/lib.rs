//! # Grid Scheduler
//!
//! The job scheduling core of a computational grid: it matches queued jobs
//! to heterogeneous compute resources that periodically ask for work.
//!
//! A front-end hands validated job records to the queue. When a resource
//! daemon asks for a job, the scheduler filters every queued job against
//! that resource, lets a pluggable policy pick one candidate, removes it
//! from the queue and records the dispatch in a per-resource history.
//! Completion reports flow back into the history later.
//!
//! ## Key Features
//!
//! - **Compatibility filter**: resource name patterns, architecture,
//!   platform, runtime environments, CPU time and capacity, virtual
//!   organizations, job types, sandbox restrictions and resource liveness
//!   yield a GO/WAIT/NEVER hint
//! - **Pluggable policies**: first-fit, uniform random with an injectable
//!   random source, and best-price surplus maximisation
//! - **Safe price expressions**: user-supplied pricing formulas are parsed
//!   and evaluated by a whitelisting evaluator that can only read the
//!   variables it is given
//! - **Load-adaptive pricing**: optionally, each resource's price scales
//!   with a multiplier that follows how many of its requests sold a job
//! - **History**: per `(resource, owner)` counters and an exponentially
//!   weighted moving-average price, with TTL-based eviction
//! - **Rebuild by replay**: every state change is an event; a JSON-lines
//!   journal, written by the service outside its scheduler lock and
//!   replayed in order, restores the queue and history
//!
//! ## Example
//!
//! ```rust
//! use grid_scheduler::config::SchedulerConfig;
//! use grid_scheduler::core::{Job, Requirements, Resource};
//! use grid_scheduler::builders::build_scheduler;
//! use grid_scheduler::util::serde::ResourceId;
//!
//! let mut scheduler = build_scheduler(&SchedulerConfig::default()).unwrap();
//! let req = Requirements { cpu_count: 2, memory_mb: 512, ..Requirements::default() };
//! scheduler.enqueue(Job::new("job-1", "alice", 0, req).unwrap(), 0).unwrap();
//!
//! let resource = Resource::new(ResourceId::new("grid.example.org", 0), "X86_64", 0)
//!     .with_capacity(4, 1024, 10);
//! let dispatch = scheduler.schedule(&resource, None, 0).unwrap().unwrap();
//! assert_eq!(dispatch.job.id(), "job-1");
//! assert_eq!(dispatch.job.executor(), Some(&resource.id));
//! ```
//!
//! For complete scenarios, see `tests/scheduling_scenarios_test.rs`.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling abstractions: model, filter, queue, policies, history.
pub mod core;
/// Configuration models for the scheduler, history and journal.
pub mod config;
/// Builders to construct scheduler components from configuration.
pub mod builders;
/// Safe evaluation of price expressions.
pub mod expr;
/// Infrastructure adapters for queues and event journals.
pub mod infra;
/// Runtime adapters and API surface.
pub mod runtime;
/// Shared utilities.
pub mod util;

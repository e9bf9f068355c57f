//! Builders to construct a scheduler or a service from configuration.

use crate::config::{JournalBackendConfig, SchedulerConfig};
use crate::core::{
    EventSink, InMemoryEventLog, JobQueue, Scheduler, SchedulerError, SchedulerEvent, Spawn,
};
use crate::infra::{FileJournal, InMemoryJobQueue};
use crate::runtime::SchedulerService;

/// Build the event sink selected by `journal`.
pub fn build_event_sink(
    journal: &JournalBackendConfig,
) -> Result<Option<Box<dyn EventSink>>, SchedulerError> {
    Ok(match journal {
        JournalBackendConfig::InMemory { capacity } => {
            Some(Box::new(InMemoryEventLog::new(*capacity)))
        }
        JournalBackendConfig::File { path } => Some(Box::new(FileJournal::open(path)?)),
        JournalBackendConfig::Disabled => None,
    })
}

/// Build an empty scheduler from configuration.
pub fn build_scheduler(cfg: &SchedulerConfig) -> Result<Scheduler, SchedulerError> {
    rebuild_scheduler(cfg, Vec::new())
}

/// Build a scheduler and replay `events` into it.
///
/// Replayed events are not buffered, so journaling the scheduler's new
/// events never writes them twice.
pub fn rebuild_scheduler<I>(
    cfg: &SchedulerConfig,
    events: I,
) -> Result<Scheduler, SchedulerError>
where
    I: IntoIterator<Item = SchedulerEvent>,
{
    cfg.validate().map_err(SchedulerError::InvalidConfig)?;

    let queue = InMemoryJobQueue::new(cfg.max_queue_depth);
    let policy = cfg.policy.build(cfg.random_seed);
    let mut scheduler = Scheduler::new(cfg, queue, policy);
    scheduler.replay(events);
    tracing::info!(
        "scheduler ready: policy {}, {} jobs queued",
        scheduler.policy_name(),
        scheduler.queue().len()
    );
    Ok(scheduler)
}

/// Build a scheduler, replaying the file journal first when one is configured.
pub fn restore_scheduler(cfg: &SchedulerConfig) -> Result<Scheduler, SchedulerError> {
    let events = match &cfg.journal {
        JournalBackendConfig::File { path } => FileJournal::load(path)?,
        _ => Vec::new(),
    };
    rebuild_scheduler(cfg, events)
}

/// Build a service around [`restore_scheduler`], journaling to the
/// configured backend.
pub fn build_service<S: Spawn>(
    cfg: &SchedulerConfig,
    spawner: S,
) -> Result<SchedulerService<S>, SchedulerError> {
    let scheduler = restore_scheduler(cfg)?;
    let service = SchedulerService::new(scheduler, spawner);
    Ok(match build_event_sink(&cfg.journal)? {
        Some(sink) => service.with_journal(sink),
        None => service,
    })
}

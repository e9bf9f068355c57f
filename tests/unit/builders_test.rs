//! Tests for builder modules

use std::path::PathBuf;

use grid_scheduler::builders::{
    build_event_sink, build_scheduler, build_service, rebuild_scheduler, restore_scheduler,
};
use grid_scheduler::config::{JournalBackendConfig, SchedulerConfig};
use grid_scheduler::core::{
    CompletionReport, ExitKind, Job, JobQueue, PolicyKind, Requirements, Resource, SchedulerError,
};
use grid_scheduler::infra::FileJournal;
use grid_scheduler::runtime::{JobSubmission, TokioSpawner};
use grid_scheduler::util::serde::ResourceId;

fn temp_journal() -> PathBuf {
    std::env::temp_dir()
        .join(format!("grid-sched-{}", uuid::Uuid::new_v4()))
        .join("journal.jsonl")
}

fn job(id: &str) -> Job {
    let req = Requirements {
        cpu_count: 1,
        ..Requirements::default()
    };
    Job::new(id, "alice", 0, req).unwrap()
}

fn resource() -> Resource {
    Resource::new(ResourceId::new("grid.example.org", 0), "X86_64", 0).with_capacity(4, 1024, 10)
}

#[test]
fn test_build_scheduler_defaults() {
    let scheduler = build_scheduler(&SchedulerConfig::default()).unwrap();
    assert_eq!(scheduler.policy_name(), "first_fit");
    assert_eq!(scheduler.queue().max_depth(), 100_000);
    assert!(scheduler.queue().is_empty());
    assert_eq!(scheduler.staleness_threshold_ms(), 600_000);
}

#[test]
fn test_build_scheduler_rejects_invalid_config() {
    let cfg = SchedulerConfig {
        max_queue_depth: 0,
        ..SchedulerConfig::default()
    };
    let err = build_scheduler(&cfg).unwrap_err();
    assert!(matches!(err, SchedulerError::InvalidConfig(_)));
}

#[test]
fn test_build_scheduler_selects_policy() {
    let cfg = SchedulerConfig {
        policy: PolicyKind::BestPrice,
        ..SchedulerConfig::default()
    };
    assert_eq!(build_scheduler(&cfg).unwrap().policy_name(), "best_price");
}

#[test]
fn test_build_event_sink_disabled() {
    assert!(build_event_sink(&JournalBackendConfig::Disabled)
        .unwrap()
        .is_none());
    assert!(build_event_sink(&JournalBackendConfig::default())
        .unwrap()
        .is_some());
}

#[test]
fn test_rebuild_scheduler_from_events() {
    let cfg = SchedulerConfig {
        journal: JournalBackendConfig::Disabled,
        ..SchedulerConfig::default()
    };
    let mut source = build_scheduler(&cfg).unwrap().with_recording();

    source.enqueue(job("j1"), 1).unwrap();
    source.enqueue(job("j2"), 2).unwrap();
    source.schedule(&resource(), None, 3).unwrap().unwrap();

    let events = source.take_events();
    assert_eq!(events.len(), 3);
    let rebuilt = rebuild_scheduler(&cfg, events).unwrap();
    assert_eq!(rebuilt.queue().len(), 1);
    assert_eq!(rebuilt.queue().get(0).unwrap().id(), "j2");
    assert_eq!(
        rebuilt.history().in_flight("j1"),
        Some(&ResourceId::new("grid.example.org", 0))
    );
}

fn submission(id: &str) -> JobSubmission {
    JobSubmission {
        job_id: id.into(),
        owner: "alice".into(),
        submitted_at_ms: Some(0),
        requirements: job(id).requirements().clone(),
        max_price: None,
        retries: 0,
    }
}

#[tokio::test]
async fn test_restore_service_from_file_journal() {
    let path = temp_journal();
    let cfg = SchedulerConfig {
        journal: JournalBackendConfig::File { path: path.clone() },
        ..SchedulerConfig::default()
    };
    let rid = ResourceId::new("grid.example.org", 0);

    {
        let svc = build_service(&cfg, TokioSpawner::try_current().unwrap()).unwrap();
        svc.submit(submission("j1"), 10).unwrap();
        svc.submit(submission("j2"), 11).unwrap();
        svc.registry().upsert(resource());
        let d = svc.request_job(&rid, None, 12).unwrap().unwrap();
        assert_eq!(d.job.id(), "j1");
        let report = CompletionReport {
            job_id: "j1".into(),
            resource_id: d.event.resource_id.clone(),
            observed_wall_secs: 30.0,
            observed_price: 4.0,
            exit_kind: ExitKind::Ok,
        };
        assert!(svc.report_completion(&report, 20));
    }
    assert_eq!(FileJournal::load(&path).unwrap().len(), 4);

    let restored = restore_scheduler(&cfg).unwrap();
    assert_eq!(restored.queue().len(), 1);
    assert_eq!(restored.queue().get(0).unwrap().id(), "j2");
    let entry = restored.history().entry(&rid, "alice").unwrap();
    assert_eq!(entry.dispatched, 1);
    assert_eq!(entry.completed, 1);
    assert_eq!(entry.ewma_price, Some(4.0));

    // restoring replays without appending, and a bare scheduler never writes
    let svc = build_service(&cfg, TokioSpawner::try_current().unwrap()).unwrap();
    assert_eq!(svc.status().queued, 1);
    let mut bare = restore_scheduler(&cfg).unwrap();
    bare.enqueue(job("j3"), 30).unwrap();
    assert_eq!(FileJournal::load(&path).unwrap().len(), 4);

    svc.submit(submission("j4"), 40).unwrap();
    assert_eq!(FileJournal::load(&path).unwrap().len(), 5);

    if let Some(dir) = path.parent() {
        std::fs::remove_dir_all(dir).ok();
    }
}

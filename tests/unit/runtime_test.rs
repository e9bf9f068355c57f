//! Tests for runtime adapters and API models

use grid_scheduler::core::{JobType, JobTypeSupport, SchedulerError, Spawn};
use grid_scheduler::runtime::api::{health, JobSubmission, ResourceHeartbeat, SchedulerStatus};
use grid_scheduler::runtime::tokio_spawner::TokioSpawner;
use grid_scheduler::util::serde::ResourceId;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tokio_spawner_spawn() {
    let spawner = TokioSpawner::new(tokio::runtime::Handle::current());

    let (tx, rx) = tokio::sync::oneshot::channel();
    spawner.spawn(async move {
        tx.send(123).unwrap();
    });

    let result = rx.await.expect("oneshot result");
    assert_eq!(result, 123);
}

#[tokio::test]
async fn test_tokio_spawner_try_current() {
    assert!(TokioSpawner::try_current().is_some());
}

#[test]
fn test_tokio_spawner_outside_runtime() {
    assert!(TokioSpawner::try_current().is_none());
}

#[test]
fn test_job_submission_from_json() {
    let json = r#"{
        "job_id": "job-1",
        "owner": "alice",
        "requirements": { "cpu_count": 2, "memory_mb": 512, "job_type": "bulk" },
        "max_price": "cputime / 3600"
    }"#;
    let submission: JobSubmission = serde_json::from_str(json).unwrap();
    let job = submission.into_job(42).unwrap();
    assert_eq!(job.id(), "job-1");
    assert_eq!(job.submitted_at_ms(), 42);
    assert_eq!(job.requirements().cpu_count, 2);
    assert_eq!(job.requirements().job_type, JobType::Bulk);
    assert_eq!(job.max_price(), Some("cputime / 3600"));
}

#[test]
fn test_job_submission_rejects_bad_price() {
    let submission = JobSubmission {
        job_id: "job-1".into(),
        owner: "alice".into(),
        submitted_at_ms: None,
        requirements: Default::default(),
        max_price: Some("__import__('os')".into()),
        retries: 0,
    };
    let err = submission.into_job(0).unwrap_err();
    assert!(matches!(err, SchedulerError::InvalidJob(_)));
}

#[test]
fn test_job_submission_rejects_missing_owner() {
    let submission = JobSubmission {
        job_id: "job-1".into(),
        owner: " ".into(),
        submitted_at_ms: Some(5),
        requirements: Default::default(),
        max_price: None,
        retries: 0,
    };
    assert!(submission.into_job(0).is_err());
}

#[test]
fn test_resource_heartbeat_from_json() {
    let json = r#"{
        "host": "grid.example.org",
        "index": 2,
        "cpu_count": 8,
        "memory_mb": 4096,
        "disk_gb": 100,
        "architecture": "X86_64",
        "runtime_environments": ["PYTHON3"],
        "price_expression": "cputime / 3600",
        "job_types": "all"
    }"#;
    let heartbeat: ResourceHeartbeat = serde_json::from_str(json).unwrap();
    assert_eq!(heartbeat.resource_id(), ResourceId::new("grid.example.org", 2));
    let resource = heartbeat.into_resource(1_000).unwrap();
    assert_eq!(resource.node_count, 1);
    assert_eq!(resource.last_seen_ms, 1_000);
    assert_eq!(resource.job_types, JobTypeSupport::All);
    assert_eq!(resource.price_expression, "cputime / 3600");
    assert!(resource.runtime_environments.contains("PYTHON3"));
}

#[test]
fn test_resource_heartbeat_platform_and_cpu_time() {
    let json = r#"{
        "host": "grid.example.org",
        "architecture": "AMD64",
        "platform": "linux",
        "max_cpu_time_secs": 7200
    }"#;
    let heartbeat: ResourceHeartbeat = serde_json::from_str(json).unwrap();
    let resource = heartbeat.into_resource(0).unwrap();
    assert_eq!(resource.platform, "linux");
    assert_eq!(resource.max_cpu_time_secs, Some(7200));

    let bare: ResourceHeartbeat =
        serde_json::from_str(r#"{"host": "h", "architecture": "AMD64"}"#).unwrap();
    let resource = bare.into_resource(0).unwrap();
    assert!(resource.platform.is_empty());
    assert_eq!(resource.max_cpu_time_secs, None);
}

#[test]
fn test_resource_heartbeat_rejects_bad_price() {
    let json = r#"{
        "host": "h",
        "architecture": "X86_64",
        "price_expression": "open('/etc/passwd')"
    }"#;
    let heartbeat: ResourceHeartbeat = serde_json::from_str(json).unwrap();
    let err = heartbeat.into_resource(0).unwrap_err();
    assert!(matches!(err, SchedulerError::InvalidResource(_)));
}

#[test]
fn test_health() {
    let mut status = SchedulerStatus {
        policy: "first_fit".into(),
        queued: 3,
        max_queue_depth: 4,
        in_flight: 0,
        history_entries: 0,
        resources: 1,
    };
    assert!(health(&status).ok);
    status.queued = 4;
    assert!(!health(&status).ok);
}

//! Tests for the file event journal

use std::io::Write;
use std::path::{Path, PathBuf};

use grid_scheduler::core::{EventSink, Job, Requirements, SchedulerError, SchedulerEvent};
use grid_scheduler::infra::FileJournal;

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir()
        .join(format!("grid-journal-{}", uuid::Uuid::new_v4()))
        .join(name)
}

fn enqueued(id: &str, at_ms: u128) -> SchedulerEvent {
    SchedulerEvent::Enqueued {
        job: Job::new(id, "bob", at_ms, Requirements::default()).unwrap(),
        at_ms,
    }
}

fn cleanup(path: &Path) {
    if let Some(dir) = path.parent() {
        std::fs::remove_dir_all(dir).ok();
    }
}

#[test]
fn test_load_missing_file_is_empty() {
    let path = temp_path("absent.jsonl");
    assert!(FileJournal::load(&path).unwrap().is_empty());
}

#[test]
fn test_append_and_load_in_order() {
    let path = temp_path("journal.jsonl");
    let mut journal = FileJournal::open(&path).unwrap();
    journal.append(&enqueued("a", 1)).unwrap();
    journal.record(&enqueued("b", 2));
    journal.record(&SchedulerEvent::Expired {
        job_id: "a".into(),
        at_ms: 3,
    });
    assert_eq!(journal.written(), 3);
    assert_eq!(journal.path(), path.as_path());

    let events = FileJournal::load(&path).unwrap();
    let ids: Vec<&str> = events.iter().map(SchedulerEvent::job_id).collect();
    assert_eq!(ids, vec!["a", "b", "a"]);
    assert!(matches!(events[2], SchedulerEvent::Expired { at_ms: 3, .. }));
    cleanup(&path);
}

#[test]
fn test_reopen_appends() {
    let path = temp_path("journal.jsonl");
    FileJournal::open(&path)
        .unwrap()
        .append(&enqueued("a", 1))
        .unwrap();
    FileJournal::open(&path)
        .unwrap()
        .append(&enqueued("b", 2))
        .unwrap();
    assert_eq!(FileJournal::load(&path).unwrap().len(), 2);
    cleanup(&path);
}

#[test]
fn test_load_skips_blank_lines_and_rejects_garbage() {
    let path = temp_path("journal.jsonl");
    {
        let mut journal = FileJournal::open(&path).unwrap();
        journal.append(&enqueued("a", 1)).unwrap();
    }
    {
        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file).unwrap();
    }
    assert_eq!(FileJournal::load(&path).unwrap().len(), 1);

    {
        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{{not json").unwrap();
    }
    let err = FileJournal::load(&path).unwrap_err();
    match err {
        SchedulerError::Backend(msg) => assert!(msg.contains(":3:"), "{msg}"),
        other => panic!("unexpected error: {other}"),
    }
    cleanup(&path);
}

//! Tests for error types

use grid_scheduler::core::SchedulerError;
use grid_scheduler::expr::ExpressionError;

#[test]
fn test_queue_full_error() {
    let err = SchedulerError::QueueFull("max queue depth reached".to_string());
    assert_eq!(format!("{}", err), "queue full: max queue depth reached");
}

#[test]
fn test_duplicate_job_error() {
    let err = SchedulerError::DuplicateJob("job-7".to_string());
    assert_eq!(format!("{}", err), "duplicate job: job-7 is already queued");
}

#[test]
fn test_out_of_range_error() {
    let err = SchedulerError::OutOfRange { index: 4, len: 2 };
    assert_eq!(format!("{}", err), "queue index 4 out of range (len 2)");
    assert!(!err.is_boundary());
}

#[test]
fn test_expression_error_converts() {
    let err: SchedulerError = ExpressionError::DivisionByZero.into();
    assert_eq!(format!("{}", err), "expression error: division by zero");
}

#[test]
fn test_boundary_errors() {
    assert!(SchedulerError::InvalidJob("x".into()).is_boundary());
    assert!(SchedulerError::InvalidResource("x".into()).is_boundary());
    assert!(SchedulerError::DuplicateJob("x".into()).is_boundary());
    assert!(!SchedulerError::JobVanished("x".into()).is_boundary());
    assert!(!SchedulerError::Backend("x".into()).is_boundary());
}

#[test]
fn test_backend_error() {
    let err = SchedulerError::Backend("journal.jsonl: permission denied".to_string());
    assert_eq!(format!("{}", err), "backend error: journal.jsonl: permission denied");
}

//! Tests for utility functions

use grid_scheduler::util::{elapsed_secs, secs_to_ms, ResourceId};

#[test]
fn test_resource_id_display_and_parse() {
    let id = ResourceId::new("grid.example.org", 3);
    assert_eq!(id.to_string(), "grid.example.org.3");
    let parsed: ResourceId = "grid.example.org.3".parse().unwrap();
    assert_eq!(parsed, id);
}

#[test]
fn test_resource_id_parse_errors() {
    assert!("nohost".parse::<ResourceId>().is_err());
    assert!(".1".parse::<ResourceId>().is_err());
    assert!("host.x".parse::<ResourceId>().is_err());
}

#[test]
fn test_resource_id_ordering() {
    let mut ids = vec![
        ResourceId::new("b", 0),
        ResourceId::new("a", 2),
        ResourceId::new("a", 1),
    ];
    ids.sort();
    assert_eq!(ids[0], ResourceId::new("a", 1));
    assert_eq!(ids[2], ResourceId::new("b", 0));
}

#[test]
fn test_time_helpers() {
    assert_eq!(secs_to_ms(600), 600_000);
    assert_eq!(elapsed_secs(1_000, 3_500), 2.5);
    assert_eq!(elapsed_secs(3_500, 1_000), 0.0);
}

#[test]
fn test_resource_id_host_may_contain_dots() {
    let id: ResourceId = "node.cluster.example.org.12".parse().unwrap();
    assert_eq!(id.host, "node.cluster.example.org");
    assert_eq!(id.index, 12);
}

#[test]
fn test_init_tracing_is_idempotent() {
    grid_scheduler::util::init_tracing();
    grid_scheduler::util::init_tracing();
    tracing::info!("tracing initialised");
}

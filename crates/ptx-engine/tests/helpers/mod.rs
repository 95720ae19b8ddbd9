//! Shared helpers for the integration suite.

use ptx_engine::{Detector, Event, Execution, Row, execute};
use ptx_query::parse_query;

/// Detect, parse, and execute a query over raw lines.
pub fn run_pipeline(lines: &[&str], query: &str) -> Execution {
    let lines: Vec<String> = lines.iter().map(|s| s.to_string()).collect();
    let detector = Detector::new();
    let parser = detector.detect(&lines).expect("a format should be detected");
    let events = parser.parse_many(&lines, "test");
    let query = parse_query(query).expect("query should parse");
    execute(&query, events)
}

pub fn events_of(result: Execution) -> Vec<Event> {
    match result {
        Execution::Events(events) => events,
        Execution::Rows(_) => panic!("expected events, got rows"),
    }
}

pub fn rows_of(result: Execution) -> Vec<Row> {
    match result {
        Execution::Rows(rows) => rows,
        Execution::Events(_) => panic!("expected rows, got events"),
    }
}

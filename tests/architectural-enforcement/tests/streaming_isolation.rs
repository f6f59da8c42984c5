//! Integration Test: Streaming Core Isolation
//!
//! **Policy**: `feedstream/core/src/streaming` only knows about record
//! readers and its own queue. HTTP, XML parsing, configuration and the client
//! live outside it and plug in through `RecordReader`.

use architectural_enforcement::{assert_no_violations, code_part, rust_sources, Violation};

const FORBIDDEN: &[&str] = &[
    "reqwest",
    "quick_xml",
    "crate::client",
    "crate::config",
    "super::super::client",
    "AtomEntry",
];

fn find_isolation_violations() -> Vec<Violation> {
    let mut violations = Vec::new();

    for file in rust_sources("feedstream/core/src/streaming") {
        let path = file.display_path();
        for (idx, line) in file.production_lines().iter().enumerate() {
            let code = code_part(line);
            if FORBIDDEN.iter().any(|needle| code.contains(needle)) {
                violations.push(Violation {
                    path: path.clone(),
                    line: idx + 1,
                    text: (*line).to_string(),
                });
            }
        }
    }

    violations
}

#[test]
fn test_streaming_core_is_isolated() {
    let violations = find_isolation_violations();
    assert_no_violations(
        "Streaming core depends on HTTP, XML or client code",
        &violations,
    );
}

#[test]
fn test_streaming_sources_found() {
    assert!(
        rust_sources("feedstream/core/src/streaming").len() >= 5,
        "streaming module sources should be scanned"
    );
}

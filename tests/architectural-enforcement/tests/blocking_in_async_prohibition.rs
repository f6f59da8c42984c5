//! Integration Test: No Blocking Waits Inside `async fn`
//!
//! **Policy**: the pull iterator, `SyncIoBridge` readers and `Handle::block_on`
//! block the calling thread. They belong on the producer thread or inside
//! `spawn_blocking`, never directly in the body of an `async fn`.

use architectural_enforcement::{
    assert_no_violations, code_part, is_in_async_fn, rust_sources, Violation,
};

const BLOCKING_CALLS: &[&str] = &[
    ".blocking_recv(",
    ".blocking_send(",
    ".blocking_lock(",
    ".block_on(",
    ".await_next_blocking(",
    "std::thread::sleep(",
];

fn find_blocking_violations() -> Vec<Violation> {
    let mut violations = Vec::new();

    for dir in ["feedstream/core/src", "feedstream/cli/src"] {
        for file in rust_sources(dir) {
            let path = file.display_path();
            let lines = file.production_lines();
            for (idx, line) in lines.iter().enumerate() {
                let code = code_part(line);
                if BLOCKING_CALLS.iter().any(|call| code.contains(call))
                    && is_in_async_fn(&lines, idx)
                {
                    violations.push(Violation {
                        path: path.clone(),
                        line: idx + 1,
                        text: (*line).to_string(),
                    });
                }
            }
        }
    }

    violations
}

#[test]
fn test_no_blocking_calls_in_async_fn() {
    let violations = find_blocking_violations();
    assert_no_violations("Blocking call inside an async fn", &violations);
}

#[test]
fn test_detector_flags_blocking_recv_in_async_fn() {
    let code = vec![
        "async fn next(&mut self) -> Option<u32> {",
        "    self.rx.blocking_recv()",
        "}",
    ];
    assert!(is_in_async_fn(&code, 1));
}

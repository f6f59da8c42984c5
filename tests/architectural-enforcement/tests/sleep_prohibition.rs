//! Integration Test: Sleep Prohibition
//!
//! **Policy**: Production code MUST NOT sleep. Records are waited for on the
//! queue, pages on the socket.
//! **Exceptions**: the fixed delay in `client/retry.rs`, test code.

use architectural_enforcement::{assert_no_violations, code_part, rust_sources, Violation};

const ALLOWED: &[&str] = &["client/retry.rs"];

fn find_sleep_violations() -> Vec<Violation> {
    let mut violations = Vec::new();

    for dir in ["feedstream/core/src", "feedstream/cli/src"] {
        for file in rust_sources(dir) {
            let path = file.display_path();
            if ALLOWED.iter().any(|allowed| path.ends_with(allowed)) {
                continue;
            }

            for (idx, line) in file.production_lines().iter().enumerate() {
                let code = code_part(line);
                if code.contains("::sleep(") || code.contains(".sleep(") {
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
fn test_no_sleep_in_production_code() {
    let violations = find_sleep_violations();
    assert_no_violations(
        "Sleep calls found in production code (only client/retry.rs may sleep)",
        &violations,
    );
}

#[test]
fn test_retry_policy_is_scanned_source() {
    // Guards against the allow-list pointing at a file that moved
    let retry = rust_sources("feedstream/core/src")
        .into_iter()
        .find(|file| file.display_path().ends_with("client/retry.rs"))
        .expect("client/retry.rs should exist");
    assert!(retry.content.contains("tokio::time::sleep"));
}

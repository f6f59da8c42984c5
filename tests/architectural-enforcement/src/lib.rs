//! Architectural Enforcement Integration Tests
//!
//! Source scans that keep the workspace honest:
//! - No sleep() outside the retry policy
//! - The streaming core stays free of HTTP, XML and client code
//! - No blocking channel or runtime calls inside `async fn`
//!
//! This library holds the shared scanning helpers; the checks themselves live
//! in `tests/`.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Root of the cargo workspace
#[must_use]
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("..").join("..")
}

/// A Rust source file loaded for scanning
pub struct SourceFile {
    /// Absolute path
    pub path: PathBuf,
    /// File content
    pub content: String,
}

impl SourceFile {
    /// Lines before the first `#[cfg(test)]`
    #[must_use]
    pub fn production_lines(&self) -> Vec<&str> {
        self.content
            .lines()
            .take_while(|line| line.trim() != "#[cfg(test)]")
            .collect()
    }

    /// Path relative to the workspace root, for reports
    #[must_use]
    pub fn display_path(&self) -> String {
        let root = workspace_root();
        self.path
            .strip_prefix(&root)
            .unwrap_or(&self.path)
            .display()
            .to_string()
    }
}

/// Load every `.rs` file under `dir` (workspace-relative)
#[must_use]
pub fn rust_sources(dir: &str) -> Vec<SourceFile> {
    let path = workspace_root().join(dir);
    if !path.exists() {
        return Vec::new();
    }

    walkdir::WalkDir::new(path)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.path().extension().and_then(|s| s.to_str()) == Some("rs"))
        .filter_map(|entry| {
            fs::read_to_string(entry.path())
                .ok()
                .map(|content| SourceFile {
                    path: entry.path().to_path_buf(),
                    content,
                })
        })
        .collect()
}

/// The part of a line before any `//` comment
#[must_use]
pub fn code_part(line: &str) -> &str {
    line.split("//").next().unwrap_or(line)
}

/// Find the signature line of the function enclosing `lines[idx]`
///
/// Walks backwards balancing braces; the first unmatched `{` that belongs to
/// a `fn` signature wins. Closures and blocks are skipped over.
#[must_use]
pub fn enclosing_fn<'a>(lines: &[&'a str], idx: usize) -> Option<&'a str> {
    let mut depth = 0usize;
    for i in (0..idx).rev() {
        let code = code_part(lines[i]);
        for c in code.chars().rev() {
            match c {
                '}' => depth += 1,
                '{' if depth > 0 => depth -= 1,
                '{' => {
                    if let Some(signature) = signature_at(lines, i) {
                        return Some(signature);
                    }
                }
                _ => {}
            }
        }
    }
    None
}

/// Signature owning a block opened on `lines[open_idx]`, if it is a fn body
fn signature_at<'a>(lines: &[&'a str], open_idx: usize) -> Option<&'a str> {
    let line = lines[open_idx];
    if is_fn_signature(line) {
        return Some(line);
    }

    // Multi-line signatures end in `) -> T {`, `where ... {` or a bare `{`
    let trimmed = line.trim_start();
    let continues_signature = trimmed.starts_with(')')
        || trimmed.starts_with("where")
        || trimmed.starts_with('{')
        || trimmed.starts_with("->");
    if !continues_signature {
        return None;
    }
    for i in (open_idx.saturating_sub(10)..open_idx).rev() {
        let candidate = lines[i];
        if is_fn_signature(candidate) {
            return Some(candidate);
        }
        let code = code_part(candidate).trim_end();
        if code.ends_with(';') || code.ends_with('}') {
            return None;
        }
    }
    None
}

fn is_fn_signature(line: &str) -> bool {
    let code = code_part(line);
    code.trim_start().split_whitespace().any(|word| word == "fn")
}

/// Whether `lines[idx]` sits in the body of an `async fn`
#[must_use]
pub fn is_in_async_fn(lines: &[&str], idx: usize) -> bool {
    enclosing_fn(lines, idx).is_some_and(|signature| signature.contains("async fn"))
}

/// One offending line
pub struct Violation {
    /// Workspace-relative path
    pub path: String,
    /// 1-based line number
    pub line: usize,
    /// Offending source text
    pub text: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} - {}", self.path, self.line, self.text.trim())
    }
}

/// Print violations and fail the calling test if there are any
///
/// # Panics
///
/// Panics when `violations` is not empty.
pub fn assert_no_violations(rule: &str, violations: &[Violation]) {
    if violations.is_empty() {
        return;
    }

    eprintln!("\n❌ {rule}\n");
    for violation in violations {
        eprintln!("  ❌ {violation}");
    }
    panic!(
        "\nFound {} violation(s) of: {rule}\nFix these before merging!",
        violations.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enclosing_async_fn_detected() {
        let code = vec![
            "pub async fn fetch(&self) -> Result<(), Error> {",
            "    let x = compute();",
            "    if x > 1 {",
            "        rx.blocking_recv();",
            "    }",
            "}",
        ];

        assert!(is_in_async_fn(&code, 3));
        assert_eq!(enclosing_fn(&code, 3), Some(code[0]));
    }

    #[test]
    fn test_closure_inside_sync_fn() {
        let code = vec![
            "fn run(&mut self) {",
            "    let f = |x| {",
            "        x + 1",
            "    };",
            "    self.rx.blocking_recv();",
            "}",
        ];

        assert!(!is_in_async_fn(&code, 4));
        assert_eq!(enclosing_fn(&code, 4), Some(code[0]));
    }

    #[test]
    fn test_multiline_signature() {
        let code = vec![
            "    pub async fn query(",
            "        &self,",
            "        resource: &str,",
            "    ) -> Result<StreamingResult<AtomEntry>, ClientError> {",
            "        handle.block_on(fut);",
            "    }",
        ];

        assert!(is_in_async_fn(&code, 4));
    }

    #[test]
    fn test_previous_fn_not_mistaken_for_enclosing() {
        let code = vec![
            "async fn first() {",
            "    work().await;",
            "}",
            "",
            "fn second() {",
            "    rx.blocking_recv();",
            "}",
        ];

        assert!(!is_in_async_fn(&code, 5));
    }

    #[test]
    fn test_production_lines_stop_at_test_module() {
        let file = SourceFile {
            path: PathBuf::from("x.rs"),
            content: "fn a() {}\n\n#[cfg(test)]\nmod tests {\n    fn b() {}\n}\n".to_string(),
        };
        assert_eq!(file.production_lines(), vec!["fn a() {}", ""]);
    }

    #[test]
    fn test_code_part_strips_comments() {
        assert_eq!(code_part("let x = 1; // sleep(10)"), "let x = 1; ");
    }
}

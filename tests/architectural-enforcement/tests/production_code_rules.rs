//! Production Code Rules
//!
//! - No `std::thread::sleep`: handlers run on the tokio runtime, waits go
//!   through `tokio::time`
//! - No `.unwrap()` / `.expect(`: errors propagate or are logged

use architectural_enforcement::{production_files, scan, Violation};

fn report(rule: &str, violations: &[Violation]) {
    if violations.is_empty() {
        return;
    }
    eprintln!("\n{rule}:");
    for violation in violations {
        eprintln!("  {violation}");
    }
    panic!(
        "\nFound {} violation(s) of '{rule}' in production code.",
        violations.len()
    );
}

#[test]
fn test_production_sources_are_found() {
    let files = production_files();
    assert!(
        files.iter().any(|p| p.ends_with("tracker.rs")),
        "expected to scan expander/core/src, found {files:?}"
    );
    assert!(files.iter().any(|p| p.ends_with("server.rs")));
}

#[test]
fn test_no_blocking_sleep_in_production_code() {
    let violations = scan(|code| code.contains("thread::sleep("));
    report("no blocking sleep", &violations);
}

#[test]
fn test_no_unwrap_or_expect_in_production_code() {
    let violations = scan(|code| code.contains(".unwrap()") || code.contains(".expect("));
    report("no unwrap/expect", &violations);
}

//! Architectural rules for the core library

use architectural_enforcement::{core_src, find_violations, rust_sources};

#[test]
fn test_core_sources_are_found() {
    let files = rust_sources(&core_src());
    assert!(
        files.iter().any(|f| f.path.ends_with("lib.rs")),
        "core library not found under {}",
        core_src().display()
    );
}

#[test]
fn test_no_blocking_sleep_in_library() {
    let files = rust_sources(&core_src());
    let violations = find_violations(&files, |line| {
        line.contains("std::thread::sleep") || line.contains("thread::sleep(")
    });
    assert!(
        violations.is_empty(),
        "blocking sleep in library code:\n{}",
        violations.join("\n")
    );
}

#[test]
fn test_decoder_does_not_depend_on_conversation_state() {
    let files = rust_sources(&core_src().join("decoder"));
    assert!(!files.is_empty());

    let violations = find_violations(&files, |line| {
        line.contains("crate::conversation")
            || line.contains("crate::sync")
            || line.contains("crate::backend")
    });
    assert!(
        violations.is_empty(),
        "decoder reaches into conversation state:\n{}",
        violations.join("\n")
    );
}

#[test]
fn test_no_unwrap_or_expect_in_library() {
    let files = rust_sources(&core_src());
    let violations = find_violations(&files, |line| {
        !line.trim_start().starts_with("//!")
            && !line.trim_start().starts_with("///")
            && (line.contains(".unwrap()") || line.contains(".expect("))
    });
    assert!(
        violations.is_empty(),
        "unwrap/expect in library code:\n{}",
        violations.join("\n")
    );
}

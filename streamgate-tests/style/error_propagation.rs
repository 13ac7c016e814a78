//! Error Propagation
//!
//! Production code returns errors with `?`; panicking shortcuts belong in
//! tests only.

use super::source_scan::production_sources;

#[test]
fn test_no_unwrap_or_expect_in_production_code() {
    let sources = production_sources();
    assert!(!sources.is_empty(), "no workspace sources found");

    let violations: Vec<String> = sources
        .iter()
        .flat_map(|file| {
            file.code_lines()
                .filter(|(_, line)| line.contains(".unwrap()") || line.contains(".expect("))
                .map(|(number, line)| format!("{}:{number}: {}", file.path.display(), line.trim()))
                .collect::<Vec<_>>()
        })
        .collect();

    assert!(
        violations.is_empty(),
        "unwrap()/expect() in production code:\n{}",
        violations.join("\n")
    );
}

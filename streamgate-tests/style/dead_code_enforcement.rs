//! Dead Code Enforcement
//!
//! Production code must not silence dead code warnings; unused code is
//! deleted instead.

use super::source_scan::production_sources;

#[test]
fn test_no_dead_code_allowances() {
    let violations: Vec<String> = production_sources()
        .iter()
        .flat_map(|file| {
            file.code_lines()
                .filter(|(_, line)| line.contains("allow(dead_code)"))
                .map(|(number, _)| format!("{}:{number}", file.path.display()))
                .collect::<Vec<_>>()
        })
        .collect();

    assert!(
        violations.is_empty(),
        "#[allow(dead_code)] in production code:\n{}",
        violations.join("\n")
    );
}

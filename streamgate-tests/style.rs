//! Style Enforcement Tests
//!
//! Scans the workspace crates' production sources for patterns clippy does
//! not reject on its own.
//!
//! - `error_propagation` - No `unwrap()`/`expect()` outside test modules
//! - `dead_code_enforcement` - No `#[allow(dead_code)]` outside test modules

#[path = "style/source_scan.rs"]
mod source_scan;

#[path = "style/error_propagation.rs"]
mod error_propagation;

#[path = "style/dead_code_enforcement.rs"]
mod dead_code_enforcement;

//! Workspace source discovery shared by the style checks

use std::fs;
use std::path::{Path, PathBuf};

/// One production source file, cut off at its test module.
pub struct SourceFile {
    pub path: PathBuf,
    pub production: String,
}

impl SourceFile {
    /// Non-comment lines with their 1-based line numbers.
    pub fn code_lines(&self) -> impl Iterator<Item = (usize, &str)> {
        self.production
            .lines()
            .enumerate()
            .map(|(index, line)| (index + 1, line))
            .filter(|(_, line)| !line.trim_start().starts_with("//"))
    }
}

fn collect_rust_files(dir: &Path, files: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_rust_files(&path, files);
        } else if path.extension().is_some_and(|ext| ext == "rs") {
            files.push(path);
        }
    }
}

/// `src/` trees of every `streamgate-*` crate, test modules stripped.
pub fn production_sources() -> Vec<SourceFile> {
    let workspace = Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .expect("test crate lives inside the workspace")
        .to_path_buf();

    let mut files = Vec::new();
    for entry in fs::read_dir(&workspace).expect("workspace is readable").flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with("streamgate-") && name != "streamgate-tests" {
            collect_rust_files(&entry.path().join("src"), &mut files);
        }
    }
    files.sort();

    files
        .into_iter()
        .map(|path| {
            let content = fs::read_to_string(&path).expect("source file is readable");
            let production = match content.find("#[cfg(test)]") {
                Some(index) => content[..index].to_string(),
                None => content,
            };
            SourceFile { path, production }
        })
        .collect()
}

//! Architectural Enforcement Integration Tests
//!
//! This package contains integration tests that enforce architectural principles:
//! - No blocking sleep() calls in library code
//! - The decoder stays independent of conversation state
//! - No unwrap()/expect() outside tests in the core library
//!
//! These tests are designed to catch violations early in the development cycle.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Root of the workspace (two levels above this package)
#[must_use]
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// Source directory of the core library
#[must_use]
pub fn core_src() -> PathBuf {
    workspace_root().join("streamchat").join("core").join("src")
}

/// A Rust source file and its contents
#[derive(Debug)]
pub struct SourceFile {
    /// Path of the file
    pub path: PathBuf,
    /// File contents
    pub contents: String,
}

impl SourceFile {
    /// Lines before the first `#[cfg(test)]`, with their 1-based numbers
    ///
    /// Test modules sit at the bottom of each file, so everything above the
    /// marker is production code.
    pub fn production_lines(&self) -> impl Iterator<Item = (usize, &str)> {
        self.contents
            .lines()
            .enumerate()
            .take_while(|(_, line)| !line.trim_start().starts_with("#[cfg(test)]"))
            .map(|(i, line)| (i + 1, line))
    }
}

/// Every `.rs` file under `dir`
#[must_use]
pub fn rust_sources(dir: &Path) -> Vec<SourceFile> {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "rs"))
        .filter_map(|entry| {
            let contents = fs::read_to_string(entry.path()).ok()?;
            Some(SourceFile {
                path: entry.path().to_path_buf(),
                contents,
            })
        })
        .collect()
}

/// `path:line: text` for every production line matching `predicate`
pub fn find_violations<F>(files: &[SourceFile], predicate: F) -> Vec<String>
where
    F: Fn(&str) -> bool,
{
    files
        .iter()
        .flat_map(|file| {
            file.production_lines()
                .filter(|(_, line)| !line.trim_start().starts_with("//"))
                .filter(|(_, line)| predicate(line))
                .map(|(n, line)| format!("{}:{n}: {}", file.path.display(), line.trim()))
                .collect::<Vec<_>>()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_lines_stop_at_test_module() {
        let file = SourceFile {
            path: PathBuf::from("x.rs"),
            contents: "fn a() {}\n#[cfg(test)]\nmod tests {}\n".to_string(),
        };
        let lines: Vec<_> = file.production_lines().collect();
        assert_eq!(lines, vec![(1, "fn a() {}")]);
    }
}

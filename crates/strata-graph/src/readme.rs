//! README summaries for the repository map.

use std::fs;
use std::path::Path;

const README_FILES: &[&str] = &[
    "README.md",
    "README.rst",
    "README.txt",
    "README",
    "readme.md",
    "readme.rst",
    "readme.txt",
    "readme",
];

const SCAN_LINES: usize = 50;
const SUMMARY_LINES: usize = 5;
const SUMMARY_CHARS: usize = 500;

/// Summarize the first README found at the repository root.
pub fn summarize_readme(root: &Path) -> Option<String> {
    for name in README_FILES {
        let path = root.join(name);
        if !path.is_file() {
            continue;
        }
        match fs::read(&path) {
            Ok(bytes) => return Some(summarize(&String::from_utf8_lossy(&bytes))),
            Err(e) => tracing::warn!("Skipping unreadable {}: {}", path.display(), e),
        }
    }
    None
}

/// Join the first few prose lines of a README.
///
/// Blank lines, headings, links, tables and fenced code are skipped.
pub fn summarize(content: &str) -> String {
    let mut lines = Vec::new();
    let mut in_code_block = false;

    for line in content.lines().take(SCAN_LINES) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with("```") {
            in_code_block = !in_code_block;
            continue;
        }
        if in_code_block || line.starts_with(['#', '[', '|']) {
            continue;
        }

        lines.push(line);
        if lines.len() >= SUMMARY_LINES {
            break;
        }
    }

    let summary = lines.join(" ");
    if summary.chars().count() > SUMMARY_CHARS {
        let truncated: String = summary.chars().take(SUMMARY_CHARS).collect();
        format!("{truncated}...")
    } else {
        summary
    }
}

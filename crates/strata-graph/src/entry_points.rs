//! Entry-point location.
//!
//! Two signals are unioned per file: a filename convention for the primary
//! language, and a shallow look at the first kilobyte of content for a
//! language-specific "main" construct. Both are heuristics.

use std::sync::OnceLock;

use regex::Regex;

use crate::classifier::{self, signature_regex};
use crate::crawler::Crawl;

/// Conventional entry-point file names per language.
const ENTRY_FILENAMES: &[(&str, &[&str])] = &[
    (
        "python",
        &["main.py", "app.py", "run.py", "__main__.py", "setup.py"],
    ),
    ("jac", &["main.jac", "app.jac", "run.jac"]),
    (
        "javascript",
        &["index.js", "app.js", "main.js", "server.js", "package.json"],
    ),
    ("java", &["Main.java", "App.java", "Application.java"]),
    ("cpp", &["main.cpp", "app.cpp", "main.c"]),
    ("rust", &["main.rs", "lib.rs", "Cargo.toml"]),
    ("go", &["main.go", "app.go", "go.mod"]),
];

/// Content patterns indicating a main/entry construct.
const MAIN_PATTERNS: &[(&str, &[&str])] = &[
    (
        "python",
        &[
            r#"if\s+__name__\s*==\s*["']__main__["']"#,
            r"def\s+main\s*\(",
        ],
    ),
    (
        "javascript",
        &[
            r"function\s+main\s*\(",
            r"module\.exports\s*=",
            r"export\s+default",
        ],
    ),
    ("java", &[r"public\s+static\s+void\s+main\s*\("]),
    ("cpp", &[r"int\s+main\s*\("]),
    ("rust", &[r"fn\s+main\s*\("]),
    ("go", &[r"func\s+main\s*\("]),
];

fn compiled_main_patterns() -> &'static [(&'static str, Vec<Regex>)] {
    static PATTERNS: OnceLock<Vec<(&'static str, Vec<Regex>)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        MAIN_PATTERNS
            .iter()
            .map(|(lang, patterns)| {
                let compiled = patterns.iter().filter_map(|p| signature_regex(p)).collect();
                (*lang, compiled)
            })
            .collect()
    })
}

/// Conventional entry-point file names for `language`.
pub fn entry_filenames(language: &str) -> &'static [&'static str] {
    ENTRY_FILENAMES
        .iter()
        .find(|(lang, _)| *lang == language)
        .map(|(_, names)| *names)
        .unwrap_or(&[])
}

/// Returns true if `head` contains a main construct for `language`.
pub fn has_main_construct(language: &str, head: &str) -> bool {
    compiled_main_patterns()
        .iter()
        .find(|(lang, _)| *lang == language)
        .is_some_and(|(_, patterns)| patterns.iter().any(|re| re.is_match(head)))
}

/// Locate likely entry points in a crawled repository.
///
/// Returns repository-relative paths in crawl order, without duplicates.
/// Binary files never qualify. Files whose head cannot be read only
/// qualify through the filename signal.
pub fn locate_entry_points(crawl: &Crawl, language: &str) -> Vec<String> {
    let names = entry_filenames(language);
    let has_content_signal = compiled_main_patterns()
        .iter()
        .any(|(lang, _)| *lang == language);

    let mut entry_points = Vec::new();
    for file in crawl.files.iter().filter(|f| !f.binary) {
        if names.contains(&file.name()) {
            entry_points.push(file.path.clone());
            continue;
        }
        if !has_content_signal {
            continue;
        }

        let head = match classifier::read_head(&crawl.absolute(&file.path)) {
            Ok(head) => head,
            Err(e) => {
                tracing::debug!("Cannot inspect {} for entry point: {}", file.path, e);
                continue;
            }
        };
        if has_main_construct(language, &String::from_utf8_lossy(&head)) {
            entry_points.push(file.path.clone());
        }
    }

    tracing::debug!("Found {} entry points for {}", entry_points.len(), language);
    entry_points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::Crawler;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_entry_filenames() {
        assert!(entry_filenames("python").contains(&"__main__.py"));
        assert!(entry_filenames("rust").contains(&"Cargo.toml"));
        assert!(entry_filenames("cobol").is_empty());
    }

    #[test]
    fn test_has_main_construct() {
        assert!(has_main_construct(
            "python",
            "import sys\n\nif __name__ == \"__main__\":\n    run()\n"
        ));
        assert!(has_main_construct("go", "package main\n\nfunc main() {}\n"));
        assert!(!has_main_construct("go", "package util\n\nfunc helper() {}\n"));
        assert!(!has_main_construct("jac", "walker main {}"));
    }

    #[test]
    fn test_dunder_main_detected() {
        let dir = tempdir().expect("tempdir");
        fs::write(
            dir.path().join("tool.py"),
            "def run():\n    pass\n\nif __name__ == '__main__':\n    run()\n",
        )
        .expect("write");

        let crawl = Crawler::default().crawl(dir.path()).expect("crawl");
        assert_eq!(locate_entry_points(&crawl, "python"), vec!["tool.py"]);
    }

    #[test]
    fn test_signals_are_unioned_without_duplicates() {
        let dir = tempdir().expect("tempdir");
        fs::create_dir(dir.path().join("src")).expect("mkdir");
        fs::write(dir.path().join("Cargo.toml"), "[package]\nname = \"x\"\n").expect("write");
        fs::write(dir.path().join("src/main.rs"), "fn main() {}\n").expect("write");
        fs::write(dir.path().join("src/cli.rs"), "pub fn main() {}\n").expect("write");
        fs::write(dir.path().join("src/util.rs"), "pub fn helper() {}\n").expect("write");

        let crawl = Crawler::default().crawl(dir.path()).expect("crawl");
        assert_eq!(
            locate_entry_points(&crawl, "rust"),
            vec!["Cargo.toml", "src/cli.rs", "src/main.rs"]
        );
    }

    #[test]
    fn test_binary_files_never_qualify() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("main.py"), b"def main(\0\0").expect("write");

        let crawl = Crawler::default().crawl(dir.path()).expect("crawl");
        assert!(locate_entry_points(&crawl, "python").is_empty());
    }
}

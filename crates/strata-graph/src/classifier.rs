//! Language classification for repository files.
//!
//! A file's language is decided by its extension first and, when the
//! extension is unknown, by matching the first kilobyte of content against
//! ordered per-language signatures. Binary and oversized files are never
//! classified.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::OnceLock;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// Number of leading bytes inspected for binary and content detection.
pub const HEAD_BYTES: usize = 1024;

/// Files larger than this are excluded from classification and parsing.
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Extension table, matched case-insensitively without the leading dot.
const EXTENSION_MAP: &[(&str, &str)] = &[
    ("py", "python"),
    ("pyi", "python"),
    ("jac", "jac"),
    ("js", "javascript"),
    ("jsx", "javascript"),
    ("mjs", "javascript"),
    ("cjs", "javascript"),
    ("ts", "typescript"),
    ("tsx", "typescript"),
    ("java", "java"),
    ("cpp", "cpp"),
    ("cc", "cpp"),
    ("cxx", "cpp"),
    ("hpp", "cpp"),
    ("hh", "cpp"),
    ("hxx", "cpp"),
    ("c", "c"),
    ("h", "c"),
    ("rs", "rust"),
    ("go", "go"),
    ("rb", "ruby"),
    ("php", "php"),
    ("swift", "swift"),
    ("kt", "kotlin"),
    ("scala", "scala"),
    ("r", "r"),
    ("m", "matlab"),
    ("jl", "julia"),
    ("sh", "shell"),
    ("bash", "shell"),
    ("zsh", "shell"),
    ("fish", "shell"),
    ("ps1", "powershell"),
    ("bat", "batch"),
    ("cmd", "batch"),
    ("sql", "sql"),
    ("html", "html"),
    ("css", "css"),
    ("scss", "scss"),
    ("sass", "sass"),
    ("less", "less"),
    ("xml", "xml"),
    ("yaml", "yaml"),
    ("yml", "yaml"),
    ("json", "json"),
    ("toml", "toml"),
    ("ini", "ini"),
    ("cfg", "config"),
    ("conf", "config"),
    ("dockerfile", "dockerfile"),
    ("md", "markdown"),
    ("rst", "restructuredtext"),
    ("tex", "latex"),
    ("txt", "text"),
];

/// Content signatures, tried in order. The first language with any
/// matching pattern wins.
const CONTENT_SIGNATURES: &[(&str, &[&str])] = &[
    (
        "python",
        &[
            r"^#!/usr/bin/env python",
            r"^#!/usr/bin/python",
            r"import\s+\w+",
            r"from\s+\w+\s+import",
            r"def\s+\w+\s*\(",
            r"class\s+\w+",
        ],
    ),
    (
        "jac",
        &[
            r"node\s+\w+",
            r"walker\s+\w+",
            r"edge\s+\w+",
            r"graph\s+\w+",
            r"can\s+\w+",
            r"with\s+entry",
        ],
    ),
    (
        "javascript",
        &[
            r"^#!/usr/bin/env node",
            r"^#!/usr/bin/node",
            r"function\s+\w+\s*\(",
            r"const\s+\w+\s*=",
            r"let\s+\w+\s*=",
            r"var\s+\w+\s*=",
            r"=>\s*\{",
            r"require\s*\(",
            r"import\s+.*from",
        ],
    ),
    (
        "java",
        &[
            r"public\s+class\s+\w+",
            r"package\s+\w+",
            r"import\s+\w+",
            r"public\s+static\s+void\s+main",
            r"@Override",
            r"@Component",
            r"@Service",
        ],
    ),
    (
        "cpp",
        &[
            r"#include\s*<.*>",
            r#"#include\s*".*""#,
            r"using\s+namespace\s+\w+",
            r"class\s+\w+\s*\{",
            r"int\s+main\s*\(",
            r"std::",
        ],
    ),
    (
        "rust",
        &[
            r"use\s+\w+",
            r"fn\s+\w+\s*\(",
            r"struct\s+\w+",
            r"impl\s+\w+",
            r"let\s+\w+\s*=",
            r"match\s+\w+",
        ],
    ),
    (
        "go",
        &[
            r"package\s+\w+",
            r"import\s+\(",
            r"func\s+\w+\s*\(",
            r"type\s+\w+\s+struct",
            r"interface\s+\w+",
            r"var\s+\w+\s*=",
        ],
    ),
];

/// Compile a pattern the way every content signature is matched:
/// multi-line anchors, case-insensitive.
pub(crate) fn signature_regex(pattern: &str) -> Option<Regex> {
    match RegexBuilder::new(pattern)
        .multi_line(true)
        .case_insensitive(true)
        .build()
    {
        Ok(regex) => Some(regex),
        Err(e) => {
            tracing::warn!("Skipping invalid signature pattern {pattern:?}: {e}");
            None
        }
    }
}

fn compiled_signatures() -> &'static [(&'static str, Vec<Regex>)] {
    static SIGNATURES: OnceLock<Vec<(&'static str, Vec<Regex>)>> = OnceLock::new();
    SIGNATURES.get_or_init(|| {
        CONTENT_SIGNATURES
            .iter()
            .map(|(language, patterns)| {
                let compiled = patterns.iter().filter_map(|p| signature_regex(p)).collect();
                (*language, compiled)
            })
            .collect()
    })
}

/// Look up a language by file extension (without the dot).
pub fn language_for_extension(ext: &str) -> Option<&'static str> {
    let ext = ext.to_lowercase();
    EXTENSION_MAP
        .iter()
        .find(|(candidate, _)| *candidate == ext)
        .map(|(_, language)| *language)
}

/// Every language tag the classifier can assign, sorted.
pub fn known_languages() -> Vec<&'static str> {
    let mut languages: Vec<&'static str> = EXTENSION_MAP
        .iter()
        .map(|(_, language)| *language)
        .chain(CONTENT_SIGNATURES.iter().map(|(language, _)| *language))
        .collect();
    languages.sort_unstable();
    languages.dedup();
    languages
}

/// Look up a language from a path's extension.
pub fn language_for_path(path: &Path) -> Option<&'static str> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(language_for_extension)
}

/// Match leading file content against the content signatures.
pub fn classify_content(head: &str) -> Option<&'static str> {
    compiled_signatures()
        .iter()
        .find(|(_, patterns)| patterns.iter().any(|p| p.is_match(head)))
        .map(|(language, _)| *language)
}

/// Classify a file given its path and leading bytes.
///
/// The extension always takes precedence over content.
pub fn classify(path: &Path, head: &[u8]) -> Option<&'static str> {
    language_for_path(path).or_else(|| classify_content(&String::from_utf8_lossy(head)))
}

/// Returns true if the bytes look binary (contain a NUL byte).
pub fn is_binary(head: &[u8]) -> bool {
    head.contains(&0)
}

/// Read up to [`HEAD_BYTES`] from the start of a file.
pub fn read_head(path: &Path) -> io::Result<Vec<u8>> {
    let mut head = Vec::with_capacity(HEAD_BYTES);
    File::open(path)?
        .take(HEAD_BYTES as u64)
        .read_to_end(&mut head)?;
    Ok(head)
}

/// What the classifier learned about one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sniff {
    /// Byte length of the file
    pub size: u64,
    /// True when a NUL byte appears in the first kilobyte
    pub binary: bool,
    /// Assigned language; always `None` for binary or oversized files
    pub language: Option<&'static str>,
}

impl Sniff {
    /// Returns true if the file may be handed to the parser.
    pub fn is_code(&self, max_file_size: u64) -> bool {
        !self.binary && self.size <= max_file_size && self.language.is_some()
    }
}

/// Inspect a file on disk: size, binary check and language.
pub fn sniff(path: &Path, max_file_size: u64) -> io::Result<Sniff> {
    let size = std::fs::metadata(path)?.len();
    if size > max_file_size {
        return Ok(Sniff {
            size,
            binary: false,
            language: None,
        });
    }

    let head = read_head(path)?;
    let binary = is_binary(&head);
    let language = if binary { None } else { classify(path, &head) };
    Ok(Sniff {
        size,
        binary,
        language,
    })
}

/// Human-readable name for a language tag.
pub fn display_name(language: &str) -> String {
    let known = match language {
        "python" => Some("Python"),
        "jac" => Some("Jac"),
        "javascript" => Some("JavaScript"),
        "typescript" => Some("TypeScript"),
        "java" => Some("Java"),
        "cpp" => Some("C++"),
        "c" => Some("C"),
        "rust" => Some("Rust"),
        "go" => Some("Go"),
        _ => None,
    };
    match known {
        Some(name) => name.to_string(),
        None => {
            let mut chars = language.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        }
    }
}

/// Repository-level language statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LanguageStats {
    /// The language with the most classified files
    pub primary_language: Option<String>,
    /// Languages in first-seen order
    pub detected_languages: Vec<String>,
    /// Classified file count per language
    pub file_counts: BTreeMap<String, usize>,
    /// Total number of classified files
    pub total_files: usize,
    /// Share of classified files in the primary language (0 when none)
    pub confidence: f64,
}

impl LanguageStats {
    /// Aggregate per-file languages, in iteration order.
    ///
    /// Ties for the primary language go to the language seen first.
    pub fn from_languages<'a>(languages: impl IntoIterator<Item = &'a str>) -> Self {
        let mut stats = Self::default();
        for language in languages {
            let count = stats.file_counts.entry(language.to_string()).or_insert(0);
            if *count == 0 {
                stats.detected_languages.push(language.to_string());
            }
            *count += 1;
            stats.total_files += 1;
        }

        let mut best: Option<(&String, usize)> = None;
        for language in &stats.detected_languages {
            let count = stats.file_counts[language];
            if best.is_none_or(|(_, top)| count > top) {
                best = Some((language, count));
            }
        }

        if let Some((language, count)) = best {
            stats.confidence = count as f64 / stats.total_files as f64;
            stats.primary_language = Some(language.clone());
        }
        stats
    }
}

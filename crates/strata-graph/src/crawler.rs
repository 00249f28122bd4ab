//! Repository crawling.
//!
//! Walks a repository once, in alphabetical order, producing both the
//! hierarchical [`FileNode`] tree and a flat list of [`CrawledFile`]s with
//! their classification. Ignore patterns use gitignore matching, so a
//! literal pattern matches any path segment with that name and `*.ext`
//! matches names ending in `.ext`.

use std::fs;
use std::path::{Path, PathBuf};

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use serde::{Deserialize, Serialize};

use crate::classifier::{self, LanguageStats, MAX_FILE_SIZE};
use crate::error::{Error, Result};

/// Version-control, dependency and build-artifact entries skipped by default.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    ".git",
    "node_modules",
    "__pycache__",
    ".pytest_cache",
    "venv",
    "env",
    ".venv",
    ".env",
    "build",
    "dist",
    "target",
    ".cargo",
    ".idea",
    ".vscode",
    ".vs",
    "coverage",
    ".coverage",
    "htmlcov",
    ".tox",
    "site-packages",
    ".mypy_cache",
    ".ruff_cache",
    ".gitignore",
    ".dockerignore",
    ".DS_Store",
    "Thumbs.db",
    "*.pyc",
    "*.pyo",
    "*.pyd",
];

/// Configuration for the crawler.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Ignore patterns (literal segment names or `*.ext` suffixes).
    pub ignore_patterns: Vec<String>,
    /// Files larger than this are kept in the tree but never classified.
    pub max_file_size: u64,
    /// Also honour the repository's own `.gitignore`.
    pub use_gitignore: bool,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            ignore_patterns: DEFAULT_IGNORE_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            max_file_size: MAX_FILE_SIZE,
            use_gitignore: false,
        }
    }
}

/// Whether a tree node is a file or a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    File,
    Directory,
}

/// One entry in the repository tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNode {
    pub name: String,
    /// Path relative to the repository root (`.` for the root itself)
    pub path: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// Byte length for files, sum of children for directories
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Children ordered by name (directories only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FileNode>,
}

impl FileNode {
    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    /// Find a descendant (or self) by repository-relative path.
    pub fn find(&self, path: &str) -> Option<&FileNode> {
        if self.path == path {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(path))
    }

    /// Number of file nodes in this subtree.
    pub fn file_count(&self) -> usize {
        match self.kind {
            NodeKind::File => 1,
            NodeKind::Directory => self.children.iter().map(FileNode::file_count).sum(),
        }
    }
}

/// A file discovered during the crawl.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawledFile {
    /// Path relative to the repository root, `/`-separated
    pub path: String,
    pub size: u64,
    pub binary: bool,
    pub language: Option<&'static str>,
}

impl CrawledFile {
    /// The file's name (last path segment).
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// The result of crawling one repository.
#[derive(Debug, Clone)]
pub struct Crawl {
    /// Absolute or caller-relative repository root
    pub root: PathBuf,
    pub tree: FileNode,
    /// Every non-ignored file, in traversal order
    pub files: Vec<CrawledFile>,
    max_file_size: u64,
}

impl Crawl {
    /// Files that may reach the parser: classified, not binary, not oversized.
    pub fn code_files(&self) -> impl Iterator<Item = &CrawledFile> {
        self.files.iter().filter(move |f| {
            f.language.is_some() && !f.binary && f.size <= self.max_file_size
        })
    }

    /// Code files classified as `language`.
    pub fn code_files_for(&self, language: &str) -> Vec<&CrawledFile> {
        self.code_files()
            .filter(|f| f.language == Some(language))
            .collect()
    }

    /// Look up a crawled file by repository-relative path.
    pub fn file(&self, path: &str) -> Option<&CrawledFile> {
        self.files.iter().find(|f| f.path == path)
    }

    /// Resolve a repository-relative path against the root.
    pub fn absolute(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }

    /// Per-language statistics over the classified files.
    pub fn language_stats(&self) -> LanguageStats {
        LanguageStats::from_languages(self.code_files().filter_map(|f| f.language))
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }
}

/// Walks repositories and classifies their files.
pub struct Crawler {
    config: CrawlConfig,
}

impl Crawler {
    pub fn new(config: CrawlConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    /// Crawl a repository rooted at `root`.
    ///
    /// A missing root is fatal; unreadable directories and files below it
    /// are skipped.
    pub fn crawl(&self, root: &Path) -> Result<Crawl> {
        if !root.exists() {
            return Err(Error::RootNotFound(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(Error::NotADirectory(root.to_path_buf()));
        }
        fs::read_dir(root).map_err(|source| Error::Io {
            path: root.to_path_buf(),
            source,
        })?;

        let matcher = self.build_matcher(root)?;
        let mut files = Vec::new();
        let mut tree = self.visit_dir(&matcher, root, ".", &mut files);
        tree.name = root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| ".".to_string());

        tracing::debug!(
            "Crawled {}: {} files, {} bytes",
            root.display(),
            files.len(),
            tree.size
        );

        Ok(Crawl {
            root: root.to_path_buf(),
            tree,
            files,
            max_file_size: self.config.max_file_size,
        })
    }

    /// Build a gitignore matcher from the configured patterns.
    fn build_matcher(&self, root: &Path) -> Result<Gitignore> {
        let mut builder = GitignoreBuilder::new(root);

        if self.config.use_gitignore {
            let gitignore_path = root.join(".gitignore");
            if gitignore_path.exists() {
                if let Some(e) = builder.add(&gitignore_path) {
                    tracing::warn!("Ignoring unreadable {}: {}", gitignore_path.display(), e);
                }
            }
        }

        for pattern in &self.config.ignore_patterns {
            builder.add_line(None, pattern)?;
        }

        Ok(builder.build()?)
    }

    fn visit_dir(
        &self,
        matcher: &Gitignore,
        dir: &Path,
        rel: &str,
        files: &mut Vec<CrawledFile>,
    ) -> FileNode {
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let mut node = FileNode {
            name,
            path: rel.to_string(),
            kind: NodeKind::Directory,
            size: 0,
            language: None,
            children: Vec::new(),
        };

        let mut entries: Vec<_> = match fs::read_dir(dir) {
            Ok(entries) => entries.filter_map(|e| e.ok()).collect(),
            Err(e) => {
                tracing::warn!("Skipping unreadable directory {}: {}", dir.display(), e);
                return node;
            }
        };
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            let path = entry.path();
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_symlink() {
                tracing::debug!("Not following symlink {}", path.display());
                continue;
            }

            let is_dir = file_type.is_dir();
            if matcher.matched(&path, is_dir).is_ignore() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().to_string();
            let child_rel = if rel == "." {
                name
            } else {
                format!("{rel}/{name}")
            };

            let child = if is_dir {
                self.visit_dir(matcher, &path, &child_rel, files)
            } else {
                self.visit_file(&path, child_rel, files)
            };
            node.size += child.size;
            node.children.push(child);
        }

        node
    }

    fn visit_file(&self, path: &Path, rel: String, files: &mut Vec<CrawledFile>) -> FileNode {
        let sniff = match classifier::sniff(path, self.config.max_file_size) {
            Ok(sniff) => sniff,
            Err(e) => {
                tracing::warn!("Skipping unreadable file {}: {}", path.display(), e);
                classifier::Sniff {
                    size: 0,
                    binary: false,
                    language: None,
                }
            }
        };

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        files.push(CrawledFile {
            path: rel.clone(),
            size: sniff.size,
            binary: sniff.binary,
            language: sniff.language,
        });

        FileNode {
            name,
            path: rel,
            kind: NodeKind::File,
            size: sniff.size,
            language: sniff.language.map(str::to_string),
            children: Vec::new(),
        }
    }
}

impl Default for Crawler {
    fn default() -> Self {
        Self::new(CrawlConfig::default())
    }
}

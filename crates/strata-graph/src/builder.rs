//! Graph builder for constructing code context graphs from repositories.
//!
//! Coordinates crawling, classification, entry-point location, parallel
//! per-file parsing and single-threaded assembly. Entry-point files are
//! merged first; everything else follows in crawl order.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::classifier::LanguageStats;
use crate::crawler::{Crawl, CrawlConfig, Crawler, FileNode};
use crate::entry_points::locate_entry_points;
use crate::error::{Error, Result};
use crate::graph::{CcgAssembler, CodeContextGraph};
use crate::parser::{FileExtraction, GrammarRegistry, ParserOptions, Strategy, StructuralParser};
use crate::readme::summarize_readme;

/// Statistics from a build operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStats {
    /// Files handed to the parser (readable or not).
    pub files_processed: usize,
    /// Files extracted with a grammar.
    pub grammar_parses: usize,
    /// Files extracted with the pattern fallback.
    pub fallback_parses: usize,
    /// Files that could not be read and contributed nothing.
    pub unreadable_files: usize,
    /// Elements in the finished graph.
    pub elements: usize,
    /// Relationships in the finished graph.
    pub relationships: usize,
    /// References whose target name never resolved.
    pub dropped_references: usize,
    /// Wall time spent reading and parsing, in milliseconds.
    pub parse_time_ms: u64,
}

impl BuildStats {
    /// Merge another BuildStats into this one.
    pub fn merge(&mut self, other: &BuildStats) {
        self.files_processed += other.files_processed;
        self.grammar_parses += other.grammar_parses;
        self.fallback_parses += other.fallback_parses;
        self.unreadable_files += other.unreadable_files;
        self.elements += other.elements;
        self.relationships += other.relationships;
        self.dropped_references += other.dropped_references;
        self.parse_time_ms += other.parse_time_ms;
    }

    fn record(&mut self, strategy: Strategy) {
        self.files_processed += 1;
        match strategy {
            Strategy::Grammar => self.grammar_parses += 1,
            Strategy::Pattern => self.fallback_parses += 1,
        }
    }
}

/// Overview of a repository: tree, languages, entry points and README.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoMap {
    pub file_tree: FileNode,
    pub language_detection: LanguageStats,
    pub entry_points: Vec<String>,
    pub readme_summary: Option<String>,
}

/// Options for the builder.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Worker threads; 0 uses every available core.
    pub threads: usize,
    pub crawl: CrawlConfig,
    pub parser: ParserOptions,
}

/// Outcome of processing one file on a worker.
enum FileOutcome {
    Parsed(FileExtraction),
    Unreadable,
}

/// Coordinates crawling, parsing and graph assembly.
pub struct GraphBuilder {
    registry: Arc<GrammarRegistry>,
    options: BuildOptions,
}

impl GraphBuilder {
    /// Create a builder using the process-wide grammar registry.
    pub fn new(options: BuildOptions) -> Self {
        Self::with_registry(GrammarRegistry::global(), options)
    }

    /// Create a builder with an explicit grammar registry.
    pub fn with_registry(registry: Arc<GrammarRegistry>, options: BuildOptions) -> Self {
        Self { registry, options }
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    pub fn registry(&self) -> &GrammarRegistry {
        &self.registry
    }

    /// Crawl a repository with the configured ignore-set.
    pub fn crawl(&self, root: &Path) -> Result<Crawl> {
        Crawler::new(self.options.crawl.clone()).crawl(root)
    }

    /// Language statistics for a repository.
    pub fn detect_languages(&self, root: &Path) -> Result<LanguageStats> {
        Ok(self.crawl(root)?.language_stats())
    }

    /// Map a repository: file tree, languages, entry points and README summary.
    pub fn map_repository(&self, root: &Path) -> Result<RepoMap> {
        let crawl = self.crawl(root)?;
        let language_detection = crawl.language_stats();
        let entry_points = match &language_detection.primary_language {
            Some(language) => locate_entry_points(&crawl, language),
            None => Vec::new(),
        };

        Ok(RepoMap {
            readme_summary: summarize_readme(&crawl.root),
            file_tree: crawl.tree,
            language_detection,
            entry_points,
        })
    }

    /// Build the graph for every `language` file under `root`.
    ///
    /// Files listed in `entry_points` are merged first, in the given order.
    pub fn build(
        &self,
        root: &Path,
        language: &str,
        entry_points: &[String],
    ) -> Result<(CodeContextGraph, BuildStats)> {
        let crawl = self.crawl(root)?;
        self.build_crawl(&crawl, language, entry_points)
    }

    /// Build the graph from an existing crawl.
    pub fn build_crawl(
        &self,
        crawl: &Crawl,
        language: &str,
        entry_points: &[String],
    ) -> Result<(CodeContextGraph, BuildStats)> {
        let order = merge_order(crawl, language, entry_points);
        tracing::debug!(
            "Building {} graph from {} files ({} grammar)",
            language,
            order.len(),
            if self.registry.is_available(language) {
                "with"
            } else {
                "without"
            }
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.threads)
            .build()
            .map_err(|e| Error::WorkerPool(e.to_string()))?;

        let parse_start = Instant::now();
        let registry = &self.registry;
        let parser_options = self.options.parser;
        let outcomes: Vec<FileOutcome> = pool.install(|| {
            order
                .par_iter()
                .map_init(
                    || StructuralParser::new(Arc::clone(registry), parser_options),
                    |parser, path| process_file(parser, crawl, path, language),
                )
                .collect()
        });

        let mut stats = BuildStats {
            parse_time_ms: parse_start.elapsed().as_millis() as u64,
            ..BuildStats::default()
        };

        let mut assembler = CcgAssembler::new();
        for (path, outcome) in order.iter().zip(outcomes) {
            match outcome {
                FileOutcome::Parsed(file) => {
                    stats.record(file.strategy);
                    assembler.push(path, file.extraction);
                }
                FileOutcome::Unreadable => {
                    stats.files_processed += 1;
                    stats.unreadable_files += 1;
                }
            }
        }

        stats.dropped_references = assembler.dropped_references();
        let ccg = assembler.finish();
        stats.elements = ccg.len();
        stats.relationships = ccg.relationships().len();

        tracing::info!(
            "Built graph: {} files ({} grammar, {} fallback, {} unreadable), {} elements, {} relationships in {}ms",
            stats.files_processed,
            stats.grammar_parses,
            stats.fallback_parses,
            stats.unreadable_files,
            stats.elements,
            stats.relationships,
            stats.parse_time_ms
        );

        Ok((ccg, stats))
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new(BuildOptions::default())
    }
}

/// Entry points that are code files of `language`, then every other code
/// file of `language` in crawl order.
fn merge_order(crawl: &Crawl, language: &str, entry_points: &[String]) -> Vec<String> {
    let code_files: Vec<&str> = crawl
        .code_files_for(language)
        .into_iter()
        .map(|f| f.path.as_str())
        .collect();
    let known: HashSet<&str> = code_files.iter().copied().collect();

    let mut seen: HashSet<&str> = HashSet::with_capacity(code_files.len());
    let mut order: Vec<String> = Vec::with_capacity(code_files.len());
    for entry in entry_points {
        let entry = entry.trim_start_matches("./");
        if !known.contains(entry) {
            tracing::debug!("Entry point {} is not a {} code file", entry, language);
        } else if seen.insert(entry) {
            order.push(entry.to_string());
        }
    }
    for path in code_files {
        if seen.insert(path) {
            order.push(path.to_string());
        }
    }
    order
}

/// Read, decode and parse one file. Undecodable bytes are replaced.
fn process_file(
    parser: &mut StructuralParser,
    crawl: &Crawl,
    path: &str,
    language: &str,
) -> FileOutcome {
    let bytes = match fs::read(crawl.absolute(path)) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("Skipping unreadable file {}: {}", path, e);
            return FileOutcome::Unreadable;
        }
    };
    let source = String::from_utf8_lossy(&bytes);
    FileOutcome::Parsed(parser.parse(&source, language, path))
}

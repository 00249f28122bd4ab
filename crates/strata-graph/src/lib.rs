//! strata-graph: Code context graph infrastructure
//!
//! This crate provides the core repository analysis functionality for Strata:
//! - Repository crawling with ignore patterns and language classification
//! - Entry-point location and README summarization
//! - Structural extraction via tree-sitter grammars with a regex fallback
//! - Code Context Graph assembly and querying

pub mod builder;
pub mod classifier;
pub mod crawler;
pub mod element;
pub mod entry_points;
pub mod error;
pub mod fallback;
pub mod graph;
pub mod lang;
pub mod parser;
pub mod readme;
pub mod relationship;

pub use builder::{BuildOptions, BuildStats, GraphBuilder, RepoMap};
pub use classifier::{LanguageStats, classify, language_for_path};
pub use crawler::{Crawl, CrawlConfig, CrawledFile, Crawler, FileNode, NodeKind};
pub use element::{CodeElement, ElementKind};
pub use entry_points::locate_entry_points;
pub use error::{Error, ParseError, Result};
pub use graph::{CcgAssembler, CcgExport, CodeContextGraph, QueryMatch};
pub use lang::{Extraction, LanguageHandler};
pub use parser::{FileExtraction, GrammarRegistry, ParserOptions, Strategy, StructuralParser};
pub use readme::summarize_readme;
pub use relationship::{Reference, Relationship, RelationshipKind};

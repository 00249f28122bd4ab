//! Multi-strategy structural parser.
//!
//! The [`GrammarRegistry`] is a capability table from language tag to
//! grammar handler, built once. A language without an entry is a normal
//! state, not an error. [`StructuralParser`] tries the grammar strategy and
//! silently falls back to the pattern strategy when no grammar is available
//! or the parse fails.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::fallback;
use crate::lang::{
    Extraction, JavaHandler, JavaScriptHandler, LanguageHandler, PythonHandler, RustHandler,
};

/// Registered grammar handlers, keyed by language tag.
pub struct GrammarRegistry {
    handlers: HashMap<&'static str, Arc<dyn LanguageHandler>>,
}

impl GrammarRegistry {
    /// A registry with no grammars; every language uses the pattern strategy.
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// A registry with every built-in grammar that loads successfully.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(PythonHandler));
        registry.register(Arc::new(JavaScriptHandler));
        registry.register(Arc::new(JavaHandler));
        registry.register(Arc::new(RustHandler));
        registry
    }

    /// The process-wide registry, built on first use.
    pub fn global() -> Arc<GrammarRegistry> {
        static REGISTRY: OnceLock<Arc<GrammarRegistry>> = OnceLock::new();
        Arc::clone(REGISTRY.get_or_init(|| Arc::new(GrammarRegistry::new())))
    }

    /// Register a handler if its grammar loads. Returns whether it did.
    pub fn register(&mut self, handler: Arc<dyn LanguageHandler>) -> bool {
        let mut probe = tree_sitter::Parser::new();
        if let Err(e) = probe.set_language(&handler.grammar()) {
            tracing::warn!(
                "Grammar for {} unavailable, using patterns: {}",
                handler.language(),
                e
            );
            return false;
        }
        self.handlers.insert(handler.language(), handler);
        true
    }

    /// Returns true if a grammar is registered for `language`.
    pub fn is_available(&self, language: &str) -> bool {
        self.handlers.contains_key(language)
    }

    pub fn handler(&self, language: &str) -> Option<&Arc<dyn LanguageHandler>> {
        self.handlers.get(language)
    }

    /// Languages with a registered grammar, sorted.
    pub fn languages(&self) -> Vec<&'static str> {
        let mut languages: Vec<_> = self.handlers.keys().copied().collect();
        languages.sort_unstable();
        languages
    }
}

impl Default for GrammarRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Which strategy produced a file's extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Grammar,
    Pattern,
}

/// Options controlling strategy selection.
#[derive(Debug, Clone, Copy)]
pub struct ParserOptions {
    /// Treat a tree containing syntax errors as a parse failure.
    pub fallback_on_syntax_error: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            fallback_on_syntax_error: true,
        }
    }
}

/// The result of parsing one file.
#[derive(Debug, Clone)]
pub struct FileExtraction {
    pub extraction: Extraction,
    pub strategy: Strategy,
}

/// Per-worker parser. Holds its own tree-sitter parser, so it is cheap to
/// reuse across files but must not be shared between threads.
pub struct StructuralParser {
    registry: Arc<GrammarRegistry>,
    ts_parser: tree_sitter::Parser,
    current: Option<&'static str>,
    options: ParserOptions,
}

impl StructuralParser {
    pub fn new(registry: Arc<GrammarRegistry>, options: ParserOptions) -> Self {
        Self {
            registry,
            ts_parser: tree_sitter::Parser::new(),
            current: None,
            options,
        }
    }

    /// Extract elements from `source`, falling back to patterns when the
    /// grammar strategy is unavailable or fails.
    pub fn parse(&mut self, source: &str, language: &str, file_path: &str) -> FileExtraction {
        match self.parse_with_grammar(source, language, file_path) {
            Ok(extraction) => FileExtraction {
                extraction,
                strategy: Strategy::Grammar,
            },
            Err(e) => {
                tracing::debug!("Pattern strategy for {} ({}): {}", file_path, language, e);
                FileExtraction {
                    extraction: fallback::extract(source, language, file_path),
                    strategy: Strategy::Pattern,
                }
            }
        }
    }

    /// Run only the grammar strategy.
    pub fn parse_with_grammar(
        &mut self,
        source: &str,
        language: &str,
        file_path: &str,
    ) -> Result<Extraction, ParseError> {
        let handler = self
            .registry
            .handler(language)
            .cloned()
            .ok_or_else(|| ParseError::UnsupportedLanguage(language.to_string()))?;

        if self.current != Some(handler.language()) {
            self.ts_parser
                .set_language(&handler.grammar())
                .map_err(|e| ParseError::LanguageError(e.to_string()))?;
            self.current = Some(handler.language());
        }

        let tree = self
            .ts_parser
            .parse(source, None)
            .ok_or(ParseError::ParseFailed)?;
        if self.options.fallback_on_syntax_error && tree.root_node().has_error() {
            return Err(ParseError::SyntaxError);
        }

        handler.extract(&tree, source, file_path)
    }
}

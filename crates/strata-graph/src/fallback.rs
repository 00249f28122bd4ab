//! Pattern-based structural extraction.
//!
//! The degraded strategy used when no grammar is registered for a language
//! or the grammar parse fails. Line-anchored regular expressions find
//! function and class declarations; nothing is nested, no relationships or
//! references are produced, and spans cover only the declaration header.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use regex::{Regex, RegexBuilder};

use crate::element::{CodeElement, ElementKind};
use crate::lang::Extraction;

/// Names that declaration patterns can pick up from control flow.
const KEYWORDS: &[&str] = &[
    "if",
    "elif",
    "else",
    "for",
    "foreach",
    "while",
    "do",
    "switch",
    "case",
    "catch",
    "try",
    "return",
    "throw",
    "new",
    "delete",
    "sizeof",
    "typeof",
    "with",
    "match",
    "loop",
    "synchronized",
];

/// How a parameter list names its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParamStyle {
    /// `name: Type` or bare `name` (Python, JavaScript, TypeScript, Rust)
    Annotated,
    /// `name Type` (Go)
    NameFirst,
    /// `Type name` (Java, C, C++)
    NameLast,
}

struct DeclPattern {
    kind: ElementKind,
    regex: Regex,
}

struct PatternSet {
    style: ParamStyle,
    patterns: Vec<DeclPattern>,
}

const JS_FUNCTIONS: &[&str] = &[
    r"(?:export[ \t]+)?(?:default[ \t]+)?(?:async[ \t]+)?function\*?[ \t]*(?P<name>\w+)[ \t]*\((?P<params>[^)]*)\)",
    r"(?:export[ \t]+)?(?:const|let|var)[ \t]+(?P<name>\w+)[ \t]*=[ \t]*(?:async[ \t]+)?\((?P<params>[^)]*)\)[ \t]*=>",
];
const JS_CLASSES: &[&str] =
    &[r"(?:export[ \t]+)?(?:default[ \t]+)?(?:abstract[ \t]+)?class[ \t]+(?P<name>\w+)"];

/// Per-language declaration patterns: (language, style, functions, classes).
#[allow(clippy::type_complexity)]
const LANGUAGE_PATTERNS: &[(&str, ParamStyle, &[&str], &[&str])] = &[
    (
        "python",
        ParamStyle::Annotated,
        &[r"(?:async[ \t]+)?def[ \t]+(?P<name>\w+)[ \t]*\((?P<params>[^)]*)\)"],
        &[r"class[ \t]+(?P<name>\w+)"],
    ),
    ("javascript", ParamStyle::Annotated, JS_FUNCTIONS, JS_CLASSES),
    (
        "typescript",
        ParamStyle::Annotated,
        JS_FUNCTIONS,
        &[
            r"(?:export[ \t]+)?(?:default[ \t]+)?(?:abstract[ \t]+)?class[ \t]+(?P<name>\w+)",
            r"(?:export[ \t]+)?interface[ \t]+(?P<name>\w+)",
        ],
    ),
    (
        "java",
        ParamStyle::NameLast,
        &[r"(?:[\w<>\[\],.?]+[ \t]+)*(?P<name>\w+)[ \t]*\((?P<params>[^)]*)\)[^;{\n]*\{"],
        &[r"(?:(?:public|private|protected|static|final|abstract|sealed)[ \t]+)*(?:class|interface|enum|record)[ \t]+(?P<name>\w+)"],
    ),
    (
        "go",
        ParamStyle::NameFirst,
        &[r"func[ \t]+(?:\([^)]*\)[ \t]*)?(?P<name>\w+)[ \t]*(?:\[[^\]]*\])?\((?P<params>[^)]*)\)"],
        &[r"type[ \t]+(?P<name>\w+)[ \t]+(?:struct|interface)\b"],
    ),
    (
        "rust",
        ParamStyle::Annotated,
        &[r#"(?:pub(?:\([^)]*\))?[ \t]+)?(?:(?:const|async|unsafe|extern(?:[ \t]+"[^"]*")?)[ \t]+)*fn[ \t]+(?P<name>\w+)[ \t]*(?:<[^(]*>)?[ \t]*\((?P<params>[^)]*)\)"#],
        &[r"(?:pub(?:\([^)]*\))?[ \t]+)?(?:struct|enum|trait|union)[ \t]+(?P<name>\w+)"],
    ),
    (
        "c",
        ParamStyle::NameLast,
        &[r"(?:[\w*]+[ \t]+[*]*)+(?P<name>\w+)[ \t]*\((?P<params>[^)]*)\)[ \t]*\{"],
        &[r"(?:typedef[ \t]+)?struct[ \t]+(?P<name>\w+)[ \t]*\{"],
    ),
    (
        "cpp",
        ParamStyle::NameLast,
        &[r"(?:[\w*&:<>,]+[ \t]+[*&]*)+(?:\w+::)*~?(?P<name>\w+)[ \t]*\((?P<params>[^)]*)\)[ \t\w]*\{"],
        &[r"(?:template[ \t]*<[^>]*>[ \t]*)?(?:class|struct)[ \t]+(?P<name>\w+)[^;\n]*\{"],
    ),
];

fn compile(pattern: &str) -> Option<Regex> {
    let anchored = format!(r"^[ \t]*(?P<decl>{pattern})");
    match RegexBuilder::new(&anchored).multi_line(true).build() {
        Ok(regex) => Some(regex),
        Err(e) => {
            tracing::warn!("Invalid declaration pattern {}: {}", pattern, e);
            None
        }
    }
}

fn pattern_sets() -> &'static HashMap<&'static str, PatternSet> {
    static SETS: OnceLock<HashMap<&'static str, PatternSet>> = OnceLock::new();
    SETS.get_or_init(|| {
        LANGUAGE_PATTERNS
            .iter()
            .map(|(language, style, functions, classes)| {
                let functions = functions.iter().map(|p| (ElementKind::Function, *p));
                let classes = classes.iter().map(|p| (ElementKind::Class, *p));
                let patterns = functions
                    .chain(classes)
                    .filter_map(|(kind, p)| compile(p).map(|regex| DeclPattern { kind, regex }))
                    .collect();
                (
                    *language,
                    PatternSet {
                        style: *style,
                        patterns,
                    },
                )
            })
            .collect()
    })
}

/// Returns true if declaration patterns exist for `language`.
pub fn has_patterns(language: &str) -> bool {
    pattern_sets().contains_key(language)
}

/// Languages with declaration patterns, sorted.
pub fn supported_languages() -> Vec<&'static str> {
    let mut languages: Vec<_> = pattern_sets().keys().copied().collect();
    languages.sort_unstable();
    languages
}

/// Extract top-level declarations from `source` with line-anchored patterns.
///
/// Elements come back in source order. A name declared twice keeps its
/// first occurrence. Unknown languages yield an empty extraction.
pub fn extract(source: &str, language: &str, file_path: &str) -> Extraction {
    let Some(set) = pattern_sets().get(language) else {
        return Extraction::new();
    };

    let mut found: Vec<(usize, CodeElement)> = Vec::new();
    for pattern in &set.patterns {
        for caps in pattern.regex.captures_iter(source) {
            let (Some(decl), Some(name)) = (caps.name("decl"), caps.name("name")) else {
                continue;
            };
            if KEYWORDS.contains(&name.as_str()) {
                continue;
            }

            let (line_start, column_start) = position(source, decl.start());
            let (line_end, column_end) = position(source, decl.end());
            let mut element = CodeElement::new(name.as_str(), pattern.kind, file_path)
                .with_span(line_start, column_start, line_end, column_end);
            if let Some(params) = caps.name("params") {
                element = element.with_parameters(parameter_names(params.as_str(), set.style));
            }
            found.push((decl.start(), element));
        }
    }
    found.sort_by_key(|(offset, _)| *offset);

    let mut seen = HashSet::new();
    let mut out = Extraction::new();
    for (_, element) in found {
        if seen.insert(element.id()) {
            out.push(element);
        }
    }
    out
}

/// 1-indexed line and 0-indexed byte column of `offset`.
fn position(source: &str, offset: usize) -> (usize, usize) {
    let before = &source.as_bytes()[..offset];
    let line = before.iter().filter(|&&b| b == b'\n').count() + 1;
    let line_start = before
        .iter()
        .rposition(|&b| b == b'\n')
        .map_or(0, |i| i + 1);
    (line, offset - line_start)
}

/// Split a parameter list on top-level commas and pull out the names.
fn parameter_names(params: &str, style: ParamStyle) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in params.char_indices() {
        match c {
            '(' | '[' | '<' | '{' => depth += 1,
            ')' | ']' | '>' | '}' => depth -= 1,
            ',' if depth == 0 => {
                pieces.push(&params[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    pieces.push(&params[start..]);

    pieces
        .into_iter()
        .filter_map(|piece| parameter_name(piece, style))
        .collect()
}

fn parameter_name(piece: &str, style: ParamStyle) -> Option<String> {
    let piece = piece.split('=').next().unwrap_or_default().trim();
    if piece.is_empty() {
        return None;
    }

    let name = match style {
        ParamStyle::Annotated => {
            let binding = piece.split(':').next().unwrap_or_default();
            binding
                .split_whitespace()
                .last()?
                .trim_start_matches(['&', '.'])
                .trim_end_matches('?')
        }
        ParamStyle::NameFirst => piece.split_whitespace().next()?,
        ParamStyle::NameLast => {
            if piece == "void" || !piece.contains(|c: char| c.is_whitespace() || c == '*') {
                return None;
            }
            piece
                .rsplit(|c: char| c.is_whitespace() || c == '*' || c == '&')
                .find(|t| !t.is_empty())?
                .split('[')
                .next()
                .unwrap_or_default()
        }
    };

    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(extraction: &Extraction) -> Vec<(&str, ElementKind)> {
        extraction
            .elements
            .iter()
            .map(|e| (e.name.as_str(), e.kind))
            .collect()
    }

    #[test]
    fn test_supported_languages() {
        assert_eq!(
            supported_languages(),
            vec!["c", "cpp", "go", "java", "javascript", "python", "rust", "typescript"]
        );
        assert!(has_patterns("go"));
        assert!(!has_patterns("cobol"));
    }

    #[test]
    fn test_python_patterns() {
        let source = "class Foo(Base):\n    def bar(self, x: int = 1, *args):\n        pass\n\ndef baz():\n    if (x):\n        pass\n";
        let extraction = extract(source, "python", "a.py");
        assert_eq!(
            names(&extraction),
            vec![
                ("Foo", ElementKind::Class),
                ("bar", ElementKind::Function),
                ("baz", ElementKind::Function),
            ]
        );

        let bar = &extraction.elements[1];
        assert_eq!(bar.line_start, 2);
        assert_eq!(bar.column_start, 4);
        assert_eq!(
            bar.parameters,
            Some(vec!["self".to_string(), "x".to_string(), "*args".to_string()])
        );
        assert!(extraction.relationships.is_empty());
        assert!(extraction.elements.iter().all(|e| e.parent.is_none()));
    }

    #[test]
    fn test_go_patterns() {
        let source = "package main\n\ntype Server struct {\n}\n\nfunc (s *Server) Start(addr string, port int) error {\n\treturn nil\n}\n\nfunc main() {\n}\n";
        let extraction = extract(source, "go", "main.go");
        assert_eq!(
            names(&extraction),
            vec![
                ("Server", ElementKind::Class),
                ("Start", ElementKind::Function),
                ("main", ElementKind::Function),
            ]
        );
        assert_eq!(
            extraction.elements[1].parameters,
            Some(vec!["addr".to_string(), "port".to_string()])
        );
        assert_eq!(extraction.elements[2].line_start, 10);
    }

    #[test]
    fn test_java_patterns_skip_control_flow() {
        let source = "public class Main {\n    public static void main(String[] args) {\n        if (args.length > 0) {\n        }\n        for (String a : args) {\n        }\n    }\n}\n";
        let extraction = extract(source, "java", "Main.java");
        assert_eq!(
            names(&extraction),
            vec![("Main", ElementKind::Class), ("main", ElementKind::Function)]
        );
        assert_eq!(
            extraction.elements[1].parameters,
            Some(vec!["args".to_string()])
        );
    }

    #[test]
    fn test_c_patterns() {
        let source = "#include <stdio.h>\n\nstruct point {\n    int x;\n};\n\nstatic int add(int a, const char *name) {\n    return a;\n}\n\nint main(void) {\n    while (1) {\n    }\n}\n";
        let extraction = extract(source, "c", "main.c");
        assert_eq!(
            names(&extraction),
            vec![
                ("point", ElementKind::Class),
                ("add", ElementKind::Function),
                ("main", ElementKind::Function),
            ]
        );
        assert_eq!(
            extraction.elements[1].parameters,
            Some(vec!["a".to_string(), "name".to_string()])
        );
        assert_eq!(extraction.elements[2].parameters, Some(vec![]));
    }

    #[test]
    fn test_javascript_arrow_functions() {
        let source = "export const load = async (path, opts = {}) => {\n};\nclass Cache {\n}\n";
        let extraction = extract(source, "javascript", "load.js");
        assert_eq!(
            names(&extraction),
            vec![("load", ElementKind::Function), ("Cache", ElementKind::Class)]
        );
        assert_eq!(
            extraction.elements[0].parameters,
            Some(vec!["path".to_string(), "opts".to_string()])
        );
    }

    #[test]
    fn test_rust_patterns() {
        let source = "pub struct Config;\n\nimpl Config {\n    pub fn load(&self, path: &Path) -> Self {\n        todo!()\n    }\n}\n";
        let extraction = extract(source, "rust", "lib.rs");
        assert_eq!(
            names(&extraction),
            vec![("Config", ElementKind::Class), ("load", ElementKind::Function)]
        );
        assert_eq!(
            extraction.elements[1].parameters,
            Some(vec!["self".to_string(), "path".to_string()])
        );
    }

    #[test]
    fn test_span_slices_declaration_header() {
        let source = "x = 1\n\n  def run(a):\n      pass\n";
        let extraction = extract(source, "python", "r.py");
        let run = &extraction.elements[0];
        let line = source.lines().nth(run.line_start - 1).expect("line");
        assert_eq!(&line[run.column_start..run.column_end], "def run(a)");
    }

    #[test]
    fn test_duplicate_names_keep_first() {
        let source = "def f():\n    pass\n\ndef f():\n    pass\n";
        let extraction = extract(source, "python", "dup.py");
        assert_eq!(extraction.elements.len(), 1);
        assert_eq!(extraction.elements[0].line_start, 1);
    }

    #[test]
    fn test_unknown_language_is_empty() {
        assert!(extract("anything", "cobol", "x.cbl").is_empty());
    }
}

//! Integration tests for strata-graph
//!
//! Drives the public API end to end against on-disk repositories.

use std::fs;
use std::path::Path;

use strata_graph::{
    BuildOptions, Crawler, ElementKind, GraphBuilder, RelationshipKind, classify,
    locate_entry_points,
};
use tempfile::TempDir;

fn create_file(dir: &Path, name: &str, content: &[u8]) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create dirs");
    }
    fs::write(path, content).expect("write file");
}

/// Two files: `a.py` with a class and method, `b.py` with a function.
fn two_file_repo() -> TempDir {
    let temp_dir = TempDir::new().expect("tempdir");
    create_file(
        temp_dir.path(),
        "a.py",
        b"class Foo:\n    def bar(self):\n        return baz()\n",
    );
    create_file(temp_dir.path(), "b.py", b"def baz():\n    return 42\n");
    temp_dir
}

#[test]
fn two_file_repository_graph() {
    let temp_dir = two_file_repo();
    let (ccg, stats) = GraphBuilder::default()
        .build(temp_dir.path(), "python", &[])
        .expect("build");

    let ids: Vec<&str> = ccg.elements().keys().map(String::as_str).collect();
    assert_eq!(ids, vec!["a.py:Foo", "a.py:Foo:bar", "b.py:baz"]);
    assert_eq!(stats.elements, 3);

    assert_eq!(
        ccg.outgoing("a.py:Foo", RelationshipKind::Contains),
        vec!["a.py:Foo:bar"]
    );
    let foo = ccg.get("a.py:Foo").expect("Foo");
    assert_eq!(foo.kind, ElementKind::Class);
    assert_eq!(foo.children.as_deref(), Some(&["a.py:Foo:bar".to_string()][..]));
}

#[test]
fn every_graph_edge_has_both_endpoints() {
    let temp_dir = two_file_repo();
    create_file(
        temp_dir.path(),
        "c.py",
        b"import os\n\nclass Child(Missing):\n    def run(self):\n        undefined()\n        baz()\n",
    );

    let (ccg, stats) = GraphBuilder::default()
        .build(temp_dir.path(), "python", &[])
        .expect("build");

    assert!(stats.dropped_references >= 2);
    let nodes = ccg.graph_nodes();
    for edge in ccg.graph_edges() {
        assert!(nodes.contains(&edge.from.as_str()), "missing {}", edge.from);
        assert!(nodes.contains(&edge.to.as_str()), "missing {}", edge.to);
    }
}

#[test]
fn element_ids_are_stable_across_runs() {
    let temp_dir = two_file_repo();
    let builder = GraphBuilder::default();

    let first = builder
        .build(temp_dir.path(), "python", &[])
        .expect("build")
        .0
        .export();
    let second = builder
        .build(temp_dir.path(), "python", &[])
        .expect("build")
        .0
        .export();

    assert_eq!(
        first.elements.keys().collect::<Vec<_>>(),
        second.elements.keys().collect::<Vec<_>>()
    );
    assert_eq!(first.relationships, second.relationships);
}

#[test]
fn spans_reproduce_declaration_headers() {
    let temp_dir = TempDir::new().expect("tempdir");
    let source = "import os\n\n\nclass Shape:\n    def area(self):\n        return 0\n\n\ndef describe(shape, verbose=False):\n    return str(shape)\n";
    create_file(temp_dir.path(), "shapes.py", source.as_bytes());

    let (ccg, _) = GraphBuilder::default()
        .build(temp_dir.path(), "python", &[])
        .expect("build");

    let lines: Vec<&str> = source.lines().collect();
    let header = |id: &str| {
        let element = ccg.get(id).expect("element");
        let line = lines[element.line_start - 1];
        line[element.column_start..].to_string()
    };
    assert_eq!(header("shapes.py:Shape"), "class Shape:");
    assert_eq!(header("shapes.py:Shape:area"), "def area(self):");
    assert_eq!(
        header("shapes.py:describe"),
        "def describe(shape, verbose=False):"
    );

    let describe = ccg.get("shapes.py:describe").expect("describe");
    assert_eq!(describe.line_end, 10);
}

#[test]
fn extension_wins_over_content() {
    assert_eq!(
        classify(Path::new("script.py"), b"package main\nfunc main() {}\n"),
        Some("python")
    );
}

#[test]
fn binary_files_never_reach_the_parser() {
    let temp_dir = two_file_repo();
    create_file(temp_dir.path(), "packed.py", b"def hidden():\n\0\0\0");

    let crawl = Crawler::default().crawl(temp_dir.path()).expect("crawl");
    let code: Vec<&str> = crawl.code_files().map(|f| f.path.as_str()).collect();
    assert_eq!(code, vec!["a.py", "b.py"]);

    let (ccg, stats) = GraphBuilder::default()
        .build_crawl(&crawl, "python", &[])
        .expect("build");
    assert_eq!(stats.files_processed, 2);
    assert!(ccg.get("packed.py:hidden").is_none());
}

#[test]
fn dunder_main_is_an_entry_point() {
    let temp_dir = TempDir::new().expect("tempdir");
    create_file(
        temp_dir.path(),
        "tools/run_job.py",
        b"def job():\n    pass\n\nif __name__ == \"__main__\":\n    job()\n",
    );

    let crawl = Crawler::default().crawl(temp_dir.path()).expect("crawl");
    assert_eq!(
        locate_entry_points(&crawl, "python"),
        vec!["tools/run_job.py"]
    );
}

#[test]
fn calls_query_returns_only_calls_in_order() {
    let temp_dir = TempDir::new().expect("tempdir");
    create_file(
        temp_dir.path(),
        "app.py",
        b"class Base:\n    pass\n\nclass Impl(Base):\n    def go(self):\n        first()\n\ndef first():\n    second()\n\ndef second():\n    pass\n",
    );

    let (ccg, _) = GraphBuilder::default()
        .build(temp_dir.path(), "python", &[])
        .expect("build");

    let calls = ccg.query("show me all calls");
    let pairs: Vec<(&str, &str)> = calls
        .iter()
        .map(|m| (m.from.as_str(), m.to.as_str()))
        .collect();
    assert_eq!(
        pairs,
        vec![
            ("app.py:Impl:go", "app.py:first"),
            ("app.py:first", "app.py:second"),
        ]
    );
    assert!(calls.iter().all(|m| m.relationship == "calls"));

    let inherits = ccg.query("What INHERITS from Base?");
    assert_eq!(inherits.len(), 1);
    assert_eq!(inherits[0].to, "app.py:Base");

    assert!(ccg.query("list the modules").is_empty());
}

#[test]
fn missing_root_returns_no_graph() {
    let temp_dir = TempDir::new().expect("tempdir");
    let missing = temp_dir.path().join("nope");
    assert!(GraphBuilder::default().build(&missing, "python", &[]).is_err());
    assert!(GraphBuilder::default().map_repository(&missing).is_err());
}

#[test]
fn mixed_strategies_in_one_repository() {
    let temp_dir = TempDir::new().expect("tempdir");
    create_file(
        temp_dir.path(),
        "src/lib.rs",
        b"pub mod shapes;\n\npub trait Area {\n    fn area(&self) -> f64;\n}\n",
    );
    create_file(
        temp_dir.path(),
        "src/shapes.rs",
        b"use crate::Area;\n\npub struct Square(f64);\n\nimpl Area for Square {\n    fn area(&self) -> f64 {\n        self.0 * self.0\n    }\n}\n",
    );
    create_file(temp_dir.path(), "broken.rs", b"fn oops() {\n    let x = ;\n");

    let builder = GraphBuilder::new(BuildOptions {
        threads: 2,
        ..BuildOptions::default()
    });
    let (ccg, stats) = builder
        .build(temp_dir.path(), "rust", &["src/lib.rs".to_string()])
        .expect("build");

    assert_eq!(stats.files_processed, 3);
    assert_eq!(stats.grammar_parses, 2);
    assert_eq!(stats.fallback_parses, 1);
    assert!(ccg.get("broken.rs:oops").is_some());
    assert_eq!(
        ccg.outgoing("src/shapes.rs:Square", RelationshipKind::Implements),
        vec!["src/lib.rs:Area"]
    );
}

#[test]
fn export_serializes_as_plain_json() {
    let temp_dir = two_file_repo();
    let (ccg, _) = GraphBuilder::default()
        .build(temp_dir.path(), "python", &[])
        .expect("build");

    let json = serde_json::to_value(ccg.export()).expect("serialize");
    assert_eq!(json["elements"]["a.py:Foo:bar"]["type"], "function");
    assert_eq!(json["elements"]["a.py:Foo:bar"]["parent"], "a.py:Foo");
    assert_eq!(
        json["relationships"][0],
        serde_json::json!(["a.py:Foo", "a.py:Foo:bar", "contains"])
    );
    assert!(json["graph_nodes"].is_array());
    assert!(json["graph_edges"].is_array());
}

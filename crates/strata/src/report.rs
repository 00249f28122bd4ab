//! Analysis reports handed to the documentation generator.
//!
//! A report bundles the repository-info record supplied on the command line
//! with everything the library derives: language detection, entry points,
//! build statistics and the exported graph.

use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use strata_graph::{
    BuildStats, CcgExport, CodeContextGraph, GraphBuilder, LanguageStats, locate_entry_points,
};

/// Where the analyzed snapshot came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoInfo {
    pub url: Option<String>,
    pub branch: Option<String>,
    pub commit: Option<String>,
}

/// Full output of `strata analyze`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub repo_info: RepoInfo,
    pub language: String,
    pub language_detection: LanguageStats,
    pub entry_points: Vec<String>,
    pub stats: BuildStats,
    pub ccg: CcgExport,
}

/// A built graph plus what was learned on the way.
pub struct Analysis {
    pub language: String,
    pub language_detection: LanguageStats,
    pub entry_points: Vec<String>,
    pub stats: BuildStats,
    pub ccg: CodeContextGraph,
}

/// Crawl once, detect, locate entry points and build the graph.
///
/// `language` overrides the detected primary language. `entry_points` are
/// merged ahead of the detected ones.
pub fn analyze(
    builder: &GraphBuilder,
    root: &Path,
    language: Option<String>,
    mut entry_points: Vec<String>,
) -> Result<Analysis> {
    let crawl = builder
        .crawl(root)
        .with_context(|| format!("Failed to crawl {}", root.display()))?;
    let language_detection = crawl.language_stats();

    let Some(language) = language.or_else(|| language_detection.primary_language.clone()) else {
        bail!("No recognizable source files under {}", root.display());
    };

    for detected in locate_entry_points(&crawl, &language) {
        if !entry_points.contains(&detected) {
            entry_points.push(detected);
        }
    }

    let (ccg, stats) = builder.build_crawl(&crawl, &language, &entry_points)?;

    Ok(Analysis {
        language,
        language_detection,
        entry_points,
        stats,
        ccg,
    })
}

impl AnalysisReport {
    pub fn new(repo_info: RepoInfo, analysis: Analysis) -> Self {
        Self {
            repo_info,
            ccg: analysis.ccg.export(),
            language: analysis.language,
            language_detection: analysis.language_detection,
            entry_points: analysis.entry_points,
            stats: analysis.stats,
        }
    }
}

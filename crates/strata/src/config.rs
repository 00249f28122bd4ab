//! Configuration file support for Strata.
//!
//! Strata data lives in a `.strata/` directory:
//! - `.strata/config.toml` - Configuration file
//! - `.strata/logs/` - Log files, when `[logging] directory` points there
//!
//! Config discovery searches for `.strata/config.toml` starting from the current
//! directory and walking up to parent directories.

use std::path::{Path, PathBuf};

/// The strata data directory name.
pub const STRATA_DIR: &str = ".strata";
/// The config file name within the strata directory.
pub const CONFIG_FILE: &str = "config.toml";

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use strata_graph::crawler::DEFAULT_IGNORE_PATTERNS;
use strata_graph::classifier::known_languages;
use strata_graph::{BuildOptions, CrawlConfig, ParserOptions};

/// Main configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Crawl settings.
    pub crawl: CrawlSection,
    /// Analysis settings.
    pub analysis: AnalysisSection,
    /// Logging settings.
    pub logging: LoggingSection,
}

/// Crawl configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CrawlSection {
    /// Ignore patterns (literal names or `*.ext` suffixes).
    pub ignore: Vec<String>,
    /// Files above this size (bytes) are never classified.
    pub max_file_size: u64,
    /// Also honour the repository's `.gitignore`.
    pub use_gitignore: bool,
}

impl Default for CrawlSection {
    fn default() -> Self {
        let defaults = CrawlConfig::default();
        Self {
            ignore: defaults.ignore_patterns,
            max_file_size: defaults.max_file_size,
            use_gitignore: defaults.use_gitignore,
        }
    }
}

/// Analysis configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AnalysisSection {
    /// Worker threads; 0 uses every available core.
    pub threads: usize,
    /// Use the pattern strategy for files with syntax errors.
    pub fallback_on_syntax_error: bool,
    /// Analyze this language instead of the detected primary one.
    pub language: Option<String>,
}

impl Default for AnalysisSection {
    fn default() -> Self {
        Self {
            threads: 0,
            fallback_on_syntax_error: ParserOptions::default().fallback_on_syntax_error,
            language: None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Write daily-rotated log files here instead of stderr.
    pub directory: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Find and load configuration from current or parent directories.
    pub fn find_and_load() -> Result<Option<(Self, PathBuf)>> {
        let current = std::env::current_dir()?;
        Self::find_and_load_from(&current)
    }

    /// Find and load configuration starting from a specific directory.
    ///
    /// Looks for `.strata/config.toml` in the directory and its parents.
    /// Returns the `.strata` directory alongside the config.
    pub fn find_and_load_from(start: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut dir = start.to_path_buf();

        loop {
            let strata_dir = dir.join(STRATA_DIR);
            let config_path = strata_dir.join(CONFIG_FILE);
            if config_path.exists() {
                let config = Self::from_file(&config_path)?;
                return Ok(Some((config, strata_dir)));
            }

            if !dir.pop() {
                break;
            }
        }

        Ok(None)
    }

    /// Resolve the log directory relative to the .strata directory.
    pub fn resolve_log_dir(&self, strata_dir: Option<&Path>) -> Option<PathBuf> {
        let directory = self.logging.directory.as_ref()?;
        if directory.is_absolute() {
            Some(directory.clone())
        } else if let Some(dir) = strata_dir {
            Some(dir.join(directory))
        } else {
            Some(PathBuf::from(STRATA_DIR).join(directory))
        }
    }

    /// Get the config file path for a given .strata directory.
    pub fn config_path(strata_dir: &Path) -> PathBuf {
        strata_dir.join(CONFIG_FILE)
    }

    /// Builder options derived from this configuration.
    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            threads: self.analysis.threads,
            crawl: CrawlConfig {
                ignore_patterns: self.crawl.ignore.clone(),
                max_file_size: self.crawl.max_file_size,
                use_gitignore: self.crawl.use_gitignore,
            },
            parser: ParserOptions {
                fallback_on_syntax_error: self.analysis.fallback_on_syntax_error,
            },
        }
    }

    /// The default configuration as commented TOML, for `strata init`.
    pub fn default_toml() -> String {
        let ignore = DEFAULT_IGNORE_PATTERNS
            .iter()
            .map(|p| format!("    \"{}\",", p))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"# Strata configuration

[crawl]
# Entries whose name matches are skipped (literal names or "*.ext")
ignore = [
{ignore}
]
max_file_size = {max}
use_gitignore = false

[analysis]
# 0 = one worker per available core
threads = 0
fallback_on_syntax_error = true
# language = "python"

[logging]
# directory = "logs"
"#,
            max = strata_graph::classifier::MAX_FILE_SIZE,
        )
    }
}

/// Configuration validation error.
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigValidationError {}

impl Config {
    /// Validate the configuration.
    ///
    /// Returns a list of validation errors if any are found.
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();

        if self.crawl.ignore.iter().any(|p| p.trim().is_empty()) {
            errors.push(ConfigValidationError {
                field: "crawl.ignore".to_string(),
                message: "Ignore patterns cannot be empty.".to_string(),
            });
        }

        if self.crawl.max_file_size == 0 {
            errors.push(ConfigValidationError {
                field: "crawl.max_file_size".to_string(),
                message: "Maximum file size must be greater than zero.".to_string(),
            });
        }

        if let Some(language) = &self.analysis.language {
            let supported = known_languages();
            if !supported.contains(&language.as_str()) {
                errors.push(ConfigValidationError {
                    field: "analysis.language".to_string(),
                    message: format!(
                        "Unknown language '{}'. Expected one of: {}.",
                        language,
                        supported.join(", ")
                    ),
                });
            }
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.analysis.threads, 0);
        assert!(config.analysis.fallback_on_syntax_error);
        assert!(config.analysis.language.is_none());
        assert!(config.crawl.ignore.contains(&"node_modules".to_string()));
        assert!(!config.crawl.use_gitignore);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_parse_minimal_config() {
        let toml = r#"
[analysis]
threads = 4
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.analysis.threads, 4);
        // Defaults should still apply
        assert!(config.crawl.ignore.contains(&".git".to_string()));
        assert!(config.analysis.fallback_on_syntax_error);
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[crawl]
ignore = ["target", "*.log"]
max_file_size = 2048
use_gitignore = true

[analysis]
threads = 2
fallback_on_syntax_error = false
language = "go"

[logging]
directory = "logs"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.crawl.ignore, vec!["target", "*.log"]);
        assert_eq!(config.crawl.max_file_size, 2048);
        assert_eq!(config.analysis.language.as_deref(), Some("go"));

        let options = config.build_options();
        assert_eq!(options.threads, 2);
        assert!(options.crawl.use_gitignore);
        assert!(!options.parser.fallback_on_syntax_error);
    }

    #[test]
    fn test_default_toml_round_trips() {
        let config: Config = toml::from_str(&Config::default_toml()).unwrap();
        assert_eq!(config.crawl.ignore, Config::default().crawl.ignore);
        assert_eq!(config.crawl.max_file_size, Config::default().crawl.max_file_size);
    }

    #[test]
    fn test_resolve_log_dir() {
        let mut config = Config::default();
        assert!(config.resolve_log_dir(None).is_none());

        config.logging.directory = Some(PathBuf::from("logs"));
        let strata_dir = PathBuf::from("/project/.strata");
        assert_eq!(
            config.resolve_log_dir(Some(&strata_dir)),
            Some(PathBuf::from("/project/.strata/logs"))
        );
    }

    #[test]
    fn test_find_and_load_walks_up() {
        let temp_dir = TempDir::new().unwrap();
        let strata_dir = temp_dir.path().join(STRATA_DIR);
        std::fs::create_dir_all(&strata_dir).unwrap();
        std::fs::write(strata_dir.join(CONFIG_FILE), "[analysis]\nthreads = 3\n").unwrap();
        let nested = temp_dir.path().join("src/deep");
        std::fs::create_dir_all(&nested).unwrap();

        let (config, found) = Config::find_and_load_from(&nested).unwrap().unwrap();
        assert_eq!(config.analysis.threads, 3);
        assert_eq!(found, strata_dir);
    }

    #[test]
    fn test_validate_unknown_language() {
        let mut config = Config::default();
        config.analysis.language = Some("cobol".to_string());

        let errors = config.validate();
        assert!(errors.iter().any(|e| e.field == "analysis.language"));
    }

    #[test]
    fn test_validate_accepts_classifier_languages() {
        let mut config = Config::default();
        for language in ["jac", "ruby", "go", "python"] {
            config.analysis.language = Some(language.to_string());
            assert!(config.validate().is_empty(), "{language} rejected");
        }
    }

    #[test]
    fn test_validate_empty_pattern() {
        let mut config = Config::default();
        config.crawl.ignore.push("  ".to_string());

        let errors = config.validate();
        assert!(errors.iter().any(|e| e.field == "crawl.ignore"));
    }
}

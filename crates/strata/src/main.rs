//! strata: Structural model builder for source repositories
//!
//! Strata crawls a repository, detects its languages and entry points, and
//! assembles a Code Context Graph of its declarations and their
//! relationships. Every command prints JSON on stdout; logs go to stderr or
//! to rotating files.

mod config;
mod report;

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use config::Config;
use report::{AnalysisReport, RepoInfo};
use strata_graph::GraphBuilder;
use strata_graph::classifier::display_name;

/// Structural model builder for arbitrary source repositories
#[derive(Parser)]
#[command(name = "strata")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to .strata directory or config file (default: search for .strata/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the language-detection summary of a repository
    Detect {
        /// Repository root
        path: PathBuf,
    },

    /// Print the file tree, languages, entry points and README summary
    Map {
        /// Repository root
        path: PathBuf,
    },

    /// Build the Code Context Graph and print the analysis report
    Analyze {
        /// Repository root
        path: PathBuf,

        /// Analyze this language instead of the detected primary one
        #[arg(long)]
        language: Option<String>,

        /// Entry-point file merged first (repeatable)
        #[arg(long = "entry-point")]
        entry_points: Vec<String>,

        /// Worker threads (0 = available cores)
        #[arg(long)]
        threads: Option<usize>,

        /// Write the report here instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Repository URL recorded in the report
        #[arg(long)]
        repo_url: Option<String>,

        /// Branch recorded in the report
        #[arg(long)]
        branch: Option<String>,

        /// Commit recorded in the report
        #[arg(long)]
        commit: Option<String>,
    },

    /// Analyze a repository and run a free-text query against its graph
    Query {
        /// Repository root
        path: PathBuf,

        /// Query text, e.g. "show me all calls"
        text: String,

        /// Analyze this language instead of the detected primary one
        #[arg(long)]
        language: Option<String>,
    },

    /// Initialize a new .strata directory with config file
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },
}

fn env_filter(verbose: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Initialize logging to stderr so stdout carries only JSON.
fn init_logging(verbose: bool) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter(verbose))
        .init();
}

/// Initialize logging to rotating files in `logs_dir` with daily rotation.
fn init_file_logging(logs_dir: &Path, verbose: bool) {
    if let Err(e) = std::fs::create_dir_all(logs_dir) {
        eprintln!("Warning: Failed to create logs directory: {}", e);
        init_logging(verbose);
        return;
    }

    let file_appender = RollingFileAppender::new(Rotation::DAILY, logs_dir, "strata.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Dropping the guard stops the writer thread
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .with(env_filter(verbose))
        .init();
}

/// Load config from override path or by searching parent directories.
///
/// Returns the config and the path to the `.strata` directory.
fn load_config(override_path: Option<&PathBuf>) -> Result<(Config, Option<PathBuf>)> {
    if let Some(path) = override_path {
        let config_file = if path.is_dir() {
            Config::config_path(path)
        } else {
            path.clone()
        };
        let strata_dir = config_file.parent().map(Path::to_path_buf);
        let config = Config::from_file(&config_file)?;
        return Ok((config, strata_dir));
    }

    match Config::find_and_load()? {
        Some((config, strata_dir)) => Ok((config, Some(strata_dir))),
        None => Ok((Config::default(), None)),
    }
}

/// Serialize `value` as pretty JSON to `output` or stdout.
fn emit<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{}", json)?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut config, config_dir) = load_config(cli.config.as_ref())?;

    match config.resolve_log_dir(config_dir.as_deref()) {
        Some(logs_dir) => init_file_logging(&logs_dir, cli.verbose),
        None => init_logging(cli.verbose),
    }
    if let Some(dir) = &config_dir {
        info!("Using config from {}", dir.display());
    }

    let errors = config.validate();
    if !errors.is_empty() {
        for error in &errors {
            tracing::error!("Invalid configuration: {}", error);
        }
        anyhow::bail!("Configuration has {} error(s)", errors.len());
    }

    match cli.command {
        Commands::Detect { path } => {
            let builder = GraphBuilder::new(config.build_options());
            let stats = builder.detect_languages(&path)?;
            if let Some(primary) = &stats.primary_language {
                info!(
                    "Primary language: {} ({:.0}% of {} files)",
                    display_name(primary),
                    stats.confidence * 100.0,
                    stats.total_files
                );
            }
            emit(&stats, None)?;
        }

        Commands::Map { path } => {
            let builder = GraphBuilder::new(config.build_options());
            let map = builder.map_repository(&path)?;
            emit(&map, None)?;
        }

        Commands::Analyze {
            path,
            language,
            entry_points,
            threads,
            output,
            repo_url,
            branch,
            commit,
        } => {
            if let Some(threads) = threads {
                config.analysis.threads = threads;
            }
            let builder = GraphBuilder::new(config.build_options());
            let language = language.or(config.analysis.language.clone());
            let analysis = report::analyze(&builder, &path, language, entry_points)?;
            info!(
                "Analyzed {} as {}: {} elements, {} relationships",
                path.display(),
                display_name(&analysis.language),
                analysis.stats.elements,
                analysis.stats.relationships
            );

            let repo_info = RepoInfo {
                url: repo_url,
                branch,
                commit,
            };
            emit(&AnalysisReport::new(repo_info, analysis), output.as_deref())?;
        }

        Commands::Query {
            path,
            text,
            language,
        } => {
            let builder = GraphBuilder::new(config.build_options());
            let language = language.or(config.analysis.language.clone());
            let analysis = report::analyze(&builder, &path, language, Vec::new())?;
            let matches = analysis.ccg.query(&text);
            info!("{} relationships match {:?}", matches.len(), text);
            emit(&matches, None)?;
        }

        Commands::Init { force } => {
            use config::{CONFIG_FILE, STRATA_DIR};

            let strata_dir = PathBuf::from(STRATA_DIR);
            let config_path = strata_dir.join(CONFIG_FILE);

            if config_path.exists() && !force {
                anyhow::bail!(".strata/config.toml already exists. Use --force to overwrite.");
            }

            if !strata_dir.exists() {
                std::fs::create_dir_all(&strata_dir)
                    .with_context(|| format!("Failed to create {}", strata_dir.display()))?;
                info!("Created {}/", strata_dir.display());
            }

            std::fs::write(&config_path, Config::default_toml())
                .with_context(|| format!("Failed to write {}", config_path.display()))?;
            info!("Created {}", config_path.display());
            info!("Next steps:");
            info!("  1. Edit .strata/config.toml to tune crawling and analysis");
            info!("  2. Run 'strata map .' for a repository overview");
            info!("  3. Run 'strata analyze .' to build the code context graph");
        }
    }

    Ok(())
}

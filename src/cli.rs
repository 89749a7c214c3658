//! Command-line interface parsing for Sea Here
//!
//! This module handles parsing of CLI arguments using clap and turns them into
//! a validated [`StartupConfig`] before anything touches the network or disk.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use thiserror::Error;
use url::Url;

use crate::backoff::BackoffPolicy;
use crate::data::client::DEFAULT_API_BASE_URL;
use crate::store::FileStore;

/// Default cap on cache entries kept after each command
pub const DEFAULT_MAX_ENTRIES: usize = 200;

/// Error types for CLI argument validation
#[derive(Debug, Error)]
pub enum CliError {
    /// The API base URL did not parse or cannot have paths joined onto it
    #[error("Invalid API base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    /// `--max-entries 0` would evict everything after every command
    #[error("--max-entries must be at least 1")]
    ZeroMaxEntries,

    /// No `--cache-dir` was given and the platform has no cache directory
    #[error("Could not determine a cache directory; pass --cache-dir")]
    NoCacheDir,
}

/// Sea Here - Sea creature fact cards that work offline
#[derive(Parser, Debug)]
#[command(name = "seahere")]
#[command(about = "Sea creature fact cards with an offline-first cache")]
#[command(version)]
pub struct Cli {
    /// Base URL of the species API
    #[arg(long, env = "SEAHERE_API_BASE", value_name = "URL", default_value = DEFAULT_API_BASE_URL)]
    pub api_base: String,

    /// Directory for cached responses (defaults to the platform cache dir)
    #[arg(long, env = "SEAHERE_CACHE_DIR", value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Maximum number of cache entries kept after each command
    #[arg(long, value_name = "N", default_value_t = DEFAULT_MAX_ENTRIES)]
    pub max_entries: usize,

    /// Never contact the API; serve from the cache and bundled data only
    #[arg(long)]
    pub offline: bool,

    /// Retries after a failed API request
    #[arg(long, value_name = "N")]
    pub retries: Option<u32>,

    /// Log cache and fallback decisions to stderr
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Show the fact card for a species
    Species {
        /// Species identifier, e.g. sea-otter
        id: String,
    },
    /// Search species by name, habitat, diet, or temperament
    Search {
        /// Words to search for
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },
    /// Show the population series for a species
    Population {
        /// Species identifier
        id: String,
    },
    /// List the species bundled with the app
    List,
    /// Prefetch every bundled species into the cache
    Warm,
    /// Inspect or maintain the response cache
    Cache {
        #[command(subcommand)]
        action: CacheCommand,
    },
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheCommand {
    /// Show entry counts
    Stats,
    /// Remove every cached entry
    Clear,
    /// Drop expired entries and evict least recently used ones
    Evict {
        /// Entries to keep (defaults to --max-entries)
        #[arg(long, value_name = "N")]
        max: Option<usize>,
    },
}

impl Command {
    /// Joins the words of a search query
    pub fn search_query(words: &[String]) -> String {
        words.join(" ")
    }
}

/// Configuration derived from CLI arguments for application startup
#[derive(Debug, Clone)]
pub struct StartupConfig {
    /// API base URL, always ending in '/'
    pub api_base: Url,
    /// Directory backing the file store
    pub cache_dir: PathBuf,
    /// Eviction limit applied after each command
    pub max_entries: usize,
    /// Retry policy for API calls
    pub backoff: BackoffPolicy,
    /// Whether to skip the network entirely
    pub offline: bool,
    /// Whether debug logging was requested
    pub verbose: bool,
    /// The command to run
    pub command: Command,
}

/// Parses an API base URL, normalising it to end with '/'
///
/// Without the trailing slash, joining `api/species/x` would replace the last
/// path segment of the base instead of appending to it.
pub fn parse_api_base(raw: &str) -> Result<Url, CliError> {
    let invalid = |reason: String| CliError::InvalidBaseUrl {
        url: raw.to_string(),
        reason,
    };

    let mut url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.cannot_be_a_base() {
        return Err(invalid("cannot be used as a base".to_string()));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Tracing filter directive for the requested verbosity
pub fn log_filter(verbose: bool) -> &'static str {
    if verbose {
        "seahere=debug"
    } else {
        "seahere=warn"
    }
}

impl StartupConfig {
    /// Creates a StartupConfig from parsed CLI arguments.
    ///
    /// # Returns
    /// * `Ok(StartupConfig)` with validated settings
    /// * `Err(CliError)` if the base URL, entry limit, or cache dir is unusable
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let api_base = parse_api_base(&cli.api_base)?;

        if cli.max_entries == 0 {
            return Err(CliError::ZeroMaxEntries);
        }

        let cache_dir = match &cli.cache_dir {
            Some(dir) => dir.clone(),
            None => FileStore::new().ok_or(CliError::NoCacheDir)?.dir().clone(),
        };

        let mut backoff = BackoffPolicy::default();
        if let Some(retries) = cli.retries {
            backoff.max_retries = retries;
        }

        Ok(StartupConfig {
            api_base,
            cache_dir,
            max_entries: cli.max_entries,
            backoff,
            offline: cli.offline,
            verbose: cli.verbose,
            command: cli.command.clone(),
        })
    }

    /// Total time the retry policy may spend sleeping for one request
    pub fn worst_case_retry_wait(&self) -> Duration {
        (0..self.backoff.max_retries)
            .map(|attempt| self.backoff.delay_for(attempt))
            .sum()
    }
}

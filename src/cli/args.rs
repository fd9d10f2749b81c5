//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Dockyard - container image builds that skip what hasn't changed
///
/// Builds the artifacts declared in dockyard.toml, reusing previously
/// built images when their inputs are unchanged.
#[derive(Parser, Debug)]
#[command(name = "dockyard")]
#[command(author, version, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "DOCKYARD_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build artifacts, skipping unchanged ones
    Build(BuildArgs),

    /// Inspect or clear the artifact cache
    Cache(CacheArgs),

    /// Show or edit configuration
    Config(ConfigArgs),
}

/// Arguments for the build command
#[derive(Parser, Debug)]
pub struct BuildArgs {
    /// Artifacts to build (defaults to every artifact in dockyard.toml)
    pub images: Vec<String>,

    /// Rebuild everything without consulting the cache
    #[arg(long)]
    pub no_cache: bool,

    /// Cache file to use instead of the configured one
    #[arg(long)]
    pub cache_file: Option<PathBuf>,

    /// Push built images and confirm cache hits against the registry
    #[arg(long)]
    pub push: bool,

    /// Registry reachable over plain HTTP or with an untrusted certificate
    #[arg(long = "insecure-registry")]
    pub insecure_registries: Vec<String>,

    /// Tag applied to every built image (default: from config)
    #[arg(short, long)]
    pub tag: Option<String>,

    /// Project directory (defaults to current directory)
    #[arg(short, long)]
    pub project: Option<PathBuf>,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., cache.enabled)
        key: String,
        /// Value to set
        value: String,
    },
}

/// Output format for listings
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Subcommand for cache
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// List cached artifacts
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Remove cache entries
    Clear {
        /// Only forget these artifacts (defaults to all)
        images: Vec<String>,

        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Show cache file path
    Path,
}

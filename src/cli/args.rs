//! CLI argument definitions using clap derive

use crate::integrity::DigestScheme;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

/// Default manifest file name
pub const DEFAULT_MANIFEST: &str = "manifest.json";

/// Sticky - verified offline cache with pinned worker updates
///
/// Serves a static site only from content that matches its build
/// manifest, and pins the worker script so it cannot change silently.
#[derive(Parser, Debug)]
#[command(name = "sticky")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "STICKY_CONFIG")]
    pub config: Option<PathBuf>,

    /// State directory (pins, caches, worker record, audit log)
    #[arg(long, global = true, env = "STICKY_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value = "text")]
    pub log_format: LogFormat,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build or inspect deployment manifests
    Manifest(ManifestArgs),

    /// Show which manifest entry serves a request path
    Resolve(ResolveArgs),

    /// Fetch and verify every manifest entry into a new cache generation
    Precache(PrecacheArgs),

    /// Fetch one URL through the verifying cache
    Get(GetArgs),

    /// Register the worker script, pinning its version on first run
    Register(RegisterArgs),

    /// Check for and apply a newer worker script
    Update(UpdateArgs),

    /// Show pinned versions, the active worker and cache generations
    Status(StatusArgs),

    /// Clear persisted state (the only way out of brick mode)
    Reset(ResetArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Digest scheme selectable on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SchemeArg {
    /// `sha256-<base64>` transport integrity tokens
    Transport,
    /// Hex SHA-256 content hashes
    Content,
}

impl From<SchemeArg> for DigestScheme {
    fn from(arg: SchemeArg) -> Self {
        match arg {
            SchemeArg::Transport => DigestScheme::TransportIntegrity,
            SchemeArg::Content => DigestScheme::ContentHash,
        }
    }
}

/// Arguments for the manifest command
#[derive(Parser, Debug)]
pub struct ManifestArgs {
    #[command(subcommand)]
    pub action: ManifestAction,
}

/// Manifest subcommands
#[derive(Subcommand, Debug)]
pub enum ManifestAction {
    /// Hash every file under a build directory
    Build {
        /// Build output directory
        dir: PathBuf,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Digest scheme (defaults to proxy.digest_scheme)
        #[arg(long, value_enum)]
        scheme: Option<SchemeArg>,
    },
}

/// Arguments for the resolve command
#[derive(Parser, Debug)]
pub struct ResolveArgs {
    /// Request path (e.g., /about/)
    pub path: String,

    /// Manifest file
    #[arg(short, long, default_value = DEFAULT_MANIFEST)]
    pub manifest: PathBuf,

    /// List every matching entry, not just the winner
    #[arg(short, long)]
    pub all: bool,
}

/// Arguments for the precache command
#[derive(Parser, Debug)]
pub struct PrecacheArgs {
    /// Origin the manifest was deployed to (e.g., https://example.com)
    pub origin: String,

    /// Manifest file
    #[arg(short, long, default_value = DEFAULT_MANIFEST)]
    pub manifest: PathBuf,

    /// Keep older generations instead of deleting them
    #[arg(long)]
    pub keep_stale: bool,
}

/// Arguments for the get command
#[derive(Parser, Debug)]
pub struct GetArgs {
    /// Absolute URL to fetch
    pub url: String,

    /// Manifest file
    #[arg(short, long, default_value = DEFAULT_MANIFEST)]
    pub manifest: PathBuf,

    /// Skip the cache and re-verify from the origin
    #[arg(long)]
    pub reload: bool,

    /// Write the body to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments for the register command
#[derive(Parser, Debug)]
pub struct RegisterArgs {
    /// Canonical worker script URL (e.g., https://example.com/sw.js)
    pub script: String,

    /// Skip the post-registration update check
    #[arg(long)]
    pub no_update_check: bool,
}

/// Arguments for the update command
#[derive(Parser, Debug)]
pub struct UpdateArgs {
    /// Canonical worker script URL
    pub script: String,

    /// Only report whether an update is available
    #[arg(long)]
    pub check: bool,

    /// Apply without prompting
    #[arg(short, long)]
    pub yes: bool,
}

/// Arguments for the status command
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the reset command
#[derive(Parser, Debug)]
pub struct ResetArgs {
    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Also delete every cache generation
    #[arg(long)]
    pub caches: bool,
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

    /// Write the default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Arguments for the completions command
#[derive(Parser, Debug)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Output format for status
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
}

//! Clap derive structures for the `tedly` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// tedly -- bridge tedee smart locks into a home automation host
#[derive(Debug, Parser)]
#[command(
    name = "tedly",
    version,
    about = "Bridge tedee smart locks into a home automation host",
    long_about = "Syncs tedee smart locks from the tedee cloud, exposes each one as a lock\n\
        (plus an optional latch) with battery status, and turns target changes\n\
        into open / close / pull-spring commands.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Path to the config file (defaults to the platform config dir)
    #[arg(long, short = 'c', env = "TEDLY_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "TEDLY_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Log line format
    #[arg(long, env = "TEDLY_LOG_FORMAT", default_value = "text", global = true)]
    pub log_format: LogFormat,
}

// ── Enums ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one name per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per line
    Json,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the bridge: sync in the background and log every state change
    Run,

    /// List the locks in the tedee account
    #[command(alias = "ls")]
    Locks,

    /// Show the exposed state of the configured locks
    Status,

    /// Unlock a lock
    #[command(alias = "unlock")]
    Open(LockArgs),

    /// Lock a lock
    #[command(alias = "lock")]
    Close(LockArgs),

    /// Pull the spring of a lock
    #[command(alias = "pull-spring")]
    Unlatch(LockArgs),

    /// Inspect and manage configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct LockArgs {
    /// Lock name as shown in the tedee app
    pub name: String,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration (password masked)
    Show,

    /// Print the config file location
    Path,

    /// Store the account password in the system keyring
    SetPassword,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: clap_complete::Shell,
}

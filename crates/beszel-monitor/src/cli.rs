//! Clap derive structures for the `beszel-monitor` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// beszel-monitor -- poll a Beszel hub and print system and container metrics
#[derive(Debug, Parser)]
#[command(
    name = "beszel-monitor",
    version,
    about = "Poll a Beszel monitoring hub from the command line",
    long_about = "Authenticates against a Beszel hub (PocketBase), polls the systems\n\
        and Docker container stats it tracks, and prints them as typed\n\
        gauge and on/off entities.",
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
    /// Hub profile to use
    #[arg(long, short = 'p', env = "BESZEL_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Config file path (overrides the platform default)
    #[arg(long, env = "BESZEL_CONFIG", global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Hub host name or IP (overrides profile)
    #[arg(long, short = 'H', env = "BESZEL_HOST", global = true)]
    pub host: Option<String>,

    /// Hub port (overrides profile)
    #[arg(long, env = "BESZEL_PORT", global = true)]
    pub port: Option<u16>,

    /// Login identity (overrides profile)
    #[arg(long, short = 'u', env = "BESZEL_USERNAME", global = true)]
    pub username: Option<String>,

    /// Connect over HTTPS
    #[arg(long, global = true)]
    pub ssl: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "BESZEL_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds
    #[arg(long, env = "BESZEL_TIMEOUT", global = true)]
    pub timeout: Option<u64>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "BESZEL_OUTPUT",
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
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Verify credentials and that the systems collection is readable
    Check,

    /// Run one poll cycle and print the resulting entities
    Poll(PollArgs),

    /// Poll continuously, printing entity changes until Ctrl-C
    Watch(WatchArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),
}

// ── Poll / Watch ─────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct PollArgs {
    /// Skip Docker container stats
    #[arg(long)]
    pub no_docker: bool,

    /// What to print
    #[arg(long, default_value = "entities")]
    pub view: PollView,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PollView {
    /// Flat gauge and on/off entities
    Entities,
    /// One row per system
    Systems,
    /// One row per Docker container
    Containers,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Poll interval (e.g. "30s", "2m"); overrides the profile
    #[arg(long, short = 'i', value_parser = humantime::parse_duration)]
    pub interval: Option<std::time::Duration>,

    /// Skip Docker container stats
    #[arg(long)]
    pub no_docker: bool,

    /// Print every entity after each successful cycle, not only changes
    #[arg(long)]
    pub full: bool,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create initial config file with guided setup
    Init,

    /// Display current configuration (secrets masked)
    Show,

    /// Print the config file path
    Path,

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Store a profile's password in the system keyring
    SetPassword {
        /// Profile name
        #[arg(long)]
        profile: Option<String>,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from([
            "beszel-monitor",
            "poll",
            "--host",
            "10.0.0.2",
            "--port",
            "9090",
            "-o",
            "json",
            "--view",
            "systems",
        ])
        .unwrap();
        assert_eq!(cli.global.host.as_deref(), Some("10.0.0.2"));
        assert_eq!(cli.global.port, Some(9090));
        assert_eq!(cli.global.output, OutputFormat::Json);
        match cli.command {
            Command::Poll(args) => assert_eq!(args.view, PollView::Systems),
            other => panic!("expected poll, got {other:?}"),
        }
    }

    #[test]
    fn watch_interval_accepts_humantime() {
        let cli = Cli::try_parse_from(["beszel-monitor", "watch", "--interval", "1m 30s"]).unwrap();
        match cli.command {
            Command::Watch(args) => {
                assert_eq!(args.interval, Some(std::time::Duration::from_secs(90)));
            }
            other => panic!("expected watch, got {other:?}"),
        }
    }
}

//! Command-line interface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// pinsync - keeps a storage daemon's pin set in sync with the node's
/// published profile
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Logging configuration (applies to all subcommands).
    #[command(flatten)]
    pub logs: LogArgs,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Logging configuration.
#[derive(Debug, Args, Clone)]
#[command(next_help_heading = "Logging")]
pub struct LogArgs {
    /// Silence all output.
    #[arg(short, long)]
    pub quiet: bool,

    /// Verbose mode (-v, -vv, -vvv, etc.).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Log filter directive (e.g. "pinsync=debug,reqwest=warn").
    #[arg(long = "log.filter", value_name = "DIRECTIVE")]
    pub filter: Option<String>,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the reconciliation daemon.
    Run(RunArgs),

    /// Print the current quarantine report.
    Report(ReportArgs),
}

/// Arguments for the 'run' command.
///
/// Every flag is optional; unset flags fall back to the config file and
/// then to built-in defaults.
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Path to a TOML config file.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Storage daemon configuration.
    #[command(flatten)]
    pub daemon: DaemonArgs,

    /// Ledger configuration.
    #[command(flatten)]
    pub ledger: LedgerArgs,

    /// Reconciliation configuration.
    #[command(flatten)]
    pub sync: SyncArgs,
}

/// Local storage-daemon connection.
#[derive(Debug, Args, Clone)]
#[command(next_help_heading = "Daemon")]
pub struct DaemonArgs {
    /// Base URL of the daemon RPC API.
    #[arg(
        long = "daemon.api-url",
        env = "PINSYNC_DAEMON_API_URL",
        value_name = "URL"
    )]
    pub api_url: Option<String>,
}

/// Ledger gateway connection.
#[derive(Debug, Args, Clone)]
#[command(next_help_heading = "Ledger")]
pub struct LedgerArgs {
    /// Base URL of the ledger gateway.
    #[arg(
        long = "ledger.gateway-url",
        env = "PINSYNC_LEDGER_GATEWAY_URL",
        value_name = "URL"
    )]
    pub gateway_url: Option<String>,

    /// This node's identity as registered on the ledger.
    #[arg(
        long = "ledger.node-id",
        env = "PINSYNC_LEDGER_NODE_ID",
        value_name = "ID"
    )]
    pub node_id: Option<String>,
}

/// Reconciliation policy.
#[derive(Debug, Args, Clone)]
#[command(next_help_heading = "Sync")]
pub struct SyncArgs {
    /// Seconds between reconciliation cycles.
    #[arg(long = "sync.interval", value_name = "SECONDS")]
    pub interval_secs: Option<u64>,

    /// Failed pin attempts before a CID is quarantined.
    #[arg(long = "sync.max-retries", value_name = "COUNT")]
    pub max_pin_retries: Option<u32>,

    /// Trigger daemon garbage collection every N cycles (0 disables).
    #[arg(long = "sync.gc-interval", value_name = "CYCLES")]
    pub gc_interval_cycles: Option<u64>,

    /// Bound on concurrent pin/unpin calls within one cycle.
    #[arg(long = "sync.concurrency", value_name = "N")]
    pub max_concurrent_ops: Option<usize>,

    /// Re-probe quarantined CIDs every N cycles (unset never re-probes).
    #[arg(long = "sync.probe-quarantined", value_name = "CYCLES")]
    pub probe_quarantined_after_cycles: Option<u64>,

    /// Data directory for the pin-state database.
    #[arg(long = "sync.datadir", value_name = "PATH")]
    pub data_dir: Option<PathBuf>,

    /// Path of the quarantine report artifact.
    #[arg(long = "sync.report", value_name = "FILE")]
    pub report_path: Option<PathBuf>,
}

/// Arguments for the 'report' command.
#[derive(Debug, Args)]
pub struct ReportArgs {
    /// Path to a TOML config file.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Path of the quarantine report artifact.
    #[arg(long = "sync.report", value_name = "FILE")]
    pub report_path: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_flags_parse() {
        let cli = Cli::parse_from([
            "pinsync",
            "-vv",
            "run",
            "--daemon.api-url",
            "http://127.0.0.1:5001",
            "--ledger.node-id",
            "node-7",
            "--sync.interval",
            "30",
        ]);
        assert_eq!(cli.logs.verbosity, 2);
        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.daemon.api_url.as_deref(), Some("http://127.0.0.1:5001"));
        assert_eq!(args.ledger.node_id.as_deref(), Some("node-7"));
        assert_eq!(args.sync.interval_secs, Some(30));
        assert_eq!(args.sync.max_pin_retries, None);
    }
}

use crate::types::{CheckOutcome, CheckType};
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "edgecheck",
    about = "terminal dashboard for edge system health checks with live push updates",
    version
)]
pub struct Args {
    /// Origin of the checker backend (scheme, host and port)
    #[arg(
        short,
        long,
        global = true,
        env = "EDGECHECK_SERVER",
        default_value = "http://localhost:8000"
    )]
    pub server: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Enable metrics server
    #[arg(long, global = true)]
    pub metrics: bool,

    /// Metrics server port
    #[arg(long, global = true, default_value = "9090")]
    pub metrics_port: u16,

    /// Delay between a dropped push connection and the next attempt, in milliseconds
    #[arg(long, global = true, default_value = "3000")]
    pub reconnect_delay_ms: u64,

    /// REST request timeout in seconds
    #[arg(long, global = true, default_value = "30")]
    pub api_timeout: u64,

    /// Check status polling interval in seconds while watching
    #[arg(long, global = true, default_value = "2")]
    pub status_interval: u64,

    /// Output format: table, json, minimal
    #[arg(long, global = true, default_value = "table")]
    pub format: String,

    /// Disable colored output (useful for piping to files)
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Quiet mode - only results and errors
    #[arg(long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Stream live check progress until Ctrl+C (default)
    Watch,

    /// Start a check run and follow it until the aggregate result arrives
    Run {
        /// Check to run; repeat for several, omit to run all
        #[arg(short, long = "check", value_enum)]
        checks: Vec<CheckType>,

        /// Number of cameras to probe
        #[arg(long, default_value = "4")]
        camera_count: u32,

        /// Disable automatic mode (the backend will not skip interactive checks)
        #[arg(long)]
        manual: bool,
    },

    /// Show whether a check run is in progress
    Status,

    /// List past check runs
    History {
        #[arg(long, default_value = "1", value_parser = clap::value_parser!(u32).range(1..))]
        page: u32,

        #[arg(long, default_value = "20", value_parser = clap::value_parser!(u32).range(1..=100))]
        page_size: u32,

        /// Only runs of this check type
        #[arg(long, value_enum)]
        check_type: Option<CheckType>,

        /// Only runs with this outcome
        #[arg(long, value_enum)]
        status: Option<CheckOutcome>,
    },

    /// Show one history entry in full
    Show {
        /// History entry id
        id: i64,
    },

    /// Show the backend configuration
    Config,
}

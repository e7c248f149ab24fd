use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

use crate::messaging::MessagingMode;

/// Command-line arguments for the Cairn binary.
#[derive(Debug, Parser)]
#[command(name = "cairn", version, about = "Cairn content web tier")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "CAIRN_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the Cairn HTTP service.
    Serve(Box<ServeArgs>),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Toggle cache-refresh calls to the other servers of the farm.
    #[arg(
        long = "messaging-distributed",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub messaging_distributed: Option<bool>,

    /// Override when refresh calls are sent (per-request|immediate).
    #[arg(long = "messaging-mode", value_name = "MODE")]
    pub messaging_mode: Option<MessagingMode>,

    /// Override the published-content snapshot file.
    #[arg(long = "content-snapshot", value_name = "PATH")]
    pub content_snapshot: Option<PathBuf>,
}

pub mod commands;
pub mod config;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "proxywatch")]
#[command(about = "Monitor a streaming-proxy fleet: live updates, cache and trend analytics")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default proxywatch.toml
    Init(InitArgs),
    /// Run the monitoring core and its HTTP API
    Serve(ServeArgs),
    /// Compute fleet trends locally or fetch them from a running server
    Trends(TrendsArgs),
    /// Print live update envelopes as JSON lines
    Tail(TailArgs),
}

#[derive(clap::Args)]
pub struct InitArgs {
    /// Where to write the config file
    #[arg(long, default_value = config::CONFIG_FILENAME)]
    pub path: String,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

#[derive(clap::Args)]
pub struct ServeArgs {
    /// Live channel URL (overrides [connection] url)
    #[arg(long, env = "PROXYWATCH_URL")]
    pub url: Option<String>,

    /// Address to listen on (overrides [server] listen)
    #[arg(long, env = "PROXYWATCH_LISTEN")]
    pub listen: Option<String>,

    /// Path to config file (searched for when omitted)
    #[arg(long)]
    pub config: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,
}

#[derive(clap::Args)]
pub struct TrendsArgs {
    /// 24h, 7d, 30d, 90d or 1y
    #[arg(long, default_value = "7d")]
    pub time_range: String,

    /// hourly, daily, weekly or monthly
    #[arg(long, default_value = "daily")]
    pub granularity: String,

    /// Metric to highlight
    #[arg(long)]
    pub metric: Option<String>,

    /// Include a next-period forecast
    #[arg(long)]
    pub forecast: bool,

    /// Window start (RFC 3339 or YYYY-MM-DD)
    #[arg(long)]
    pub start_date: Option<String>,

    /// Window end (RFC 3339 or YYYY-MM-DD)
    #[arg(long)]
    pub end_date: Option<String>,

    /// Query a running proxywatch server instead of computing locally
    #[arg(long, env = "PROXYWATCH_SERVER")]
    pub url: Option<String>,
}

#[derive(clap::Args)]
pub struct TailArgs {
    /// Live channel URL (falls back to proxywatch.toml)
    #[arg(long, env = "PROXYWATCH_URL")]
    pub url: Option<String>,

    /// Stop after this many envelopes
    #[arg(long)]
    pub limit: Option<u64>,
}

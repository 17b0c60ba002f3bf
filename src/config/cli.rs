use clap::Parser;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "libprep")]
#[command(about = "Run a library-prep protocol with tip tracking and liquid level estimation")]
pub struct CliConfig {
    /// Path to the TOML protocol file
    #[arg(short, long, default_value = "protocol.toml")]
    pub config: String,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    /// Print the plan and depth schedule without running
    #[arg(long)]
    pub dry_run: bool,

    /// Acknowledge operator pauses automatically
    #[arg(long)]
    pub auto_ack: bool,

    /// Ignore stored tip counts and start with full racks
    #[arg(long)]
    pub reset_counts: bool,

    /// Override the tip count file from the configuration
    #[arg(long)]
    pub count_file: Option<String>,
}

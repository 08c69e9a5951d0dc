use std::path::PathBuf;

use clap::Parser;

/// xray-fabric: dental X-ray analysis ingress, worker pool and callback
/// dispatcher, run as a single process.
#[derive(Parser, Debug)]
#[command(name = "xray-fabric", about = "Dental X-ray analysis request/dispatch/callback fabric", long_about = None)]
pub struct Cli {
    /// Path to a TOML configuration file. Overrides `XRAY_FABRIC_CONFIG`
    /// and the `config/xray-fabric.toml` default.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

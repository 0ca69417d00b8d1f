//! CLI definitions

use clap::{Parser, Subcommand};

/// FadeStick CPU load indicator daemon
#[derive(Parser)]
#[command(name = "fadestick", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the daemon
    Start,
    /// Stop the daemon
    Stop,
    /// Kill the daemon
    Kill,
    /// Restart the daemon
    Restart,
    /// Get the daemon status
    Status,
    /// Install the udev rule granting FadeStick access (needs root)
    AddUdevRule,
}

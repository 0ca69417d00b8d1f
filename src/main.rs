//! FadeStick CPU Load Daemon CLI
//!
//! Each subcommand maps to one supervisor action and prints a one-line
//! outcome. The daemon itself is the detached child of `start`.

mod cli;

use anyhow::{bail, Result};
use clap::Parser;

use cli::{Cli, Commands};
use fadestick::daemon::{Daemon, DaemonConfig};

const UDEV_RULE_PATH: &str = "/etc/udev/rules.d/85-fadestick.rules";
const UDEV_RULE: &str =
    "SUBSYSTEM==\"usb\", ATTR{idVendor}==\"20a0\", ATTR{idProduct}==\"41e5\", MODE:=\"0666\"\n";

fn setup_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn add_udev_rule() -> Result<String> {
    if !nix::unistd::geteuid().is_root() {
        bail!("must run as root to install the udev rule: sudo fadestick add-udev-rule");
    }
    std::fs::write(UDEV_RULE_PATH, UDEV_RULE)?;
    Ok(format!(
        "Rule added to {UDEV_RULE_PATH}. Replug the device, or run \
         `udevadm control --reload-rules && udevadm trigger`."
    ))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let daemon = Daemon::new(DaemonConfig::default());
    let message = match cli.command {
        Commands::Start => daemon.start()?,
        Commands::Stop => daemon.stop()?,
        Commands::Kill => daemon.kill()?,
        Commands::Restart => daemon.restart()?,
        Commands::Status => daemon.status()?,
        Commands::AddUdevRule => add_udev_rule()?,
    };
    println!("{message}");
    Ok(())
}

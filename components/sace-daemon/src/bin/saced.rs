use std::path::PathBuf;

use clap::Parser;

use sace_daemon::{DaemonConfig, Result};

#[derive(Parser)]
#[command(name = "saced", about = "SACE broker daemon")]
struct Args {
    /// Unix socket clients connect to.
    #[arg(long, default_value = "/run/sace/sace.sock")]
    socket: PathBuf,

    /// Shell used to run every command: `<shell> -c <command>`.
    #[arg(long, default_value = "/bin/sh")]
    shell: PathBuf,

    /// Event definition file, read at startup and rewritten on every
    /// add/delete.
    #[arg(long, default_value = "/etc/sace/events.conf")]
    event_config: PathBuf,

    /// Flat `key=value` property file event triggers poll against.
    #[arg(long, default_value = "/run/sace/properties")]
    properties: PathBuf,
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    let config = DaemonConfig {
        socket_path: args.socket,
        shell_path: args.shell,
        event_config_path: Some(args.event_config),
        property_path: Some(args.properties),
    };

    sace_daemon::run(config)
}

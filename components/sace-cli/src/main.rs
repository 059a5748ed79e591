use std::fs::File;
use std::io;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use sace_client::Client;
use sace_protocol::{Direction, EventFlags};

#[derive(Parser)]
#[command(name = "sacectl", about = "Talk to the SACE broker")]
struct Cli {
    #[arg(long, default_value = "/run/sace/sace.sock")]
    socket: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a one-off command and stream its output to stdout.
    Run { name: String, command: String },
    #[command(subcommand)]
    Service(ServiceCommand),
    #[command(subcommand)]
    Event(EventCommand),
}

#[derive(Subcommand)]
enum ServiceCommand {
    Start { name: String, command: String },
    Stop { name: String, label: u64 },
    Pause { name: String, label: u64 },
    Restart { name: String, label: u64 },
    Info { name: String },
}

#[derive(Subcommand)]
enum EventCommand {
    Add {
        name: String,
        command: String,
        #[arg(long)]
        restart_on_fail: bool,
    },
    Delete {
        name: String,
        /// Stop the event's service (if running) as part of the delete.
        #[arg(long)]
        stop: bool,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let client = Client::connect(&cli.socket)?;

    match cli.command {
        Command::Run { name, command } => run_once(&client, &name, &command)?,
        Command::Service(cmd) => service(&client, cmd)?,
        Command::Event(cmd) => event(&client, cmd)?,
    }
    Ok(())
}

fn run_once(client: &Client, name: &str, command: &str) -> anyhow::Result<()> {
    let (label, fd) = client.start_normal(name, command, Direction::Read, None)?;
    let mut file = File::from(fd);
    io::copy(&mut file, &mut io::stdout())?;
    client.close_normal(label, name)?;
    Ok(())
}

fn service(client: &Client, cmd: ServiceCommand) -> anyhow::Result<()> {
    match cmd {
        ServiceCommand::Start { name, command } => {
            let label = client.start_service(&name, &command, None)?;
            println!("started {name:?} as label {}", label.0);
        }
        ServiceCommand::Stop { name, label } => {
            client.stop_service(sace_protocol::Label(label), &name)?;
        }
        ServiceCommand::Pause { name, label } => {
            client.pause_service(sace_protocol::Label(label), &name)?;
        }
        ServiceCommand::Restart { name, label } => {
            client.restart_service(sace_protocol::Label(label), &name)?;
        }
        ServiceCommand::Info { name } => {
            let result = client.service_info_by_name(&name)?;
            println!("{:?}", result.extra);
        }
    }
    Ok(())
}

fn event(client: &Client, cmd: EventCommand) -> anyhow::Result<()> {
    match cmd {
        EventCommand::Add { name, command, restart_on_fail } => {
            let flags = if restart_on_fail { EventFlags::RestartOnFail } else { EventFlags::None };
            client.add_event(&name, &command, flags, None)?;
        }
        EventCommand::Delete { name, stop } => {
            client.delete_event(&name, stop)?;
        }
    }
    Ok(())
}

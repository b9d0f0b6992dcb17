use clap::{Parser, Subcommand};
use eyre::Result;

use crate::{defs::Mode, hardware::ActuatorCommand};

mod config;
mod run;
mod send;

#[derive(Parser)]
#[command(version, about)]
pub struct CliOpts {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Parse and print the configuration file
    Config {
        #[arg(short, long, default_value = "config.yaml")]
        config: String,
    },

    /// Supervise the fan until interrupted
    Run {
        #[arg(short, long, default_value = "config.yaml")]
        config: String,

        /// Log actuator commands instead of writing them to the serial port
        #[arg(long)]
        dry_run: bool,

        #[arg(short, long)]
        mode: Option<Mode>,

        #[arg(short, long)]
        rpm_tier: Option<u8>,
    },

    /// Write a single command to the fan, for checking the wiring
    Send {
        command: ActuatorCommand,

        #[arg(short, long, default_value = "config.yaml")]
        config: String,
    },
}

pub fn run(opts: CliOpts) -> Result<()> {
    execute_command(opts.command)
}

#[tokio::main]
pub async fn execute_command(command: Command) -> Result<()> {
    match command {
        Command::Config { config } => self::config::read_and_print(&config).await,

        Command::Run {
            config,
            dry_run,
            mode,
            rpm_tier,
        } => self::run::launch(&config, dry_run, mode, rpm_tier).await,

        Command::Send { command, config } => self::send::send(&config, command).await,
    }
}

use clap::{Args, Subcommand};

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod send;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the agent-side echo responder.
    Serve(ServeArgs),
    /// Send one echo request and print the reply.
    Send(SendArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0")]
    pub address: String,

    /// TCP port to listen on.
    #[arg(long, short = 'p', default_value_t = 2210)]
    pub port: u16,

    /// Poll timeout in milliseconds.
    #[arg(long, default_value_t = 1500)]
    pub delay_ms: u64,

    /// Exit after answering N messages.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Address to connect to.
    #[arg(long, default_value = "127.0.0.1")]
    pub address: String,

    /// TCP port to connect to.
    #[arg(long, short = 'p', default_value_t = 2210)]
    pub port: u16,

    /// Text payload for the echo request.
    #[arg(long, short = 'd', default_value = "Is there anybody out there?")]
    pub data: String,

    /// Connect attempts before giving up.
    #[arg(long, default_value_t = 5)]
    pub retries: u32,

    /// Delay between connect attempts in milliseconds.
    #[arg(long, default_value_t = 500)]
    pub delay_ms: u64,
}

#[derive(Args, Debug, Default)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

//! CLI for the dhkex Diffie-Hellman key exchange.

#![allow(
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::missing_docs_in_private_items
)]

mod logging;
mod run;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgGroup, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use dhkex::{Config, DEFAULT_BIND, DEFAULT_PORT, Policy, math::DEFAULT_ROUNDS};

#[derive(Parser)]
#[command(
    name = "dhkex",
    version,
    about = "Diffie-Hellman key exchange between two peers over TCP",
    args_conflicts_with_subcommands = true,
    subcommand_negates_reqs = true
)]
#[command(group(ArgGroup::new("mode").required(true).args(["listen", "destination"])))]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Listen for peers and generate the group parameters.
    #[arg(short = 'l', long)]
    listen: bool,

    /// Connect to this host and receive the group parameters.
    #[arg(short = 'd', long, value_name = "ADDR")]
    destination: Option<String>,

    /// Port to listen on or connect to.
    #[arg(short = 't', long = "target-port", value_name = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Address to bind in listen mode.
    #[arg(long, value_name = "ADDR", default_value = DEFAULT_BIND)]
    bind: String,

    /// Modulus size in bits (listen mode).
    #[arg(long, default_value_t = Policy::DEFAULT_PRIME_BITS)]
    bits: u64,

    /// Miller-Rabin rounds per prime candidate (listen mode).
    #[arg(long, default_value_t = DEFAULT_ROUNDS)]
    rounds: u32,

    /// Give up on a silent peer after this many seconds.
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// How to print each derived secret.
    #[arg(long, default_value = "text")]
    format: OutputFormat,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Generate shell completion scripts.
    #[command(hide = true)]
    Completion {
        /// Target shell.
        shell: Shell,
    },
}

/// Output format for session reports.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub(crate) enum OutputFormat {
    /// `Shared secret: <decimal>`.
    #[default]
    Text,
    /// One JSON report per line.
    Json,
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.log_json);
    if let Err(e) = cli.dispatch() {
        eprintln!("dhkex: {e:#}");
        std::process::exit(1);
    }
}

impl Cli {
    fn dispatch(self) -> Result<()> {
        if let Some(Command::Completion { shell }) = self.command {
            clap_complete::generate(shell, &mut Self::command(), "dhkex", &mut std::io::stdout());
            return Ok(());
        }

        let config = self.config()?;
        if self.listen {
            return run::listen(config, self.format);
        }
        let host = self
            .destination
            .context("either --listen or --destination is required")?;
        run::connect(&config, &host, self.format)
    }

    fn config(&self) -> Result<Config> {
        let mut builder = Config::builder()
            .bind(&self.bind)
            .port(self.port)
            .prime_bits(self.bits)
            .rounds(self.rounds);
        if let Some(secs) = self.timeout {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(builder.build()?)
    }
}

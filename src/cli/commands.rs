use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// `turnrelay` - relays chat prompts to a CLI-driving proxy and runs
/// timer-defined jobs.
#[derive(Parser, Debug)]
#[command(name = "turnrelay")]
#[command(version = "0.1.0")]
#[command(about = "Relay prompts to a CLI-driving proxy and run scheduled jobs.", long_about = None)]
pub struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the long-running scheduler daemon
    Daemon,

    /// Chat with the proxy from the terminal
    Chat {
        /// Proxy session id; the conversation continues across prompts
        #[arg(short, long, default_value = "cli")]
        session: String,
    },

    /// Replay a captured proxy line stream through the turn parser
    Parse {
        /// File with one record per line (reads stdin when omitted)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Inspect scheduled jobs
    Jobs {
        #[command(subcommand)]
        job_command: JobCommands,
    },
}

/// Job subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum JobCommands {
    /// List discovered jobs with their schedule and last outcome
    List,
}

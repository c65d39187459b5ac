use crate::cli::commands::{Cli, Commands, JobCommands};
use anyhow::{Context, Result};
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use turnrelay::Config;
use turnrelay::platform::scheduler::{self, JobCommand};
use turnrelay::transport::channels::{Channel, CliChannel};
use turnrelay::transport::proxy::HttpProxyClient;
use turnrelay::transport::{SessionRelay, replay_lines};

async fn run_chat(config: &Config, session: String) -> Result<()> {
    let proxy =
        HttpProxyClient::from_config(&config.proxy).context("Failed to build proxy client")?;
    let relay = SessionRelay::new(Arc::new(proxy));
    let channel: Arc<dyn Channel> = Arc::new(CliChannel::new(session.clone()));

    println!("turnrelay chat, session {session}");
    println!("Type a prompt, /clear for a fresh conversation, /quit to leave.\n");
    relay.run_interactive(channel).await
}

fn run_parse(file: Option<&Path>) -> Result<()> {
    let messages = match file {
        Some(path) => {
            let handle = std::fs::File::open(path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            replay_lines(BufReader::new(handle))?
        }
        None => replay_lines(std::io::stdin().lock())?,
    };
    for message in messages {
        println!("{message}\n");
    }
    Ok(())
}

pub async fn dispatch(cli: Cli, config: Arc<Config>) -> Result<()> {
    match cli.command {
        Commands::Daemon => {
            info!(proxy = %config.proxy.base_url, "Starting turnrelay daemon");
            turnrelay::platform::daemon::run(Arc::clone(&config)).await
        }

        Commands::Chat { session } => run_chat(&config, session).await,

        Commands::Parse { file } => run_parse(file.as_deref()),

        Commands::Jobs { job_command } => {
            let cmd = match job_command {
                JobCommands::List => JobCommand::List,
            };
            scheduler::handle_command(cmd, &config)
        }
    }
}

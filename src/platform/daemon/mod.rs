use crate::config::Config;
use crate::platform::scheduler::{Scheduler, SchedulerOptions};
use crate::transport::channels::{Channel, CliChannel};
use crate::transport::proxy::HttpProxyClient;
use crate::transport::{RelayJobRunner, SessionRelay};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

mod supervisor;

use supervisor::{RestartPolicy, spawn_component_supervisor};

/// Session label of the daemon's own terminal; job output for any other
/// session is labelled with that session's id.
const DAEMON_SESSION: &str = "daemon";

pub async fn run(config: Arc<Config>) -> Result<()> {
    let proxy =
        HttpProxyClient::from_config(&config.proxy).context("Failed to build proxy client")?;
    let relay = Arc::new(SessionRelay::new(Arc::new(proxy)));
    let channel: Arc<dyn Channel> = Arc::new(CliChannel::new(DAEMON_SESSION));

    let cancel = CancellationToken::new();
    let mut handles: Vec<JoinHandle<()>> = Vec::new();

    if config.scheduler.enabled {
        let runner = Arc::new(RelayJobRunner::new(relay, channel));
        let scheduler = Arc::new(Scheduler::new(SchedulerOptions::from_config(&config), runner));
        let policy = RestartPolicy::from_config(&config.reliability);
        handles.push(spawn_scheduler(scheduler, policy, cancel.clone()));
    } else {
        tracing::info!("scheduler disabled in config; daemon idle until stopped");
    }

    println!("◆ turnrelay daemon started");
    println!("   proxy:  {}", config.proxy.base_url);
    println!("   jobs:   {}", config.scheduler_root_dir().display());
    println!("   Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested");
    cancel.cancel();

    for handle in handles {
        let _ = handle.await;
    }
    Ok(())
}

fn spawn_scheduler(
    scheduler: Arc<Scheduler>,
    policy: RestartPolicy,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    spawn_component_supervisor("scheduler", policy, cancel, move |token| {
        let scheduler = Arc::clone(&scheduler);
        async move { scheduler.run(token).await }
    })
}

use crate::config::ReliabilityConfig;
use anyhow::Result;
use std::future::Future;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

/// Restart policy for a supervised component.
#[derive(Debug, Clone, Copy)]
pub(super) struct RestartPolicy {
    pub initial_backoff_secs: u64,
    pub max_backoff_secs: u64,
    /// Consecutive failures tolerated before giving up; 0 restarts forever.
    pub max_restarts: u32,
}

impl RestartPolicy {
    pub fn from_config(config: &ReliabilityConfig) -> Self {
        let initial = config.component_initial_backoff_secs.max(1);
        Self {
            initial_backoff_secs: initial,
            max_backoff_secs: config.component_max_backoff_secs.max(initial),
            max_restarts: config.component_max_restarts,
        }
    }
}

/// Run `run_component` until `cancel` fires, restarting it with exponential
/// backoff whenever it fails or returns on its own.
pub(super) fn spawn_component_supervisor<F, Fut>(
    name: &'static str,
    policy: RestartPolicy,
    cancel: CancellationToken,
    mut run_component: F,
) -> JoinHandle<()>
where
    F: FnMut(CancellationToken) -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        let initial = policy.initial_backoff_secs.max(1);
        let max_backoff = policy.max_backoff_secs.max(initial);
        let mut backoff = initial;
        let mut consecutive_failures: u32 = 0;

        loop {
            tracing::info!(component = name, "daemon component starting");
            let outcome = run_component(cancel.clone()).await;
            if cancel.is_cancelled() {
                tracing::info!(component = name, "daemon component stopped");
                break;
            }

            match outcome {
                Ok(()) => {
                    tracing::warn!(component = name, "daemon component exited unexpectedly");
                    backoff = initial;
                }
                Err(error) => {
                    tracing::error!(
                        component = name,
                        error = %format!("{error:#}"),
                        "daemon component failed"
                    );
                }
            }
            consecutive_failures = consecutive_failures.saturating_add(1);

            if policy.max_restarts > 0 && consecutive_failures > policy.max_restarts {
                tracing::error!(
                    component = name,
                    max_restarts = policy.max_restarts,
                    "daemon component exceeded max restarts, circuit open"
                );
                break;
            }

            tracing::info!(component = name, backoff_secs = backoff, "daemon component restarting");
            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(Duration::from_secs(backoff)) => {}
            }
            backoff = backoff.saturating_mul(2).min(max_backoff);
        }
    })
}

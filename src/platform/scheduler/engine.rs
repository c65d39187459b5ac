use super::discovery::discover_jobs;
use super::sanitize_path_part;
use super::schedule::next_run_at;
use super::state::RunStateStore;
use super::table::{JobTable, ReloadDelta, ScheduledJob};
use super::types::{JobDefinition, JobKey};
use super::watcher::DefinitionWatcher;
use crate::config::Config;
use crate::error::SchedulerError;
use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Executes one job's prompt. Implementations route the prompt through the
/// proxy and deliver the parsed output; an `Err` is recorded on the job.
pub trait JobRunner: Send + Sync {
    fn run<'a>(
        &'a self,
        job: &'a JobDefinition,
        cancel: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;
}

#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    pub root_dir: PathBuf,
    pub owner_id: String,
    pub state_dir: PathBuf,
    pub marker_dir: String,
    pub due_check: Duration,
    pub reconcile: Duration,
    pub reload_debounce: Duration,
    /// Upper bound for one execution, including delivery.
    pub execution_deadline: Duration,
}

impl SchedulerOptions {
    pub fn from_config(config: &Config) -> Self {
        let scheduler = &config.scheduler;
        Self {
            root_dir: config.scheduler_root_dir(),
            owner_id: scheduler.owner_id.clone(),
            state_dir: config.scheduler_state_dir(),
            marker_dir: scheduler.marker_dir.clone(),
            due_check: Duration::from_millis(scheduler.due_check_millis.max(1)),
            reconcile: Duration::from_secs(scheduler.reconcile_secs.max(1)),
            reload_debounce: Duration::from_millis(scheduler.reload_debounce_millis),
            execution_deadline: Duration::from_secs(
                config.proxy.timeout_secs + scheduler.execution_margin_secs,
            ),
        }
    }

    pub fn owner_dir(&self) -> PathBuf {
        self.root_dir
            .join(sanitize_path_part(&self.owner_id, "default"))
    }
}

/// Discovers timer-defined jobs, keeps their next-run times reconciled with
/// the definitions on disk, and launches due jobs concurrently.
pub struct Scheduler {
    options: SchedulerOptions,
    owner_dir: PathBuf,
    table: Arc<Mutex<JobTable>>,
    store: Arc<RunStateStore>,
    runner: Arc<dyn JobRunner>,
}

impl Scheduler {
    pub fn new(options: SchedulerOptions, runner: Arc<dyn JobRunner>) -> Self {
        let owner_dir = options.owner_dir();
        let store = Arc::new(RunStateStore::new(options.state_dir.clone()));
        Self {
            options,
            owner_dir,
            table: Arc::new(Mutex::new(JobTable::new())),
            store,
            runner,
        }
    }

    pub fn options(&self) -> &SchedulerOptions {
        &self.options
    }

    pub fn store(&self) -> &RunStateStore {
        &self.store
    }

    pub fn jobs(&self) -> Vec<ScheduledJob> {
        self.lock_table().snapshot()
    }

    fn lock_table(&self) -> std::sync::MutexGuard<'_, JobTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Rescan the owner tree and reconcile the job table against it.
    pub fn reload(&self, now: DateTime<Utc>) -> ReloadDelta {
        let definitions = discover_jobs(
            &self.owner_dir,
            &self.options.owner_id,
            &self.options.marker_dir,
        );
        let now_local = now.with_timezone(&Local);
        let mut rng = rand::rng();

        let scanned: Vec<(JobDefinition, Option<DateTime<Utc>>)> = definitions
            .into_iter()
            .map(|definition| {
                let state = self.store.load(&definition.key);
                // Only a job this process has not seen yet resumes a persisted
                // plan; known jobs go through reconcile's keep-or-recompute.
                let resumed = state
                    .next_run_at
                    .filter(|at| *at > now && !self.lock_table().contains(&definition.key));
                let next = resumed.or_else(|| {
                    next_run_at(&definition.spec, state.last_run_at, &now_local, &mut rng)
                });
                (definition, next)
            })
            .collect();

        let (delta, rescheduled, total, to_persist) = {
            let mut table = self.lock_table();
            let (delta, rescheduled) = table.reconcile(scanned, now);
            let to_persist: Vec<(JobKey, Option<DateTime<Utc>>)> = rescheduled
                .iter()
                .filter_map(|key| table.get(key))
                .filter(|job| !job.running)
                .map(|job| (job.definition.key.clone(), job.next_run_at))
                .collect();
            (delta, rescheduled.len(), table.len(), to_persist)
        };

        for (key, next) in to_persist {
            let mut state = self.store.load(&key);
            if state.next_run_at == next {
                continue;
            }
            state.stamp_identity(&key);
            state.next_run_at = next;
            state.running = false;
            state.updated_at = Some(Utc::now());
            self.store.save_or_warn(&key, &state);
        }

        if !delta.is_empty() {
            tracing::info!(
                owner = %self.options.owner_id,
                jobs = total,
                added = delta.added,
                removed = delta.removed,
                updated = delta.updated,
                rescheduled,
                owner_dir = %self.owner_dir.display(),
                "scheduler reloaded"
            );
        }
        delta
    }

    /// Launch every due job on its own task. Returns the task handles so
    /// callers may wait for them; the control loop does not.
    pub fn dispatch_due(
        &self,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Vec<JoinHandle<()>> {
        let due = self.lock_table().take_due(now);
        due.into_iter()
            .map(|job| {
                let execution = Execution {
                    table: Arc::clone(&self.table),
                    store: Arc::clone(&self.store),
                    runner: Arc::clone(&self.runner),
                    deadline: self.options.execution_deadline,
                };
                let cancel = cancel.child_token();
                tokio::spawn(async move { execution.run(job, cancel).await })
            })
            .collect()
    }

    /// Control loop: initial scan, then due ticks, periodic reconcile and
    /// debounced reloads on definition changes until `cancel` fires.
    /// In-flight executions are left to finish on their own.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) -> Result<()> {
        std::fs::create_dir_all(&self.options.state_dir).with_context(|| {
            format!(
                "Failed to create scheduler state dir {}",
                self.options.state_dir.display()
            )
        })?;
        tracing::info!(
            root_dir = %self.options.root_dir.display(),
            root_exists = self.options.root_dir.is_dir(),
            owner_dir = %self.owner_dir.display(),
            owner_exists = self.owner_dir.is_dir(),
            state_dir = %self.options.state_dir.display(),
            "scheduler init"
        );

        let (signal_tx, mut signal_rx) = tokio::sync::mpsc::unbounded_channel();
        let mut watcher =
            DefinitionWatcher::new(self.options.marker_dir.clone(), signal_tx.clone());
        self.ensure_watching(&mut watcher);
        self.reload(Utc::now());

        let mut due_ticker = tokio::time::interval(self.options.due_check);
        due_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut reconcile_ticker = tokio::time::interval_at(
            Instant::now() + self.options.reconcile,
            self.options.reconcile,
        );
        reconcile_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut reload_at: Option<Instant> = None;

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::info!("scheduler stopping");
                    break;
                }
                Some(()) = signal_rx.recv() => {
                    reload_at = Some(Instant::now() + self.options.reload_debounce);
                }
                () = sleep_until_reload(reload_at), if reload_at.is_some() => {
                    reload_at = None;
                    self.reload(Utc::now());
                }
                _ = reconcile_ticker.tick() => {
                    self.ensure_watching(&mut watcher);
                    self.reload(Utc::now());
                }
                _ = due_ticker.tick() => {
                    self.dispatch_due(Utc::now(), &cancel);
                }
            }
        }

        drop(signal_tx);
        Ok(())
    }

    fn ensure_watching(&self, watcher: &mut DefinitionWatcher) {
        let roots = [self.owner_dir.as_path(), self.options.root_dir.as_path()];
        if let Err(error) = watcher.ensure(&roots) {
            tracing::warn!(%error, "scheduler watch setup failed, relying on periodic rescan");
        }
    }
}

async fn sleep_until_reload(reload_at: Option<Instant>) {
    tokio::time::sleep_until(reload_at.unwrap_or_else(Instant::now)).await;
}

/// Everything one spawned execution needs, detached from the scheduler.
struct Execution {
    table: Arc<Mutex<JobTable>>,
    store: Arc<RunStateStore>,
    runner: Arc<dyn JobRunner>,
    deadline: Duration,
}

impl Execution {
    async fn run(self, job: JobDefinition, cancel: CancellationToken) {
        let key = job.key.clone();
        let started = Utc::now();
        let clock = std::time::Instant::now();

        let mut state = self.store.load(&key);
        state.stamp_identity(&key);
        state.last_run_at = Some(started);
        state.running = true;
        state.updated_at = Some(started);
        self.store.save_or_warn(&key, &state);

        tracing::info!(job = %key, session = %key.session_id, "scheduled job started");
        let run = self.runner.run(&job, cancel);
        let outcome = match tokio::time::timeout(self.deadline, run).await {
            Ok(result) => result.map_err(|e| format!("{e:#}")),
            Err(_) => Err(SchedulerError::Deadline {
                key: key.to_string(),
                secs: self.deadline.as_secs(),
            }
            .to_string()),
        };

        match &outcome {
            Ok(()) => {
                state.last_success_at = Some(started);
                state.last_error.clear();
                tracing::info!(
                    job = %key,
                    elapsed_ms = clock.elapsed().as_millis(),
                    "scheduled job succeeded"
                );
            }
            Err(error) => {
                state.last_error = error.trim().to_string();
                tracing::warn!(
                    job = %key,
                    elapsed_ms = clock.elapsed().as_millis(),
                    %error,
                    "scheduled job failed"
                );
            }
        }

        let now = Utc::now();
        state.running = false;
        state.next_run_at = next_run_at(
            &job.spec,
            state.last_run_at,
            &now.with_timezone(&Local),
            &mut rand::rng(),
        );
        state.updated_at = Some(now);
        self.store.save_or_warn(&key, &state);

        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .complete(&key, state.next_run_at);
    }
}

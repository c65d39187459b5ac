use super::types::{JobDefinition, JobKey};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledJob {
    pub definition: JobDefinition,
    pub next_run_at: Option<DateTime<Utc>>,
    pub running: bool,
}

/// Counts reported after a reload; `updated` means structurally different.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReloadDelta {
    pub added: usize,
    pub removed: usize,
    pub updated: usize,
}

impl ReloadDelta {
    pub fn is_empty(&self) -> bool {
        self.added == 0 && self.removed == 0 && self.updated == 0
    }
}

/// In-memory job set shared by the reload and dispatch paths.
///
/// In-flight keys are tracked apart from the job map so that a definition
/// removed and re-added while its execution runs is still not dispatched
/// again before that execution completes.
#[derive(Debug, Default)]
pub struct JobTable {
    jobs: HashMap<JobKey, ScheduledJob>,
    in_flight: HashSet<JobKey>,
}

impl JobTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn get(&self, key: &JobKey) -> Option<&ScheduledJob> {
        self.jobs.get(key)
    }

    pub fn contains(&self, key: &JobKey) -> bool {
        self.jobs.contains_key(key)
    }

    /// Replace the job set with a fresh scan. Each scanned job arrives with a
    /// freshly computed next run; a job whose definition is unchanged and
    /// whose previous next run is still ahead of `now` keeps the previous
    /// one. Running flags follow the in-flight set, whether the job remained
    /// or was dropped and re-added between scans.
    ///
    /// Returns the diff and the keys whose schedule was (re)computed.
    pub fn reconcile(
        &mut self,
        scanned: Vec<(JobDefinition, Option<DateTime<Utc>>)>,
        now: DateTime<Utc>,
    ) -> (ReloadDelta, Vec<JobKey>) {
        let mut delta = ReloadDelta::default();
        let mut rescheduled = Vec::new();
        let mut next_jobs = HashMap::with_capacity(scanned.len());

        for (definition, computed_next) in scanned {
            let key = definition.key.clone();
            let job = match self.jobs.remove(&key) {
                Some(old) => {
                    let unchanged = old.definition == definition;
                    if !unchanged {
                        delta.updated += 1;
                    }
                    let keep = unchanged && old.next_run_at.is_some_and(|at| at > now);
                    if !keep {
                        rescheduled.push(key.clone());
                    }
                    ScheduledJob {
                        definition,
                        next_run_at: if keep { old.next_run_at } else { computed_next },
                        running: self.in_flight.contains(&key),
                    }
                }
                None => {
                    delta.added += 1;
                    rescheduled.push(key.clone());
                    ScheduledJob {
                        definition,
                        next_run_at: computed_next,
                        running: self.in_flight.contains(&key),
                    }
                }
            };
            next_jobs.insert(key, job);
        }

        delta.removed = self.jobs.len();
        self.jobs = next_jobs;
        (delta, rescheduled)
    }

    /// Mark every idle job whose next run is not after `now` as running and
    /// return their definitions. A running job is never returned twice.
    pub fn take_due(&mut self, now: DateTime<Utc>) -> Vec<JobDefinition> {
        let mut due: Vec<JobDefinition> = self
            .jobs
            .values_mut()
            .filter(|job| {
                !job.running
                    && !self.in_flight.contains(&job.definition.key)
                    && job.next_run_at.is_some_and(|at| at <= now)
            })
            .map(|job| {
                job.running = true;
                job.definition.clone()
            })
            .collect();
        self.in_flight.extend(due.iter().map(|definition| definition.key.clone()));
        due.sort_by(|a, b| a.key.cmp(&b.key));
        due
    }

    /// Record the outcome of an execution. The key leaves the in-flight set
    /// even if its definition was removed while it ran.
    pub fn complete(&mut self, key: &JobKey, next_run_at: Option<DateTime<Utc>>) {
        self.in_flight.remove(key);
        if let Some(job) = self.jobs.get_mut(key) {
            job.running = false;
            job.next_run_at = next_run_at;
        }
    }

    pub fn snapshot(&self) -> Vec<ScheduledJob> {
        let mut jobs: Vec<ScheduledJob> = self.jobs.values().cloned().collect();
        jobs.sort_by(|a, b| a.definition.key.cmp(&b.definition.key));
        jobs
    }
}

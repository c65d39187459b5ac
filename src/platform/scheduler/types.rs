use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Wall-clock time of day for `OnCalendar=` timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyClock {
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl fmt::Display for DailyClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hour, self.minute, self.second)
    }
}

/// Schedule portion of a job definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimerSpec {
    pub interval: Option<Duration>,
    pub daily_clock: Option<DailyClock>,
    /// Upper bound of the uniform delay added to every computed run.
    pub jitter_secs: u32,
}

impl TimerSpec {
    pub fn has_schedule(&self) -> bool {
        self.interval.is_some_and(|d| !d.is_zero()) || self.daily_clock.is_some()
    }

    /// Short human form, e.g. `every 300s, daily 21:00:00, jitter<=30s`.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(interval) = self.interval {
            parts.push(format!("every {interval:?}"));
        }
        if let Some(clock) = self.daily_clock {
            parts.push(format!("daily {clock}"));
        }
        if self.jitter_secs > 0 {
            parts.push(format!("jitter<={}s", self.jitter_secs));
        }
        parts.join(", ")
    }
}

/// Identity of a job: owner, session directory and definition base name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobKey {
    pub owner_id: String,
    pub session_id: String,
    pub name: String,
}

impl JobKey {
    pub fn new(
        owner_id: impl Into<String>,
        session_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            session_id: session_id.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.owner_id, self.session_id, self.name)
    }
}

/// One discovered `.service` + `.timer` pair. Compared structurally across
/// scans to decide whether a schedule may be kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDefinition {
    pub key: JobKey,
    pub prompt: String,
    pub spec: TimerSpec,
    pub service_path: PathBuf,
    pub timer_path: PathBuf,
}

/// Persisted execution history of one job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunState {
    pub job_key: String,
    pub owner_id: String,
    pub session_id: String,
    pub job_name: String,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error: String,
    pub next_run_at: Option<DateTime<Utc>>,
    pub running: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

impl RunState {
    pub fn stamp_identity(&mut self, key: &JobKey) {
        self.job_key = key.to_string();
        self.owner_id.clone_from(&key.owner_id);
        self.session_id.clone_from(&key.session_id);
        self.job_name.clone_from(&key.name);
    }
}

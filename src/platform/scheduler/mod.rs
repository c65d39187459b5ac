mod discovery;
mod engine;
mod schedule;
mod state;
mod table;
mod types;
mod unit_file;
mod watcher;

pub use discovery::discover_jobs;
pub use engine::{JobRunner, Scheduler, SchedulerOptions};
pub use schedule::next_run_at;
pub use state::RunStateStore;
pub use table::{JobTable, ReloadDelta, ScheduledJob};
pub use types::{DailyClock, JobDefinition, JobKey, RunState, TimerSpec};
pub use unit_file::{parse_daily_clock, parse_duration, read_service_prompt, read_timer_spec};
pub use watcher::{DefinitionWatcher, is_relevant_path};

use crate::config::Config;
use anyhow::Result;
use chrono::{DateTime, Local, Utc};

/// Reduce `raw` to `[A-Za-z0-9._-]` so it can be used as one path segment.
/// Empty or dot-only results fall back to `fallback`.
pub fn sanitize_path_part(raw: &str, fallback: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        fallback.to_string()
    } else {
        cleaned
    }
}

/// Job inspection commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobCommand {
    List,
}

pub fn handle_command(command: JobCommand, config: &Config) -> Result<()> {
    match command {
        JobCommand::List => {
            let options = SchedulerOptions::from_config(config);
            let owner_dir = options.owner_dir();
            let jobs = discover_jobs(&owner_dir, &options.owner_id, &options.marker_dir);
            if jobs.is_empty() {
                println!("No scheduled jobs under {}.", owner_dir.display());
                println!("\nDefine one with a pair of files:");
                println!(
                    "  <session>/{0}/<name>.service  and  <session>/{0}/<name>.timer",
                    options.marker_dir
                );
                return Ok(());
            }

            let store = RunStateStore::new(options.state_dir.clone());
            let now = Utc::now();
            println!("Scheduled jobs ({}):", jobs.len());
            for job in jobs {
                let state = store.load(&job.key);
                let next = match state.next_run_at {
                    Some(at) if at > now => Some(at),
                    _ => next_run_at(
                        &job.spec,
                        state.last_run_at,
                        &now.with_timezone(&Local),
                        &mut rand::rng(),
                    ),
                };
                let last_error = if state.last_error.is_empty() {
                    "none".to_string()
                } else {
                    crate::utils::text::truncate_with_ellipsis(&state.last_error, 120)
                };
                println!(
                    "- {} | {} | next={} | last={} | ok={}\n    error: {}\n    prompt: {}",
                    job.key,
                    job.spec.describe(),
                    format_time(next),
                    format_time(state.last_run_at),
                    format_time(state.last_success_at),
                    last_error,
                    crate::utils::text::truncate_with_ellipsis(&job.prompt, 80),
                );
            }
            Ok(())
        }
    }
}

fn format_time(at: Option<DateTime<Utc>>) -> String {
    at.map_or_else(|| "never".into(), |d| d.to_rfc3339())
}

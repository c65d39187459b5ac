use super::types::{JobDefinition, JobKey};
use super::unit_file::{read_service_prompt, read_timer_spec};
use crate::error::SchedulerError;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Walk `owner_dir` for marker directories and return every well-formed
/// `.service` + `.timer` pair, ordered by key. Malformed pairs are logged and
/// skipped.
pub fn discover_jobs(owner_dir: &Path, owner_id: &str, marker: &str) -> Vec<JobDefinition> {
    let mut found = BTreeMap::new();
    if owner_dir.is_dir() {
        walk(owner_dir, owner_id, marker, &mut found);
    }
    found.into_values().collect()
}

fn walk(dir: &Path, owner_id: &str, marker: &str, found: &mut BTreeMap<JobKey, JobDefinition>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if !file_type.is_dir() {
            continue;
        }
        let path = entry.path();
        if entry.file_name() == marker {
            scan_marker_dir(&path, owner_id, found);
        } else {
            walk(&path, owner_id, marker, found);
        }
    }
}

fn scan_marker_dir(dir: &Path, owner_id: &str, found: &mut BTreeMap<JobKey, JobDefinition>) {
    let session_id = dir
        .parent()
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().trim().to_string())
        .unwrap_or_default();
    if session_id.is_empty() {
        return;
    }

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(error) => {
            tracing::warn!(path = %dir.display(), %error, "scheduler read dir failed");
            return;
        }
    };

    let mut services: BTreeMap<String, PathBuf> = BTreeMap::new();
    let mut timers: BTreeMap<String, PathBuf> = BTreeMap::new();
    for entry in entries.flatten() {
        if entry.file_type().is_ok_and(|t| t.is_dir()) {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let Some((base, ext)) = name.rsplit_once('.') else {
            continue;
        };
        match ext.to_ascii_lowercase().as_str() {
            "service" => {
                services.insert(base.to_string(), entry.path());
            }
            "timer" => {
                timers.insert(base.to_string(), entry.path());
            }
            _ => {}
        }
    }

    for (base, service_path) in services {
        let Some(timer_path) = timers.remove(&base) else {
            continue;
        };
        match load_definition(&base, &session_id, owner_id, service_path, timer_path) {
            Ok(definition) => {
                found.insert(definition.key.clone(), definition);
            }
            Err(error) => {
                tracing::warn!(%error, "scheduler skipped job definition");
            }
        }
    }
}

fn load_definition(
    base: &str,
    session_id: &str,
    owner_id: &str,
    service_path: PathBuf,
    timer_path: PathBuf,
) -> Result<JobDefinition, SchedulerError> {
    let prompt =
        read_service_prompt(&service_path).map_err(|source| SchedulerError::Definition {
            path: service_path.display().to_string(),
            source,
        })?;
    let spec = read_timer_spec(&timer_path).map_err(|source| SchedulerError::Definition {
        path: timer_path.display().to_string(),
        source,
    })?;

    Ok(JobDefinition {
        key: JobKey::new(owner_id, session_id, base),
        prompt,
        spec,
        service_path,
        timer_path,
    })
}

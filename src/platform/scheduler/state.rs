use super::sanitize_path_part;
use super::types::{JobKey, RunState};
use crate::error::SchedulerError;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

/// One JSON file per job under a state directory.
#[derive(Debug, Clone)]
pub struct RunStateStore {
    dir: PathBuf,
}

impl RunStateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, key: &JobKey) -> PathBuf {
        let flattened = key.to_string().replace(['/', ':'], "__");
        let safe = sanitize_path_part(&flattened, "job");
        self.dir.join(format!("{safe}.json"))
    }

    /// Missing or unreadable state loads as the default record.
    pub fn load(&self, key: &JobKey) -> RunState {
        let path = self.path_for(key);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => return RunState::default(),
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "scheduler state read failed");
                return RunState::default();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(state) => state,
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "scheduler state decode failed");
                RunState::default()
            }
        }
    }

    /// Write through a sibling temp file and rename over the target.
    pub fn save(&self, key: &JobKey, state: &RunState) -> Result<(), SchedulerError> {
        let path = self.path_for(key);
        let failure = |message: String| SchedulerError::State {
            path: path.display().to_string(),
            message,
        };

        fs::create_dir_all(&self.dir).map_err(|e| failure(format!("mkdir: {e}")))?;
        let body =
            serde_json::to_vec_pretty(state).map_err(|e| failure(format!("encode: {e}")))?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, body).map_err(|e| failure(format!("write: {e}")))?;
        fs::rename(&tmp, &path).map_err(|e| failure(format!("rename: {e}")))?;
        Ok(())
    }

    /// Save and log instead of propagating; the in-memory table stays
    /// authoritative for the current cycle.
    pub fn save_or_warn(&self, key: &JobKey, state: &RunState) {
        if let Err(error) = self.save(key, state) {
            tracing::warn!(job = %key, %error, "scheduler state write failed");
        }
    }
}

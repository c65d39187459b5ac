use crate::error::SchedulerError;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::UnboundedSender;

/// Whether a filesystem change under `path` can affect job definitions.
pub fn is_relevant_path(path: &Path, marker: &str) -> bool {
    let normalized = path.to_string_lossy().replace('\\', "/");
    if normalized.contains(&format!("/{marker}/")) {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        return matches!(ext.as_str(), "service" | "timer" | "json" | "");
    }
    normalized.ends_with(&format!("/{marker}"))
}

/// Lazily attached recursive watcher over the owner tree. Each relevant
/// change sends one signal; the control loop debounces them.
pub struct DefinitionWatcher {
    marker: String,
    signal: UnboundedSender<()>,
    active: Option<(PathBuf, RecommendedWatcher)>,
}

impl DefinitionWatcher {
    pub fn new(marker: impl Into<String>, signal: UnboundedSender<()>) -> Self {
        Self {
            marker: marker.into(),
            signal,
            active: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn watched_path(&self) -> Option<&Path> {
        self.active.as_ref().map(|(path, _)| path.as_path())
    }

    /// Attach to the first existing directory of `candidates`. Upgrades from
    /// a fallback directory to an earlier candidate once that one exists.
    pub fn ensure(&mut self, candidates: &[&Path]) -> Result<(), SchedulerError> {
        let Some(target) = candidates.iter().find(|p| p.is_dir()) else {
            return Ok(());
        };
        if self.watched_path() == Some(*target) {
            return Ok(());
        }

        let marker = self.marker.clone();
        let signal = self.signal.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if event.paths.iter().any(|p| is_relevant_path(p, &marker)) {
                    let _ = signal.send(());
                }
            }
            Err(error) => tracing::warn!(%error, "scheduler watcher error"),
        })
        .map_err(|e| SchedulerError::Watch(e.to_string()))?;

        watcher
            .watch(target, RecursiveMode::Recursive)
            .map_err(|e| SchedulerError::Watch(format!("{}: {e}", target.display())))?;

        tracing::info!(path = %target.display(), "scheduler watching job definitions");
        self.active = Some((target.to_path_buf(), watcher));
        Ok(())
    }
}

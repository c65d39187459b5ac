use super::Config;
use std::path::PathBuf;

impl Config {
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("TURNRELAY_PROXY_URL")
            && !url.is_empty()
        {
            self.proxy.base_url = url;
        }

        if let Ok(timeout_str) = std::env::var("TURNRELAY_PROXY_TIMEOUT_SECS")
            && let Ok(timeout) = timeout_str.parse::<u64>()
            && timeout > 0
        {
            self.proxy.timeout_secs = timeout;
        }

        if let Ok(owner) = std::env::var("TURNRELAY_OWNER_ID")
            && !owner.is_empty()
        {
            self.scheduler.owner_id = owner;
        }

        if let Ok(workspace) = std::env::var("TURNRELAY_WORKSPACE")
            && !workspace.is_empty()
        {
            self.workspace_dir = PathBuf::from(workspace);
        }

        if let Ok(root) = std::env::var("TURNRELAY_SCHEDULER_ROOT")
            && !root.is_empty()
        {
            self.scheduler.root_dir = Some(PathBuf::from(root));
        }
    }
}

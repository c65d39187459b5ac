use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ── Top-level config ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Workspace directory - computed from home, not serialized
    #[serde(skip)]
    pub workspace_dir: PathBuf,
    /// Path to config.toml - computed from home, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    #[serde(default)]
    pub proxy: ProxyConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub reliability: ReliabilityConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace_dir: PathBuf::from("workspace"),
            config_path: PathBuf::from("config.toml"),
            proxy: ProxyConfig::default(),
            scheduler: SchedulerConfig::default(),
            reliability: ReliabilityConfig::default(),
        }
    }
}

// ── Proxy ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Base URL of the CLI-driving proxy (`POST {base_url}/chat`).
    #[serde(default = "default_proxy_base_url")]
    pub base_url: String,
    /// Request timeout budget for one relayed prompt.
    #[serde(default = "default_proxy_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_proxy_base_url() -> String {
    "http://127.0.0.1:8787".into()
}

fn default_proxy_timeout_secs() -> u64 {
    600
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            base_url: default_proxy_base_url(),
            timeout_secs: default_proxy_timeout_secs(),
        }
    }
}

// ── Scheduler ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Owner whose subtree is scanned for job definitions.
    #[serde(default = "default_owner_id")]
    pub owner_id: String,
    /// Root of all owner trees. Defaults to `<workspace>/projects`.
    #[serde(default)]
    pub root_dir: Option<PathBuf>,
    /// Where per-job run state is persisted. Defaults to
    /// `<workspace>/scheduler/<owner>/state`.
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
    /// Directory name that marks a definitions directory.
    #[serde(default = "default_marker_dir")]
    pub marker_dir: String,
    #[serde(default = "default_due_check_millis")]
    pub due_check_millis: u64,
    #[serde(default = "default_reconcile_secs")]
    pub reconcile_secs: u64,
    #[serde(default = "default_reload_debounce_millis")]
    pub reload_debounce_millis: u64,
    /// Added on top of `proxy.timeout_secs` to form the per-run deadline.
    #[serde(default = "default_execution_margin_secs")]
    pub execution_margin_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_owner_id() -> String {
    "default".into()
}

fn default_marker_dir() -> String {
    ".scheduler".into()
}

fn default_due_check_millis() -> u64 {
    1_000
}

fn default_reconcile_secs() -> u64 {
    60
}

fn default_reload_debounce_millis() -> u64 {
    300
}

fn default_execution_margin_secs() -> u64 {
    10
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            owner_id: default_owner_id(),
            root_dir: None,
            state_dir: None,
            marker_dir: default_marker_dir(),
            due_check_millis: default_due_check_millis(),
            reconcile_secs: default_reconcile_secs(),
            reload_debounce_millis: default_reload_debounce_millis(),
            execution_margin_secs: default_execution_margin_secs(),
        }
    }
}

// ── Reliability ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReliabilityConfig {
    /// Initial backoff for daemon component restarts.
    #[serde(default = "default_component_backoff_secs")]
    pub component_initial_backoff_secs: u64,
    /// Max backoff for daemon component restarts.
    #[serde(default = "default_component_backoff_max_secs")]
    pub component_max_backoff_secs: u64,
    /// Consecutive failures before a component's circuit opens (0 = never).
    #[serde(default = "default_component_max_restarts")]
    pub component_max_restarts: u32,
}

fn default_component_backoff_secs() -> u64 {
    2
}

fn default_component_backoff_max_secs() -> u64 {
    60
}

fn default_component_max_restarts() -> u32 {
    10
}

impl Default for ReliabilityConfig {
    fn default() -> Self {
        Self {
            component_initial_backoff_secs: default_component_backoff_secs(),
            component_max_backoff_secs: default_component_backoff_max_secs(),
            component_max_restarts: default_component_max_restarts(),
        }
    }
}

impl Config {
    pub fn scheduler_root_dir(&self) -> PathBuf {
        self.scheduler
            .root_dir
            .clone()
            .unwrap_or_else(|| self.workspace_dir.join("projects"))
    }

    pub fn scheduler_state_dir(&self) -> PathBuf {
        self.scheduler.state_dir.clone().unwrap_or_else(|| {
            self.workspace_dir
                .join("scheduler")
                .join(crate::platform::scheduler::sanitize_path_part(
                    &self.scheduler.owner_id,
                    "default",
                ))
                .join("state")
        })
    }
}

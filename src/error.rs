use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `turnrelay`.
///
/// Each subsystem defines its own error variant. Library callers can match on
/// these to decide recovery strategy; internal glue continues to use
/// `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum RelayError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Turn parser ─────────────────────────────────────────────────────
    #[error("stream: {0}")]
    Stream(#[from] StreamError),

    // ── Proxy adapter ───────────────────────────────────────────────────
    #[error("proxy: {0}")]
    Proxy(#[from] ProxyError),

    // ── Scheduler ───────────────────────────────────────────────────────
    #[error("scheduler: {0}")]
    Scheduler(#[from] SchedulerError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Turn parser errors ──────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("malformed stream line: {0}")]
    MalformedLine(#[from] serde_json::Error),

    #[error("malformed stream line: expected a JSON object")]
    NotAnObject,
}

// ─── Proxy errors ────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("proxy base URL is required")]
    MissingBaseUrl,

    #[error("request failed: {0}")]
    Request(String),

    #[error("status={status}: {body}")]
    Status { status: u16, body: String },

    #[error("stream read failed: {0}")]
    Stream(String),
}

impl From<reqwest::Error> for ProxyError {
    fn from(err: reqwest::Error) -> Self {
        Self::Request(err.to_string())
    }
}

// ─── Scheduler errors ────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("definition {path}: {source}")]
    Definition {
        path: String,
        #[source]
        source: UnitFileError,
    },

    #[error("state {path}: {message}")]
    State { path: String, message: String },

    #[error("watch: {0}")]
    Watch(String),

    #[error("job {key} exceeded its {secs}s deadline")]
    Deadline { key: String, secs: u64 },

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while reading `.service` / `.timer` definition files.
#[derive(Debug, Error)]
pub enum UnitFileError {
    #[error("line {0}: empty section")]
    EmptySection(usize),

    #[error("missing [{0}] section")]
    MissingSection(&'static str),

    #[error("missing [Unit].Description")]
    MissingDescription,

    #[error("timer defines neither OnUnitActiveSec nor OnCalendar")]
    MissingSchedule,

    #[error("OnUnitActiveSec: {0}")]
    Duration(String),

    #[error("OnCalendar: {0}")]
    Clock(String),

    #[error("RandomizedDelaySec: invalid value {0:?}")]
    Jitter(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, RelayError>;

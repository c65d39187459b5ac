mod env_overrides;
mod loader;
pub mod schema;

pub use schema::{Config, ProxyConfig, ReliabilityConfig, SchedulerConfig};

pub mod channels;
pub mod proxy;
pub mod relay;

pub use relay::{RelayJobRunner, RelaySummary, SessionRelay, replay_lines};

pub mod controller;
pub mod doctor;
pub mod error;
pub mod ingest;
pub mod poll;
pub mod registry;

pub use controller::{FleetController, ModeChange};
pub use error::FleetError;
pub use ingest::{IngestOutcome, MissionStore};
pub use poll::PollPolicy;
pub use registry::{SessionHandle, SessionRegistry};

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Convergence poll interval for mode changes.
    pub poll_interval_ms: u64,

    /// Polls before a mode change gives up with a timeout. 0 never gives up.
    pub mode_max_attempts: u32,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self { poll_interval_ms: 500, mode_max_attempts: 60 }
    }
}

impl ControlConfig {
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: std::time::Duration::from_millis(self.poll_interval_ms),
            max_attempts: (self.mode_max_attempts > 0).then_some(self.mode_max_attempts),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Where uploaded mission files are kept.
    pub mission_dir: String,
}

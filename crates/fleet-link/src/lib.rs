pub mod mav;
pub mod modes;
pub mod session;
pub mod state;
pub mod udp;

#[cfg(feature = "mock")]
pub mod mock;

pub use session::{CommandQueue, Connector, VehicleSession};
pub use state::VehicleState;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// MAVLink ids we use (GCS side)
    pub source_system: u8,
    pub source_component: u8,

    /// Autopilot component. The target system id is learned from its heartbeat.
    pub target_component: u8,

    /// REQUEST_DATA_STREAM rate for telemetry.
    pub stream_rate_hz: u16,

    /// GCS heartbeat send interval.
    pub heartbeat_interval_ms: u64,

    /// Readiness wait on connect. 0 waits indefinitely.
    pub ready_timeout_ms: u64,

    /// Per-message wait inside a mission upload/download exchange.
    pub mission_timeout_ms: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            source_system: 255,
            source_component: 190,
            target_component: 1,
            stream_rate_hz: 4,
            heartbeat_interval_ms: 1000,
            ready_timeout_ms: 0,
            mission_timeout_ms: 3000,
        }
    }
}

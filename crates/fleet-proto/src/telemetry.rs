use serde::{Deserialize, Serialize};

/// Per-request vehicle snapshot.
///
/// The home block is always present: when the vehicle has no home yet it
/// repeats the current relative position, so a present home does not prove
/// one was ever set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub drone_id: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Relative to home.
    pub altitude: f64,
    /// Above mean sea level.
    pub altitude_asl: f64,
    // Battery
    pub battery: Option<u8>,
    pub battery_voltage: Option<f32>,
    pub airspeed: f32,
    pub groundspeed: f32,
    pub heading: i16,
    pub mode: String,
    pub armed: bool,
    pub pitch: f32,
    pub roll: f32,
    pub yaw: f32,
    /// Seconds since the last heartbeat.
    pub signal_strength: Option<f64>,
    pub home_latitude: f64,
    pub home_longitude: f64,
    pub home_altitude: f64,
}

use fleet_proto::GeoPoint;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default)]
pub struct BatteryStatus {
    pub voltage: Option<f32>,      // Volts
    pub current: Option<f32>,      // Amps
    pub remaining: Option<u8>,     // Percent 0-100
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    /// Metres above home.
    pub relative_alt: f64,
    /// Metres above mean sea level.
    pub msl_alt: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Attitude {
    pub pitch: f32,
    pub roll: f32,
    pub yaw: f32,
}

/// Last-known attribute snapshot of one vehicle.
#[derive(Debug, Clone)]
pub struct VehicleState {
    pub location: Location,
    pub battery: BatteryStatus,
    pub airspeed: f32,
    pub groundspeed: f32,
    pub heading: i16,
    pub attitude: Attitude,
    pub armed: bool,
    pub mode: String,
    pub home: Option<GeoPoint>,
    pub last_heartbeat: Option<Instant>,
    pub position_seen: bool,
}

impl Default for VehicleState {
    fn default() -> Self {
        Self {
            location: Location::default(),
            battery: BatteryStatus::default(),
            airspeed: 0.0,
            groundspeed: 0.0,
            heading: 0,
            attitude: Attitude::default(),
            armed: false,
            mode: "UNKNOWN".to_string(),
            home: None,
            last_heartbeat: None,
            position_seen: false,
        }
    }
}

impl VehicleState {
    pub fn hb_age(&self) -> Option<Duration> {
        self.last_heartbeat.map(|t| t.elapsed())
    }

    pub fn is_ready(&self) -> bool {
        self.last_heartbeat.is_some() && self.position_seen
    }

    /// Current position with altitude relative to home.
    pub fn relative_position(&self) -> GeoPoint {
        GeoPoint::new(self.location.latitude, self.location.longitude, self.location.relative_alt)
    }
}

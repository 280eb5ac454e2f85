//! The capability surface the fleet layer needs from one live vehicle
//! connection. Attribute writes are fire-and-forget: their effect shows up
//! only in later [`VehicleSession::state`] reads.

use anyhow::Result;
use fleet_proto::{GeoPoint, MissionItem};

use crate::state::VehicleState;

/// The vehicle's onboard command store as seen from the ground.
///
/// `clear` and `add` edit a local copy; nothing reaches the vehicle until
/// `upload`. `download` replaces the local read-back buffer, which `items`
/// returns once `wait_ready` has succeeded.
pub trait CommandQueue {
    fn clear(&mut self) -> Result<()>;
    fn add(&mut self, item: MissionItem) -> Result<()>;
    fn upload(&mut self) -> Result<()>;
    fn download(&mut self) -> Result<()>;
    fn wait_ready(&mut self) -> Result<()>;
    fn items(&self) -> Vec<MissionItem>;
}

pub trait VehicleSession: CommandQueue + Send {
    fn state(&self) -> VehicleState;

    fn set_armed(&mut self, armed: bool) -> Result<()>;

    /// Requests a flight mode by name.
    fn set_mode(&mut self, mode: &str) -> Result<()>;

    fn set_home(&mut self, home: GeoPoint) -> Result<()>;

    fn set_airspeed(&mut self, speed_mps: f32) -> Result<()>;

    fn takeoff(&mut self, altitude_m: f32) -> Result<()>;

    /// Direct goto in guided mode, altitude relative to home.
    fn goto(&mut self, target: GeoPoint) -> Result<()>;

    fn close(&mut self) -> Result<()>;
}

/// Opens sessions from connection strings.
pub trait Connector: Send + Sync {
    /// Blocks until the session reports itself ready.
    fn open(&self, connection_string: &str) -> Result<Box<dyn VehicleSession>>;
}

use serde::{Deserialize, Serialize};

/// One waypoint of a JSON mission request, exactly as the operator sent it.
///
/// Everything is optional at this level; the mission compiler decides what
/// is required. `delay` and `radius` are the older names for param1/param2.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawWaypoint {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
    pub altitude_type: Option<String>,
    pub command: Option<String>,
    pub param1: Option<f32>,
    pub param2: Option<f32>,
    pub param3: Option<f32>,
    pub param4: Option<f32>,
    pub delay: Option<f32>,
    pub radius: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HomeRequest {
    /// Use the vehicle's current position instead of the coordinates below.
    #[serde(default)]
    pub set_current: bool,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
}

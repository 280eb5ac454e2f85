pub mod mission;
pub mod request;
pub mod telemetry;

pub use mission::{Frame, GeoPoint, MissionCommand, MissionItem};
pub use request::{HomeRequest, RawWaypoint};
pub use telemetry::TelemetrySnapshot;

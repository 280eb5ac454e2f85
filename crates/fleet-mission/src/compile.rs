use fleet_link::VehicleSession;
use fleet_proto::{Frame, MissionCommand, MissionItem, RawWaypoint};

use crate::error::MissionError;

/// Compiles operator waypoints into the sequence sent to the vehicle: a
/// home item at seq 0 taken from the vehicle's current position, then the
/// waypoints in request order.
///
/// Every waypoint is validated before anything is returned, so a bad item
/// anywhere in the batch means nothing gets uploaded.
pub fn compile<S>(session: &S, waypoints: &[RawWaypoint]) -> Result<Vec<MissionItem>, MissionError>
where
    S: VehicleSession + ?Sized,
{
    let loc = session.state().location;
    compile_at(loc.latitude, loc.longitude, waypoints)
}

pub fn compile_at(
    home_lat: f64,
    home_lon: f64,
    waypoints: &[RawWaypoint],
) -> Result<Vec<MissionItem>, MissionError> {
    check_len(waypoints.len())?;
    let items = waypoints
        .iter()
        .enumerate()
        .map(|(index, wp)| waypoint_item(index, wp))
        .collect::<Result<Vec<_>, _>>()?;
    inject_home(home_lat, home_lon, items)
}

/// Puts the synthetic home item in front of `items` and renumbers them
/// 1..=n in their given order. Sequence numbers already on the items
/// (e.g. from a planner file) are not trusted.
pub fn inject_home(
    home_lat: f64,
    home_lon: f64,
    items: Vec<MissionItem>,
) -> Result<Vec<MissionItem>, MissionError> {
    check_len(items.len())?;
    let mut out = Vec::with_capacity(items.len() + 1);
    out.push(MissionItem::home(home_lat, home_lon));
    for (k, mut item) in items.into_iter().enumerate() {
        item.seq = seq_of(k)?;
        out.push(item);
    }
    Ok(out)
}

/// Home takes seq 0, so at most `u16::MAX` items follow it.
fn check_len(n: usize) -> Result<(), MissionError> {
    if n > usize::from(u16::MAX) {
        return Err(MissionError::InvalidMissionFormat(format!(
            "{} waypoints, at most {} fit in one mission",
            n,
            u16::MAX
        )));
    }
    Ok(())
}

fn seq_of(index: usize) -> Result<u16, MissionError> {
    u16::try_from(index + 1)
        .map_err(|_| MissionError::InvalidMissionFormat(format!("waypoint {} has no sequence number", index)))
}

fn waypoint_item(index: usize, wp: &RawWaypoint) -> Result<MissionItem, MissionError> {
    let missing = |field: &str| {
        MissionError::InvalidMissionFormat(format!("waypoint {} is missing {}", index, field))
    };
    let latitude = wp.latitude.ok_or_else(|| missing("latitude"))?;
    let longitude = wp.longitude.ok_or_else(|| missing("longitude"))?;
    let altitude = wp.altitude.ok_or_else(|| missing("altitude"))?;

    let frame = match wp.altitude_type.as_deref().unwrap_or("relative") {
        "relative" => Frame::RelativeAltitude,
        "absolute" => Frame::Global,
        "terrain" => Frame::TerrainAltitude,
        other => {
            return Err(MissionError::InvalidAltitudeType { index, value: other.to_string() });
        }
    };

    let params = [
        wp.param1.or(wp.delay).unwrap_or(0.0),
        wp.param2.or(wp.radius).unwrap_or(0.0),
        wp.param3.unwrap_or(0.0),
        wp.param4.unwrap_or(0.0),
    ];
    let name = wp.command.as_deref().unwrap_or("waypoint");
    let command = MissionCommand::from_name(name, params).ok_or_else(|| {
        MissionError::UnsupportedCommand {
            location: format!("waypoint {}", index),
            command: name.to_string(),
        }
    })?;

    Ok(MissionItem {
        seq: seq_of(index)?,
        current: 0,
        autocontinue: 1,
        frame,
        command,
        latitude,
        longitude,
        altitude,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(v: serde_json::Value) -> Vec<RawWaypoint> {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn test_empty_mission_is_home_only() {
        let items = compile_at(37.0, 127.0, &[]).unwrap();
        assert_eq!(items.len(), 1);
        assert!(items[0].is_home());
        assert_eq!((items[0].latitude, items[0].longitude), (37.0, 127.0));
    }

    #[test]
    fn test_home_first_then_request_order() {
        let wps = raw(json!([
            {"latitude": 1.0, "longitude": 2.0, "altitude": 10.0},
            {"latitude": 3.0, "longitude": 4.0, "altitude": 20.0, "altitude_type": "terrain"},
            {"latitude": 5.0, "longitude": 6.0, "altitude": 30.0, "altitude_type": "absolute"},
        ]));
        let items = compile_at(9.0, 9.0, &wps).unwrap();
        assert_eq!(items.len(), 4);
        assert_eq!(items.iter().map(|i| i.seq).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
        assert_eq!(items[0].frame, Frame::Global);
        assert_eq!(items[1].frame, Frame::RelativeAltitude);
        assert_eq!(items[2].frame, Frame::TerrainAltitude);
        assert_eq!(items[3].frame, Frame::Global);
        assert_eq!(items[2].latitude, 3.0);
        assert_eq!(items[3].altitude, 30.0);
    }

    #[test]
    fn test_legacy_delay_and_radius() {
        let wps = raw(json!([{"latitude": 1.0, "longitude": 2.0, "altitude": 10.0, "delay": 5, "radius": 2}]));
        let items = compile_at(0.0, 0.0, &wps).unwrap();
        assert_eq!(
            items[1].command,
            MissionCommand::Waypoint { hold_s: 5.0, accept_radius_m: 2.0, pass_radius_m: 0.0, yaw_deg: 0.0 }
        );
        assert_eq!((items[1].current, items[1].autocontinue), (0, 1));
    }

    #[test]
    fn test_command_table() {
        let wps = raw(json!([
            {"latitude": 1.0, "longitude": 2.0, "altitude": 10.0, "command": "takeoff"},
            {"latitude": 1.0, "longitude": 2.0, "altitude": 0.0, "command": "do_set_servo", "param1": 9, "param2": 1900},
            {"latitude": 1.0, "longitude": 2.0, "altitude": 0.0, "command": "do_change_speed", "param2": 8},
            {"latitude": 1.0, "longitude": 2.0, "altitude": 0.0, "command": "land"},
        ]));
        let items = compile_at(0.0, 0.0, &wps).unwrap();
        assert_eq!(items[1].command.code(), 22);
        assert_eq!(items[2].command, MissionCommand::SetServo { channel: 9.0, pwm: 1900.0 });
        assert_eq!(items[3].command.params()[1], 8.0);
        assert_eq!(items[4].command.code(), 21);
    }

    #[test]
    fn test_missing_field_rejects_whole_batch() {
        let wps = raw(json!([
            {"latitude": 1.0, "longitude": 2.0, "altitude": 10.0},
            {"latitude": 1.0, "altitude": 10.0},
        ]));
        let err = compile_at(0.0, 0.0, &wps).unwrap_err();
        assert!(matches!(err, MissionError::InvalidMissionFormat(ref m) if m.contains("longitude")));
    }

    #[test]
    fn test_unknown_altitude_type() {
        let wps = raw(json!([{"latitude": 1.0, "longitude": 2.0, "altitude": 10.0, "altitude_type": "agl"}]));
        let err = compile_at(0.0, 0.0, &wps).unwrap_err();
        assert!(matches!(err, MissionError::InvalidAltitudeType { index: 0, .. }));
    }

    #[test]
    fn test_unknown_command_is_rejected() {
        let wps = raw(json!([{"latitude": 1.0, "longitude": 2.0, "altitude": 10.0, "command": "do_jump"}]));
        let err = compile_at(0.0, 0.0, &wps).unwrap_err();
        assert!(matches!(err, MissionError::UnsupportedCommand { ref command, .. } if command == "do_jump"));
    }

    #[test]
    fn test_inject_home_renumbers() {
        let mut a = MissionItem::home(1.0, 1.0);
        a.seq = 7;
        a.frame = Frame::RelativeAltitude;
        let out = inject_home(0.0, 0.0, vec![a.clone(), a]).unwrap();
        assert_eq!(out.iter().map(|i| i.seq).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn test_sequence_numbers_never_wrap() {
        let wp = raw(json!([{"latitude": 1.0, "longitude": 2.0, "altitude": 10.0}])).remove(0);

        let full = vec![wp.clone(); usize::from(u16::MAX)];
        let items = compile_at(0.0, 0.0, &full).unwrap();
        assert_eq!(items.last().map(|i| i.seq), Some(u16::MAX));

        let over = vec![wp; usize::from(u16::MAX) + 1];
        let err = compile_at(0.0, 0.0, &over).unwrap_err();
        assert!(matches!(err, MissionError::InvalidMissionFormat(ref m) if m.contains("at most 65535")));

        let err = inject_home(0.0, 0.0, vec![MissionItem::home(1.0, 1.0); 65_536]).unwrap_err();
        assert!(matches!(err, MissionError::InvalidMissionFormat(_)));
    }
}

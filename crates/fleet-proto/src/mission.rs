use serde::{Deserialize, Serialize};

/// MAV_CMD ids used by the mission model.
pub mod cmd {
    pub const NAV_WAYPOINT: u16 = 16;
    pub const NAV_LOITER_TIME: u16 = 19;
    pub const NAV_RETURN_TO_LAUNCH: u16 = 20;
    pub const NAV_LAND: u16 = 21;
    pub const NAV_TAKEOFF: u16 = 22;
    pub const DO_CHANGE_SPEED: u16 = 178;
    pub const DO_SET_SERVO: u16 = 183;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self { latitude, longitude, altitude }
    }
}

/// Altitude reference of a mission item.
///
/// `Global` is the absolute (sea-level) frame: both the synthetic home item
/// and `altitude_type = "absolute"` waypoints use it, the vehicle makes no
/// distinction between the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frame {
    Global,
    /// Position-less frame planners use for DO_* commands.
    Mission,
    RelativeAltitude,
    TerrainAltitude,
}

impl Frame {
    /// MAV_FRAME value.
    pub fn code(self) -> u8 {
        match self {
            Frame::Global => 0,
            Frame::Mission => 2,
            Frame::RelativeAltitude => 3,
            Frame::TerrainAltitude => 10,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Frame::Global),
            2 => Some(Frame::Mission),
            3 => Some(Frame::RelativeAltitude),
            10 => Some(Frame::TerrainAltitude),
            _ => None,
        }
    }
}

/// Mission command with only the parameters it uses.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MissionCommand {
    Waypoint {
        hold_s: f32,
        accept_radius_m: f32,
        pass_radius_m: f32,
        yaw_deg: f32,
    },
    Takeoff {
        pitch_deg: f32,
        yaw_deg: f32,
    },
    Land {
        abort_alt_m: f32,
        yaw_deg: f32,
    },
    SetServo {
        channel: f32,
        pwm: f32,
    },
    ChangeSpeed {
        speed_type: f32,
        speed_mps: f32,
        throttle_pct: f32,
    },
    ReturnToLaunch,
    LoiterTime {
        time_s: f32,
        heading_required: f32,
        radius_m: f32,
        xtrack: f32,
    },
    /// Any other MAV_CMD read back from a vehicle or planner file, kept
    /// verbatim so it can be written out again.
    Raw {
        code: u16,
        params: [f32; 4],
    },
}

impl MissionCommand {
    pub fn waypoint() -> Self {
        MissionCommand::Waypoint { hold_s: 0.0, accept_radius_m: 0.0, pass_radius_m: 0.0, yaw_deg: 0.0 }
    }

    /// Maps a mission request's `command` name, `params` being param1..4.
    /// Only the names operators send in JSON missions are accepted here.
    pub fn from_name(name: &str, params: [f32; 4]) -> Option<Self> {
        let code = match name {
            "waypoint" => cmd::NAV_WAYPOINT,
            "takeoff" => cmd::NAV_TAKEOFF,
            "land" => cmd::NAV_LAND,
            "do_set_servo" => cmd::DO_SET_SERVO,
            "do_change_speed" => cmd::DO_CHANGE_SPEED,
            _ => return None,
        };
        Self::known(code, params)
    }

    pub fn code(&self) -> u16 {
        match self {
            MissionCommand::Waypoint { .. } => cmd::NAV_WAYPOINT,
            MissionCommand::Takeoff { .. } => cmd::NAV_TAKEOFF,
            MissionCommand::Land { .. } => cmd::NAV_LAND,
            MissionCommand::SetServo { .. } => cmd::DO_SET_SERVO,
            MissionCommand::ChangeSpeed { .. } => cmd::DO_CHANGE_SPEED,
            MissionCommand::ReturnToLaunch => cmd::NAV_RETURN_TO_LAUNCH,
            MissionCommand::LoiterTime { .. } => cmd::NAV_LOITER_TIME,
            MissionCommand::Raw { code, .. } => *code,
        }
    }

    /// param1..4 as sent on the wire. Unused slots are zero.
    pub fn params(&self) -> [f32; 4] {
        match *self {
            MissionCommand::Waypoint { hold_s, accept_radius_m, pass_radius_m, yaw_deg } => {
                [hold_s, accept_radius_m, pass_radius_m, yaw_deg]
            }
            MissionCommand::Takeoff { pitch_deg, yaw_deg } => [pitch_deg, 0.0, 0.0, yaw_deg],
            MissionCommand::Land { abort_alt_m, yaw_deg } => [abort_alt_m, 0.0, 0.0, yaw_deg],
            MissionCommand::SetServo { channel, pwm } => [channel, pwm, 0.0, 0.0],
            MissionCommand::ChangeSpeed { speed_type, speed_mps, throttle_pct } => {
                [speed_type, speed_mps, throttle_pct, 0.0]
            }
            MissionCommand::ReturnToLaunch => [0.0; 4],
            MissionCommand::LoiterTime { time_s, heading_required, radius_m, xtrack } => {
                [time_s, heading_required, radius_m, xtrack]
            }
            MissionCommand::Raw { params, .. } => params,
        }
    }

    /// Rebuilds a command from its MAV_CMD id and param1..4. Parameters a
    /// known command does not use are dropped; unknown ids become `Raw`.
    pub fn from_wire(code: u16, p: [f32; 4]) -> Self {
        Self::known(code, p).unwrap_or(MissionCommand::Raw { code, params: p })
    }

    fn known(code: u16, p: [f32; 4]) -> Option<Self> {
        let c = match code {
            cmd::NAV_WAYPOINT => MissionCommand::Waypoint {
                hold_s: p[0],
                accept_radius_m: p[1],
                pass_radius_m: p[2],
                yaw_deg: p[3],
            },
            cmd::NAV_TAKEOFF => MissionCommand::Takeoff { pitch_deg: p[0], yaw_deg: p[3] },
            cmd::NAV_LAND => MissionCommand::Land { abort_alt_m: p[0], yaw_deg: p[3] },
            cmd::DO_SET_SERVO => MissionCommand::SetServo { channel: p[0], pwm: p[1] },
            cmd::DO_CHANGE_SPEED => MissionCommand::ChangeSpeed {
                speed_type: p[0],
                speed_mps: p[1],
                throttle_pct: p[2],
            },
            cmd::NAV_RETURN_TO_LAUNCH => MissionCommand::ReturnToLaunch,
            cmd::NAV_LOITER_TIME => MissionCommand::LoiterTime {
                time_s: p[0],
                heading_required: p[1],
                radius_m: p[2],
                xtrack: p[3],
            },
            _ => return None,
        };
        Some(c)
    }
}

/// One entry of a vehicle's onboard command store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionItem {
    pub seq: u16,
    pub current: u8,
    pub autocontinue: u8,
    pub frame: Frame,
    pub command: MissionCommand,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

impl MissionItem {
    /// Synthetic home item: seq 0, global frame, zero altitude.
    pub fn home(latitude: f64, longitude: f64) -> Self {
        Self {
            seq: 0,
            current: 0,
            autocontinue: 1,
            frame: Frame::Global,
            command: MissionCommand::waypoint(),
            latitude,
            longitude,
            altitude: 0.0,
        }
    }

    pub fn is_home(&self) -> bool {
        self.seq == 0 && self.frame == Frame::Global && matches!(self.command, MissionCommand::Waypoint { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_commands_map_to_mav_ids() {
        let p = [0.0; 4];
        assert_eq!(MissionCommand::from_name("waypoint", p).map(|c| c.code()), Some(16));
        assert_eq!(MissionCommand::from_name("takeoff", p).map(|c| c.code()), Some(22));
        assert_eq!(MissionCommand::from_name("land", p).map(|c| c.code()), Some(21));
        assert_eq!(MissionCommand::from_name("do_set_servo", p).map(|c| c.code()), Some(183));
        assert_eq!(MissionCommand::from_name("do_change_speed", p).map(|c| c.code()), Some(178));
        assert!(MissionCommand::from_name("do_jump", p).is_none());
    }

    #[test]
    fn test_unused_params_are_dropped() {
        let c = MissionCommand::from_wire(cmd::DO_SET_SERVO, [9.0, 1900.0, 4.0, 5.0]);
        assert_eq!(c, MissionCommand::SetServo { channel: 9.0, pwm: 1900.0 });
        assert_eq!(c.params(), [9.0, 1900.0, 0.0, 0.0]);
    }

    #[test]
    fn test_unknown_wire_command_kept_raw() {
        // DO_JUMP: target seq 2, repeat 3
        let c = MissionCommand::from_wire(177, [2.0, 3.0, 0.0, 0.0]);
        assert_eq!(c, MissionCommand::Raw { code: 177, params: [2.0, 3.0, 0.0, 0.0] });
        assert_eq!(c.code(), 177);
        assert_eq!(c.params(), [2.0, 3.0, 0.0, 0.0]);
        assert!(MissionCommand::from_name("raw", [0.0; 4]).is_none());
    }

    #[test]
    fn test_frame_codes() {
        for f in [Frame::Global, Frame::Mission, Frame::RelativeAltitude, Frame::TerrainAltitude] {
            assert_eq!(Frame::from_code(f.code()), Some(f));
        }
        assert_eq!(Frame::from_code(6), None);
    }

    #[test]
    fn test_home_item_shape() {
        let h = MissionItem::home(37.5, 127.0);
        assert!(h.is_home());
        assert_eq!(h.altitude, 0.0);
        assert_eq!(h.autocontinue, 1);
    }
}

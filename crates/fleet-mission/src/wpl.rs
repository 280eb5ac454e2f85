//! Planner mission files (`QGC WPL 110`).
//!
//! ```text
//! QGC WPL 110
//! 0	1	0	16	0	0	0	0	37.56	126.97	0	1      <- home, skipped
//! 1	0	3	16	0	2	0	0	37.57	126.98	20	1
//! ```
//!
//! Data columns: index, current, frame, command, param1-4, lat, lon, alt,
//! autocontinue. Parsing is all-or-nothing.

use fleet_proto::{Frame, MissionCommand, MissionItem};
use std::io::BufRead;

use crate::error::MissionError;

pub const WPL_HEADER: &str = "QGC WPL 110";

const FIELD_NAMES: [&str; 12] = [
    "index", "current", "frame", "command", "param1", "param2", "param3", "param4", "latitude",
    "longitude", "altitude", "autocontinue",
];

/// Parses a waypoint file. The second line is always skipped: home comes
/// from the vehicle's position when the mission is compiled.
pub fn parse<R: BufRead>(reader: R) -> Result<Vec<MissionItem>, MissionError> {
    let mut lines = reader.lines();

    let header = lines.next().transpose()?.unwrap_or_default();
    if !header.starts_with(WPL_HEADER) {
        return Err(MissionError::UnsupportedFileVersion { found: header.trim_end().to_string() });
    }
    // home line
    lines.next().transpose()?;

    let mut items = Vec::new();
    for (i, line) in lines.enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        // 1-based, counting the two leading lines
        items.push(parse_line(i + 3, &line)?);
    }
    Ok(items)
}

pub fn parse_bytes(bytes: &[u8]) -> Result<Vec<MissionItem>, MissionError> {
    parse(bytes)
}

fn parse_line(line_no: usize, line: &str) -> Result<MissionItem, MissionError> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() != FIELD_NAMES.len() {
        return Err(MissionError::InvalidMissionFormat(format!(
            "line {}: expected {} tab-separated fields, found {}",
            line_no,
            FIELD_NAMES.len(),
            fields.len()
        )));
    }

    let field = |i: usize| column(&fields, i);

    let seq: u16 = num(line_no, field(0))?;
    let current: u8 = num(line_no, field(1))?;
    let frame_code: u8 = num(line_no, field(2))?;
    let command_code: u16 = num(line_no, field(3))?;
    let params = [
        num::<f32>(line_no, field(4))?,
        num::<f32>(line_no, field(5))?,
        num::<f32>(line_no, field(6))?,
        num::<f32>(line_no, field(7))?,
    ];
    let latitude: f64 = num(line_no, field(8))?;
    let longitude: f64 = num(line_no, field(9))?;
    let altitude: f64 = num(line_no, field(10))?;
    let autocontinue: u8 = num(line_no, field(11))?;

    let frame = Frame::from_code(frame_code)
        .ok_or(MissionError::UnsupportedFrame { line: line_no, code: frame_code })?;
    let command = MissionCommand::from_wire(command_code, params);

    Ok(MissionItem { seq, current, autocontinue, frame, command, latitude, longitude, altitude })
}

fn column<'a>(fields: &[&'a str], i: usize) -> (&'a str, &'static str) {
    // trailing whitespace/CR only trimmed on the last column
    let text = if i == FIELD_NAMES.len() - 1 { fields[i].trim_end() } else { fields[i] };
    (text, FIELD_NAMES[i])
}

fn num<T: std::str::FromStr>(line: usize, (text, name): (&str, &'static str)) -> Result<T, MissionError> {
    text.parse().map_err(|_| MissionError::Parse { line, name, text: text.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "QGC WPL 110\n\
        0\t1\t0\t16\t0\t0\t0\t0\t37.5665\t126.978\t38.1\t1\n\
        1\t0\t3\t22\t0\t0\t0\t0\t37.5665\t126.978\t15\t1\n\
        2\t0\t3\t16\t3\t2\t0\t0\t37.5670\t126.979\t20\t1\n\
        3\t0\t2\t183\t9\t1900\t0\t0\t0\t0\t0\t1\r\n\
        4\t0\t3\t21\t0\t0\t0\t0\t37.5665\t126.978\t0\t1\n";

    #[test]
    fn test_parse_sample_skips_home_line() {
        let items = parse_bytes(SAMPLE.as_bytes()).unwrap();
        assert_eq!(items.len(), 4);
        assert_eq!(items[0].command, MissionCommand::Takeoff { pitch_deg: 0.0, yaw_deg: 0.0 });
        assert_eq!(items[0].altitude, 15.0);
        assert_eq!(
            items[1].command,
            MissionCommand::Waypoint { hold_s: 3.0, accept_radius_m: 2.0, pass_radius_m: 0.0, yaw_deg: 0.0 }
        );
        assert_eq!(items[2].frame, Frame::Mission);
        assert_eq!(items[2].autocontinue, 1);
        assert_eq!(items[3].seq, 4);
    }

    #[test]
    fn test_wrong_header() {
        let err = parse_bytes(b"QGC WPL 100\n").unwrap_err();
        assert!(matches!(err, MissionError::UnsupportedFileVersion { ref found } if found == "QGC WPL 100"));
        assert!(matches!(parse_bytes(b"").unwrap_err(), MissionError::UnsupportedFileVersion { .. }));
    }

    #[test]
    fn test_header_is_prefix_match() {
        let items = parse_bytes(b"QGC WPL 110 generated\nhome\n").unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn test_bad_number_fails_whole_file() {
        let text = "QGC WPL 110\nhome\n\
            1\t0\t3\t16\t0\t0\t0\t0\t37.5\t126.9\t20\t1\n\
            2\t0\t3\t16\t0\t0\t0\t0\tnorth\t126.9\t20\t1\n";
        let err = parse_bytes(text.as_bytes()).unwrap_err();
        assert!(matches!(err, MissionError::Parse { line: 4, name: "latitude", .. }));
    }

    #[test]
    fn test_field_count_enforced() {
        let text = "QGC WPL 110\nhome\n1\t0\t3\t16\t0\t0\t0\t0\t37.5\t126.9\t20\n";
        assert!(matches!(parse_bytes(text.as_bytes()).unwrap_err(), MissionError::InvalidMissionFormat(_)));
    }

    #[test]
    fn test_unknown_command_code_kept_verbatim() {
        let text = "QGC WPL 110\nhome\n1\t0\t2\t177\t2\t1\t0\t0\t0\t0\t0\t1\n";
        let items = parse_bytes(text.as_bytes()).unwrap();
        assert_eq!(items[0].command, MissionCommand::Raw { code: 177, params: [2.0, 1.0, 0.0, 0.0] });
    }
}

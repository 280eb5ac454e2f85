//! ArduCopter custom mode numbers.

const COPTER_MODES: &[(&str, u32)] = &[
    ("STABILIZE", 0),
    ("ACRO", 1),
    ("ALT_HOLD", 2),
    ("AUTO", 3),
    ("GUIDED", 4),
    ("LOITER", 5),
    ("RTL", 6),
    ("CIRCLE", 7),
    ("LAND", 9),
    ("DRIFT", 11),
    ("SPORT", 13),
    ("FLIP", 14),
    ("AUTOTUNE", 15),
    ("POSHOLD", 16),
    ("BRAKE", 17),
    ("THROW", 18),
    ("AVOID_ADSB", 19),
    ("GUIDED_NOGPS", 20),
    ("SMART_RTL", 21),
];

pub fn copter_mode_number(name: &str) -> Option<u32> {
    COPTER_MODES.iter().find(|(n, _)| n.eq_ignore_ascii_case(name)).map(|(_, v)| *v)
}

pub fn copter_mode_name(number: u32) -> Option<&'static str> {
    COPTER_MODES.iter().find(|(_, v)| *v == number).map(|(n, _)| *n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guided_and_land() {
        assert_eq!(copter_mode_number("GUIDED"), Some(4));
        assert_eq!(copter_mode_number("land"), Some(9));
        assert_eq!(copter_mode_name(4), Some("GUIDED"));
    }

    #[test]
    fn test_gaps_are_unknown() {
        assert_eq!(copter_mode_name(8), None);
        assert_eq!(copter_mode_number("HOVER"), None);
    }
}

use crate::transfer::TransferPhase;

#[derive(Debug, thiserror::Error)]
pub enum MissionError {
    #[error("invalid mission format: {0}")]
    InvalidMissionFormat(String),

    #[error("invalid altitude type {value:?} at waypoint {index}")]
    InvalidAltitudeType { index: usize, value: String },

    #[error("unsupported mission command {command} ({location})")]
    UnsupportedCommand { location: String, command: String },

    #[error("unsupported waypoint file version: {found:?}")]
    UnsupportedFileVersion { found: String },

    #[error("line {line}: unsupported frame {code}")]
    UnsupportedFrame { line: usize, code: u8 },

    #[error("line {line}: cannot parse {name} from {text:?}")]
    Parse { line: usize, name: &'static str, text: String },

    #[error("read waypoint file")]
    Io(#[from] std::io::Error),

    /// The command store may be left cleared but not repopulated; the
    /// operator has to upload again.
    #[error("mission transfer failed while {phase}")]
    Transfer {
        phase: TransferPhase,
        #[source]
        source: anyhow::Error,
    },
}

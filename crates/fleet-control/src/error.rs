use fleet_mission::MissionError;

/// Every failure the fleet layer reports. [`FleetError::kind`] gives the
/// stable name callers map responses from.
#[derive(Debug, thiserror::Error)]
pub enum FleetError {
    #[error("drone {0} is already connected")]
    AlreadyConnected(String),

    #[error("drone {0} is not connected")]
    NotConnected(String),

    #[error("{0}")]
    PreconditionFailed(String),

    #[error("{op} did not converge after {attempts} polls")]
    Timeout { op: String, attempts: u32 },

    #[error("unsupported command {0}")]
    UnsupportedCommand(String),

    #[error("{op} failed")]
    Link {
        op: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Mission(#[from] MissionError),

    #[error("mission storage")]
    Storage(#[source] std::io::Error),
}

impl FleetError {
    pub fn link(op: impl Into<String>, source: anyhow::Error) -> Self {
        FleetError::Link { op: op.into(), source }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FleetError::AlreadyConnected(_) => "already_connected",
            FleetError::NotConnected(_) => "not_connected",
            FleetError::PreconditionFailed(_) => "precondition_failed",
            FleetError::Timeout { .. } => "timeout",
            FleetError::UnsupportedCommand(_) => "unsupported_command",
            FleetError::Link { .. } => "link_error",
            FleetError::Storage(_) => "storage_error",
            FleetError::Mission(m) => match m {
                MissionError::InvalidMissionFormat(_) => "invalid_mission_format",
                MissionError::InvalidAltitudeType { .. } => "invalid_altitude_type",
                MissionError::UnsupportedCommand { .. } => "unsupported_command",
                MissionError::UnsupportedFileVersion { .. } => "unsupported_file_version",
                // Io only comes from reading an uploaded file's bytes, i.e. bad UTF-8
                MissionError::UnsupportedFrame { .. } | MissionError::Parse { .. } | MissionError::Io(_) => {
                    "invalid_mission_format"
                }
                MissionError::Transfer { .. } => "link_error",
            },
        }
    }
}

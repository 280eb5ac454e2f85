use std::path::{Path, PathBuf};
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::info;

use crate::error::FleetError;

/// Extension that makes an ingested file a mission.
pub const MISSION_EXT: &str = ".waypoints";

#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// Kept on disk only.
    Stored { path: PathBuf },
    /// Kept on disk, parsed and uploaded.
    Uploaded { path: PathBuf, items: usize },
}

/// Directory that keeps every uploaded mission file verbatim.
#[derive(Debug, Clone)]
pub struct MissionStore {
    dir: PathBuf,
}

impl MissionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `YYYYMMDD_HHMMSS_mission<ext>` in UTC.
    pub fn file_name(at: OffsetDateTime, extension: &str) -> String {
        let fmt = format_description!("[year][month][day]_[hour][minute][second]");
        let stamp = at
            .to_offset(time::UtcOffset::UTC)
            .format(&fmt)
            .unwrap_or_else(|_| at.unix_timestamp().to_string());
        format!("{}_mission{}", stamp, normalize_ext(extension))
    }

    pub async fn save(&self, bytes: &[u8], extension: &str) -> Result<PathBuf, FleetError> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(FleetError::Storage)?;
        let path = self.dir.join(Self::file_name(OffsetDateTime::now_utc(), extension));
        tokio::fs::write(&path, bytes).await.map_err(FleetError::Storage)?;
        info!("stored {} bytes as {}", bytes.len(), path.display());
        Ok(path)
    }
}

/// `waypoints`, `.waypoints` and `.WayPoints` are all the same extension.
pub fn normalize_ext(extension: &str) -> String {
    let ext = extension.trim();
    if ext.is_empty() || ext.starts_with('.') {
        ext.to_string()
    } else {
        format!(".{}", ext)
    }
}

pub fn is_mission_ext(extension: &str) -> bool {
    normalize_ext(extension).eq_ignore_ascii_case(MISSION_EXT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_file_name_format() {
        let at = datetime!(2024-03-07 09:05:02 UTC);
        assert_eq!(MissionStore::file_name(at, ".waypoints"), "20240307_090502_mission.waypoints");
        assert_eq!(MissionStore::file_name(at, "plan"), "20240307_090502_mission.plan");
        assert_eq!(MissionStore::file_name(at, ""), "20240307_090502_mission");
    }

    #[test]
    fn test_file_name_is_utc() {
        let at = datetime!(2024-03-07 18:05:02 +09:00);
        assert_eq!(MissionStore::file_name(at, ".txt"), "20240307_090502_mission.txt");
    }

    #[test]
    fn test_mission_extension() {
        assert!(is_mission_ext(".waypoints"));
        assert!(is_mission_ext("waypoints"));
        assert!(is_mission_ext(".WayPoints"));
        assert!(!is_mission_ext(".plan"));
        assert!(!is_mission_ext(".waypoints.bak"));
    }

    #[tokio::test]
    async fn test_save_writes_bytes() {
        let dir = std::env::temp_dir().join(format!("fleet-store-{}", std::process::id()));
        let store = MissionStore::new(&dir);
        let path = store.save(b"hello", "txt").await.unwrap();
        assert!(path.starts_with(&dir));
        assert!(path.to_string_lossy().ends_with("_mission.txt"));
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"hello");
        let _ = std::fs::remove_dir_all(&dir);
    }
}

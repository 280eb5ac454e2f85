use anyhow::Result;
use fleet_link::LinkConfig;
use std::path::Path;

use crate::{ControlConfig, StorageConfig};

pub fn check_link(cfg: &LinkConfig) -> Result<()> {
    anyhow::ensure!(cfg.source_system > 0, "link.source_system must be non-zero");
    anyhow::ensure!(cfg.source_component > 0, "link.source_component must be non-zero");
    anyhow::ensure!(cfg.target_component > 0, "link.target_component must be non-zero");
    anyhow::ensure!(cfg.stream_rate_hz >= 1 && cfg.stream_rate_hz <= 50, "link.stream_rate_hz should be 1..50");
    anyhow::ensure!(
        cfg.heartbeat_interval_ms >= 100 && cfg.heartbeat_interval_ms <= 5000,
        "link.heartbeat_interval_ms should be 100..5000"
    );
    anyhow::ensure!(cfg.mission_timeout_ms >= 250, "link.mission_timeout_ms too small; set >= 250");
    Ok(())
}

pub fn check_control(cfg: &ControlConfig) -> Result<()> {
    anyhow::ensure!(cfg.poll_interval_ms >= 10, "control.poll_interval_ms too small; set >= 10");
    anyhow::ensure!(cfg.poll_interval_ms <= 10_000, "control.poll_interval_ms too large");
    Ok(())
}

pub fn check_storage(cfg: &StorageConfig) -> Result<()> {
    anyhow::ensure!(!cfg.mission_dir.trim().is_empty(), "storage.mission_dir is empty");
    let p = Path::new(&cfg.mission_dir);
    if p.exists() {
        anyhow::ensure!(p.is_dir(), "storage.mission_dir is not a dir: {}", cfg.mission_dir);
        let meta = std::fs::metadata(p)?;
        anyhow::ensure!(!meta.permissions().readonly(), "storage.mission_dir is read-only: {}", cfg.mission_dir);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_pass() {
        check_link(&LinkConfig::default()).unwrap();
        check_control(&ControlConfig::default()).unwrap();
    }

    #[test]
    fn test_zero_ids_rejected() {
        let cfg = LinkConfig { source_system: 0, ..Default::default() };
        let err = check_link(&cfg).unwrap_err();
        assert!(err.to_string().contains("source_system"));
    }

    #[test]
    fn test_unbounded_mode_wait_allowed() {
        check_control(&ControlConfig { poll_interval_ms: 500, mode_max_attempts: 0 }).unwrap();
        assert!(check_control(&ControlConfig { poll_interval_ms: 0, mode_max_attempts: 0 }).is_err());
    }

    #[test]
    fn test_storage_must_be_dir() {
        let file = std::env::temp_dir().join(format!("fleet-doctor-{}", std::process::id()));
        std::fs::write(&file, b"x").unwrap();
        let cfg = StorageConfig { mission_dir: file.to_string_lossy().into_owned() };
        assert!(check_storage(&cfg).is_err());
        let _ = std::fs::remove_file(&file);
        assert!(check_storage(&StorageConfig { mission_dir: " ".into() }).is_err());
    }
}

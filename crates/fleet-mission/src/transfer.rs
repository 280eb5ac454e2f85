use fleet_link::CommandQueue;
use fleet_proto::MissionItem;
use std::fmt;
use tracing::{debug, info, warn};

use crate::error::MissionError;

/// Where a mission transfer is.
///
/// Upload: `Idle → Clearing → HomeUploading → Cleared → PopulatingQueue →
/// FinalUploading → Done`. Download: `Idle → Downloading → WaitingReady →
/// Done`. Any step can end in `Failed`, which is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferPhase {
    Idle,
    Clearing,
    HomeUploading,
    Cleared,
    PopulatingQueue,
    FinalUploading,
    Downloading,
    WaitingReady,
    Done,
    Failed,
}

impl fmt::Display for TransferPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransferPhase::Idle => "idle",
            TransferPhase::Clearing => "clearing the command store",
            TransferPhase::HomeUploading => "pre-uploading home",
            TransferPhase::Cleared => "cleared",
            TransferPhase::PopulatingQueue => "queueing items",
            TransferPhase::FinalUploading => "uploading the mission",
            TransferPhase::Downloading => "downloading the mission",
            TransferPhase::WaitingReady => "waiting for the download",
            TransferPhase::Done => "done",
            TransferPhase::Failed => "failed",
        };
        f.write_str(s)
    }
}

struct Progress {
    phase: TransferPhase,
}

impl Progress {
    fn new() -> Self {
        Self { phase: TransferPhase::Idle }
    }

    fn enter(&mut self, next: TransferPhase) {
        debug!("mission transfer: {:?} -> {:?}", self.phase, next);
        self.phase = next;
    }

    fn check<T>(&mut self, r: anyhow::Result<T>) -> Result<T, MissionError> {
        r.map_err(|source| {
            let phase = self.phase;
            self.phase = TransferPhase::Failed;
            warn!("mission transfer failed while {}: {:#}", phase, source);
            MissionError::Transfer { phase, source }
        })
    }
}

/// Replaces the vehicle's mission with `items`, which must start with the
/// home item at seq 0 (see [`crate::compile`]).
///
/// Home is committed alone first and the store cleared again before the full
/// set goes up: some autopilot firmware refuses a bulk replace until one item
/// has been committed. No step is retried and nothing is rolled back; after
/// a failure the store is in an unknown state and must be cleared and
/// uploaded again.
pub fn upload<Q>(queue: &mut Q, items: &[MissionItem]) -> Result<(), MissionError>
where
    Q: CommandQueue + ?Sized,
{
    let home = match items.first() {
        Some(h) if h.is_home() => h.clone(),
        _ => {
            return Err(MissionError::InvalidMissionFormat(
                "compiled mission must start with the home item".into(),
            ))
        }
    };

    let mut p = Progress::new();

    p.enter(TransferPhase::Clearing);
    p.check(queue.clear())?;
    p.check(queue.upload())?;

    p.enter(TransferPhase::HomeUploading);
    p.check(queue.add(home))?;
    p.check(queue.upload())?;
    p.check(queue.clear())?;
    p.enter(TransferPhase::Cleared);

    p.enter(TransferPhase::PopulatingQueue);
    for item in items {
        p.check(queue.add(item.clone()))?;
    }

    p.enter(TransferPhase::FinalUploading);
    p.check(queue.upload())?;

    p.enter(TransferPhase::Done);
    info!("mission upload: {} items committed (home + {})", items.len(), items.len() - 1);
    Ok(())
}

/// Reads the vehicle's mission back, keeping the vehicle's own sequence
/// numbers and flags.
pub fn download<Q>(queue: &mut Q) -> Result<Vec<MissionItem>, MissionError>
where
    Q: CommandQueue + ?Sized,
{
    let mut p = Progress::new();

    p.enter(TransferPhase::Downloading);
    p.check(queue.download())?;

    p.enter(TransferPhase::WaitingReady);
    p.check(queue.wait_ready())?;

    let items = queue.items();
    p.enter(TransferPhase::Done);
    info!("mission download: {} items", items.len());
    Ok(items)
}

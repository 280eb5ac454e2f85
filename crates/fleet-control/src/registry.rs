//! Live vehicle sessions by fleet id.

use fleet_link::{Connector, VehicleSession};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{Mutex as SessionLock, MutexGuard as SessionGuard};
use tracing::{info, warn};

use crate::error::FleetError;

type Shared = Arc<SessionLock<Box<dyn VehicleSession>>>;

/// One registered session. Every controller or transfer operation holds the
/// session lock for its whole duration, so operations on one drone never
/// interleave.
#[derive(Clone)]
pub struct SessionHandle {
    id: String,
    session: Shared,
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle").field("id", &self.id).finish_non_exhaustive()
    }
}

impl SessionHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn lock(&self) -> SessionGuard<'_, Box<dyn VehicleSession>> {
        self.session.lock().await
    }

    /// Runs `f` on the blocking pool with the session locked until it
    /// returns. For calls that wait on the link (mission exchanges, close).
    pub async fn blocking<T, F>(&self, op: &str, f: F) -> Result<T, FleetError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Box<dyn VehicleSession>) -> Result<T, FleetError> + Send + 'static,
    {
        let mut guard = self.session.clone().lock_owned().await;
        tokio::task::spawn_blocking(move || f(&mut *guard))
            .await
            .map_err(|e| FleetError::link(op, e.into()))?
    }
}

#[derive(Default)]
struct Entries {
    /// Insertion order is what `list` reports.
    sessions: Vec<(String, Shared)>,
    /// Ids with a connect in flight.
    pending: HashSet<String>,
}

impl Entries {
    fn find(&self, id: &str) -> Option<&Shared> {
        self.sessions.iter().find(|(k, _)| k == id).map(|(_, s)| s)
    }
}

pub struct SessionRegistry {
    connector: Arc<dyn Connector>,
    entries: Mutex<Entries>,
}

/// Holds an id in the pending set until the connect attempt finishes,
/// whichever way it ends.
struct Reservation<'a> {
    registry: &'a SessionRegistry,
    id: String,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        self.registry.entries().pending.remove(&self.id);
    }
}

impl SessionRegistry {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self { connector, entries: Mutex::new(Entries::default()) }
    }

    fn entries(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reserve(&self, id: &str) -> Result<Reservation<'_>, FleetError> {
        let mut e = self.entries();
        if e.find(id).is_some() || e.pending.contains(id) {
            return Err(FleetError::AlreadyConnected(id.to_string()));
        }
        e.pending.insert(id.to_string());
        Ok(Reservation { registry: self, id: id.to_string() })
    }

    /// Opens a session and registers it under `id`.
    ///
    /// Waits as long as the connector's readiness contract says; with an
    /// unbounded link readiness timeout an unresponsive vehicle blocks this
    /// call (other ids are unaffected).
    pub async fn register(&self, id: &str, connection_string: &str) -> Result<SessionHandle, FleetError> {
        let _reserved = self.reserve(id)?;
        info!("drone {}: connecting via {}", id, connection_string);

        let connector = self.connector.clone();
        let conn = connection_string.to_string();
        let session = tokio::task::spawn_blocking(move || connector.open(&conn))
            .await
            .map_err(|e| FleetError::link("connect", e.into()))?
            .map_err(|e| {
                warn!("drone {}: connect failed: {:#}", id, e);
                FleetError::link("connect", e)
            })?;

        let handle = SessionHandle { id: id.to_string(), session: Arc::new(SessionLock::new(session)) };
        self.entries().sessions.push((id.to_string(), handle.session.clone()));
        info!("drone {}: connected", id);
        Ok(handle)
    }

    pub fn lookup(&self, id: &str) -> Result<SessionHandle, FleetError> {
        self.entries()
            .find(id)
            .map(|s| SessionHandle { id: id.to_string(), session: s.clone() })
            .ok_or_else(|| FleetError::NotConnected(id.to_string()))
    }

    /// Removes `id` and closes its session. The entry is gone even when the
    /// close itself fails; the failure is still reported.
    pub async fn unregister(&self, id: &str) -> Result<(), FleetError> {
        let session = {
            let mut e = self.entries();
            let pos = e
                .sessions
                .iter()
                .position(|(k, _)| k == id)
                .ok_or_else(|| FleetError::NotConnected(id.to_string()))?;
            e.sessions.remove(pos).1
        };

        // waits out any operation still running on this session
        let handle = SessionHandle { id: id.to_string(), session };
        handle
            .blocking("disconnect", |s| s.close().map_err(|e| FleetError::link("disconnect", e)))
            .await?;
        info!("drone {}: disconnected", id);
        Ok(())
    }

    pub fn list(&self) -> Vec<String> {
        self.entries().sessions.iter().map(|(k, _)| k.clone()).collect()
    }

    /// Unregisters everything, newest first. Close failures are logged and
    /// the rest are still closed.
    pub async fn close_all(&self) {
        for id in self.list().into_iter().rev() {
            if let Err(e) = self.unregister(&id).await {
                warn!("drone {}: {:#}", id, anyhow::Error::new(e));
            }
        }
    }
}

//! Fleet operations keyed by drone id.
//!
//! Every operation looks the drone up first and fails with
//! [`FleetError::NotConnected`] before touching any session, then holds the
//! drone's session lock until it returns.

use fleet_link::{Connector, VehicleSession};
use fleet_mission::{compile, download, inject_home, upload, wpl};
use fleet_proto::{GeoPoint, HomeRequest, MissionItem, RawWaypoint, TelemetrySnapshot};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::FleetError;
use crate::ingest::{is_mission_ext, IngestOutcome, MissionStore};
use crate::poll::{poll_until, PollPolicy};
use crate::registry::{SessionHandle, SessionRegistry};

const GUIDED: &str = "GUIDED";
const LAND: &str = "LAND";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeChange {
    /// Already in the requested mode; nothing was sent.
    AlreadyInMode,
    Changed,
}

pub struct FleetController {
    registry: SessionRegistry,
    poll: PollPolicy,
    store: MissionStore,
}

impl FleetController {
    pub fn new(connector: Arc<dyn Connector>, poll: PollPolicy, store: MissionStore) -> Self {
        Self { registry: SessionRegistry::new(connector), poll, store }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    fn session(&self, id: &str) -> Result<SessionHandle, FleetError> {
        self.registry.lookup(id)
    }

    pub async fn connect(&self, id: &str, connection_string: &str) -> Result<(), FleetError> {
        self.registry.register(id, connection_string).await.map(|_| ())
    }

    pub async fn disconnect(&self, id: &str) -> Result<(), FleetError> {
        self.registry.unregister(id).await
    }

    pub fn list(&self) -> Vec<String> {
        self.registry.list()
    }

    /// Disconnects every drone.
    pub async fn shutdown(&self) {
        self.registry.close_all().await;
    }

    pub async fn arm(&self, id: &str) -> Result<(), FleetError> {
        self.set_armed(id, true).await
    }

    pub async fn disarm(&self, id: &str) -> Result<(), FleetError> {
        self.set_armed(id, false).await
    }

    async fn set_armed(&self, id: &str, armed: bool) -> Result<(), FleetError> {
        let handle = self.session(id)?;
        let op = if armed { "arm" } else { "disarm" };
        let mut s = handle.lock().await;
        s.set_armed(armed).map_err(|e| FleetError::link(op, e))?;
        info!("drone {}: {}", id, op);
        Ok(())
    }

    /// Takes off to `altitude_m` above home. The drone must already be
    /// armed; it is switched to GUIDED first if needed. Does not wait for
    /// the climb.
    pub async fn take_off(&self, id: &str, altitude_m: f32) -> Result<(), FleetError> {
        let handle = self.session(id)?;
        let mut s = handle.lock().await;
        if !s.state().armed {
            return Err(FleetError::PreconditionFailed(format!(
                "drone {} must be armed before takeoff",
                id
            )));
        }
        self.converge_mode(id, &mut **s, GUIDED).await?;
        s.takeoff(altitude_m).map_err(|e| FleetError::link("takeoff", e))?;
        info!("drone {}: takeoff to {} m", id, altitude_m);
        Ok(())
    }

    /// GUIDED first, then LAND. Does not wait for touchdown.
    pub async fn land(&self, id: &str) -> Result<(), FleetError> {
        let handle = self.session(id)?;
        let mut s = handle.lock().await;
        self.converge_mode(id, &mut **s, GUIDED).await?;
        s.set_mode(LAND).map_err(|e| FleetError::link("land", e))?;
        info!("drone {}: landing", id);
        Ok(())
    }

    pub async fn change_mode(&self, id: &str, mode: &str) -> Result<ModeChange, FleetError> {
        let handle = self.session(id)?;
        let mut s = handle.lock().await;
        self.converge_mode(id, &mut **s, &mode.to_ascii_uppercase()).await
    }

    /// Direct goto in GUIDED, altitude relative to home. Does not wait for
    /// arrival.
    pub async fn fly_to(&self, id: &str, target: GeoPoint) -> Result<(), FleetError> {
        let handle = self.session(id)?;
        let mut s = handle.lock().await;
        self.converge_mode(id, &mut **s, GUIDED).await?;
        s.goto(target).map_err(|e| FleetError::link("goto", e))?;
        info!(
            "drone {}: goto {:.7},{:.7} alt {} m",
            id, target.latitude, target.longitude, target.altitude
        );
        Ok(())
    }

    async fn converge_mode(
        &self,
        id: &str,
        session: &mut dyn VehicleSession,
        mode: &str,
    ) -> Result<ModeChange, FleetError> {
        let current = session.state().mode;
        if current == mode {
            debug!("drone {}: already in {}", id, mode);
            return Ok(ModeChange::AlreadyInMode);
        }
        info!("drone {}: mode {} -> {}", id, current, mode);
        session
            .set_mode(mode)
            .map_err(|e| FleetError::link(format!("set mode {}", mode), e))?;
        let op = format!("drone {} mode change to {}", id, mode);
        poll_until(&self.poll, &op, session, |s| s.state().mode == mode).await?;
        info!("drone {}: now in {}", id, mode);
        Ok(ModeChange::Changed)
    }

    pub async fn telemetry(&self, id: &str) -> Result<TelemetrySnapshot, FleetError> {
        let handle = self.session(id)?;
        let st = handle.lock().await.state();
        // home falls back to where the drone is now
        let home = st.home.unwrap_or_else(|| st.relative_position());
        Ok(TelemetrySnapshot {
            drone_id: id.to_string(),
            latitude: st.location.latitude,
            longitude: st.location.longitude,
            altitude: st.location.relative_alt,
            altitude_asl: st.location.msl_alt,
            battery: st.battery.remaining,
            battery_voltage: st.battery.voltage,
            airspeed: st.airspeed,
            groundspeed: st.groundspeed,
            heading: st.heading,
            mode: st.mode.clone(),
            armed: st.armed,
            pitch: st.attitude.pitch,
            roll: st.attitude.roll,
            yaw: st.attitude.yaw,
            signal_strength: st.hb_age().map(|d| d.as_secs_f64()),
            home_latitude: home.latitude,
            home_longitude: home.longitude,
            home_altitude: home.altitude,
        })
    }

    /// Writes a new home and returns it.
    pub async fn set_home(&self, id: &str, req: &HomeRequest) -> Result<GeoPoint, FleetError> {
        let handle = self.session(id)?;
        let mut s = handle.lock().await;
        let home = if req.set_current {
            s.state().relative_position()
        } else {
            match (req.latitude, req.longitude, req.altitude) {
                (Some(lat), Some(lon), Some(alt)) => GeoPoint::new(lat, lon, alt),
                _ => {
                    return Err(FleetError::PreconditionFailed(
                        "home needs latitude, longitude and altitude unless set_current".into(),
                    ))
                }
            }
        };
        s.set_home(home).map_err(|e| FleetError::link("set home", e))?;
        info!("drone {}: home set to {:.7},{:.7} alt {}", id, home.latitude, home.longitude, home.altitude);
        Ok(home)
    }

    /// `set_speed <m/s>` or `set_altitude <m>`.
    pub async fn execute(&self, id: &str, command: &str, params: &[f32]) -> Result<(), FleetError> {
        let handle = self.session(id)?;
        let value = || {
            params.first().copied().ok_or_else(|| {
                FleetError::PreconditionFailed(format!("{} needs one parameter", command))
            })
        };
        let mut s = handle.lock().await;
        match command {
            "set_speed" => {
                let v = value()?;
                s.set_airspeed(v).map_err(|e| FleetError::link(command, e))?;
            }
            "set_altitude" => {
                let v = value()?;
                s.takeoff(v).map_err(|e| FleetError::link(command, e))?;
            }
            other => return Err(FleetError::UnsupportedCommand(other.to_string())),
        }
        info!("drone {}: {} {:?}", id, command, params);
        Ok(())
    }

    /// Compiles `waypoints` against the drone's current position and uploads
    /// them behind the home item. Returns the number of items sent, home
    /// included. Nothing reaches the drone unless every waypoint is valid.
    pub async fn upload_mission(&self, id: &str, waypoints: Vec<RawWaypoint>) -> Result<usize, FleetError> {
        let handle = self.session(id)?;
        let n = handle
            .blocking("mission upload", move |s| {
                let items = compile(&**s, &waypoints)?;
                upload(&mut **s, &items)?;
                Ok(items.len())
            })
            .await?;
        info!("drone {}: mission uploaded ({} items)", id, n);
        Ok(n)
    }

    /// Uploads a `QGC WPL 110` file. The file's own home line and sequence
    /// numbers are replaced the same way as for [`Self::upload_mission`].
    pub async fn upload_mission_file(&self, id: &str, bytes: &[u8]) -> Result<usize, FleetError> {
        let handle = self.session(id)?;
        let parsed = wpl::parse_bytes(bytes)?;
        let n = handle
            .blocking("mission upload", move |s| {
                let loc = s.state().location;
                let items = inject_home(loc.latitude, loc.longitude, parsed)?;
                upload(&mut **s, &items)?;
                Ok(items.len())
            })
            .await?;
        info!("drone {}: mission file uploaded ({} items)", id, n);
        Ok(n)
    }

    pub async fn download_mission(&self, id: &str) -> Result<Vec<MissionItem>, FleetError> {
        let handle = self.session(id)?;
        handle.blocking("mission download", |s| Ok(download(&mut **s)?)).await
    }

    /// Keeps `bytes` in the mission store; a `.waypoints` file is also
    /// uploaded. The file stays stored when the upload fails.
    pub async fn ingest(&self, id: &str, bytes: &[u8], extension: &str) -> Result<IngestOutcome, FleetError> {
        self.session(id)?;
        let path = self.store.save(bytes, extension).await?;
        if !is_mission_ext(extension) {
            info!("drone {}: {} stored, not a mission", id, path.display());
            return Ok(IngestOutcome::Stored { path });
        }
        let items = self.upload_mission_file(id, bytes).await?;
        Ok(IngestOutcome::Uploaded { path, items })
    }
}

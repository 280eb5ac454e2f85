//! Scripted in-memory vehicle for exercising the fleet layer without a link.
//!
//! Every session write is recorded as a [`Call`]; tests keep a
//! [`MockHandle`] to inspect the log and steer the vehicle after the
//! session itself has been moved into a registry.

use anyhow::Result;
use fleet_proto::{GeoPoint, MissionItem};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::session::{CommandQueue, Connector, VehicleSession};
use crate::state::VehicleState;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    SetArmed(bool),
    SetMode(String),
    SetHome(GeoPoint),
    SetAirspeed(f32),
    Takeoff(f32),
    Goto(GeoPoint),
    Clear,
    Add(u16),
    Upload,
    Download,
    WaitReady,
    Close,
}

impl Call {
    fn op(&self) -> &'static str {
        match self {
            Call::SetArmed(_) => "set_armed",
            Call::SetMode(_) => "set_mode",
            Call::SetHome(_) => "set_home",
            Call::SetAirspeed(_) => "set_airspeed",
            Call::Takeoff(_) => "takeoff",
            Call::Goto(_) => "goto",
            Call::Clear => "clear",
            Call::Add(_) => "add",
            Call::Upload => "upload",
            Call::Download => "download",
            Call::WaitReady => "wait_ready",
            Call::Close => "close",
        }
    }
}

#[derive(Debug, Default)]
struct MockVehicle {
    state: VehicleState,
    calls: Vec<Call>,
    /// Mode the vehicle reported when each call arrived.
    modes: Vec<String>,
    /// The vehicle's committed command store.
    store: Vec<MissionItem>,
    /// Snapshot of every committed upload, in order.
    uploads: Vec<Vec<MissionItem>>,
    /// Mode reads that still show the old mode after a write.
    mode_lag: u32,
    pending_mode: Option<(String, u32)>,
    /// Mode writes are accepted but never take effect.
    mode_stuck: bool,
    /// Fail the nth (1-based) call of an op.
    fail: Option<(&'static str, usize)>,
}

impl MockVehicle {
    fn record(&mut self, call: Call) -> Result<()> {
        let op = call.op();
        self.calls.push(call);
        self.modes.push(self.state.mode.clone());
        if let Some((fail_op, nth)) = self.fail {
            let seen = self.calls.iter().filter(|c| c.op() == op).count();
            if fail_op == op && seen == nth {
                anyhow::bail!("mock link failure during {}", op);
            }
        }
        Ok(())
    }
}

/// Test-side view of one mock vehicle.
#[derive(Debug, Clone, Default)]
pub struct MockHandle(Arc<Mutex<MockVehicle>>);

impl MockHandle {
    fn lock(&self) -> MutexGuard<'_, MockVehicle> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Each call paired with the mode the vehicle was in when it arrived.
    pub fn calls_with_mode(&self) -> Vec<(Call, String)> {
        let v = self.lock();
        v.calls.iter().cloned().zip(v.modes.iter().cloned()).collect()
    }

    pub fn uploads(&self) -> Vec<Vec<MissionItem>> {
        self.lock().uploads.clone()
    }

    pub fn store(&self) -> Vec<MissionItem> {
        self.lock().store.clone()
    }

    pub fn set_armed(&self, armed: bool) {
        self.lock().state.armed = armed;
    }

    pub fn set_mode(&self, mode: &str) {
        self.lock().state.mode = mode.to_string();
    }

    pub fn set_position(&self, latitude: f64, longitude: f64, relative_alt: f64) {
        let mut v = self.lock();
        v.state.location.latitude = latitude;
        v.state.location.longitude = longitude;
        v.state.location.relative_alt = relative_alt;
        v.state.position_seen = true;
    }

    pub fn set_home(&self, home: Option<GeoPoint>) {
        self.lock().state.home = home;
    }

    pub fn set_mode_lag(&self, reads: u32) {
        self.lock().mode_lag = reads;
    }

    pub fn set_mode_stuck(&self, stuck: bool) {
        self.lock().mode_stuck = stuck;
    }

    pub fn fail_on(&self, op: &'static str, nth: usize) {
        self.lock().fail = Some((op, nth));
    }

    pub fn state(&self) -> VehicleState {
        self.lock().state.clone()
    }
}

pub struct MockSession {
    vehicle: MockHandle,
    queue: Vec<MissionItem>,
    downloaded: Option<Vec<MissionItem>>,
}

impl MockSession {
    pub fn new(vehicle: MockHandle) -> Self {
        Self { vehicle, queue: Vec::new(), downloaded: None }
    }
}

impl CommandQueue for MockSession {
    fn clear(&mut self) -> Result<()> {
        self.vehicle.lock().record(Call::Clear)?;
        self.queue.clear();
        Ok(())
    }

    fn add(&mut self, item: MissionItem) -> Result<()> {
        self.vehicle.lock().record(Call::Add(item.seq))?;
        self.queue.push(item);
        Ok(())
    }

    fn upload(&mut self) -> Result<()> {
        let mut v = self.vehicle.lock();
        v.record(Call::Upload)?;
        v.store = self.queue.clone();
        v.uploads.push(self.queue.clone());
        Ok(())
    }

    fn download(&mut self) -> Result<()> {
        let mut v = self.vehicle.lock();
        v.record(Call::Download)?;
        self.downloaded = Some(v.store.clone());
        Ok(())
    }

    fn wait_ready(&mut self) -> Result<()> {
        self.vehicle.lock().record(Call::WaitReady)?;
        anyhow::ensure!(self.downloaded.is_some(), "no completed mission download");
        Ok(())
    }

    fn items(&self) -> Vec<MissionItem> {
        self.downloaded.clone().unwrap_or_default()
    }
}

impl VehicleSession for MockSession {
    fn state(&self) -> VehicleState {
        let mut v = self.vehicle.lock();
        if let Some((mode, left)) = v.pending_mode.take() {
            if left == 0 {
                v.state.mode = mode;
            } else {
                v.pending_mode = Some((mode, left - 1));
            }
        }
        v.state.clone()
    }

    fn set_armed(&mut self, armed: bool) -> Result<()> {
        let mut v = self.vehicle.lock();
        v.record(Call::SetArmed(armed))?;
        v.state.armed = armed;
        Ok(())
    }

    fn set_mode(&mut self, mode: &str) -> Result<()> {
        let mut v = self.vehicle.lock();
        v.record(Call::SetMode(mode.to_string()))?;
        if !v.mode_stuck {
            let lag = v.mode_lag;
            v.pending_mode = Some((mode.to_string(), lag));
        }
        Ok(())
    }

    fn set_home(&mut self, home: GeoPoint) -> Result<()> {
        let mut v = self.vehicle.lock();
        v.record(Call::SetHome(home))?;
        v.state.home = Some(home);
        Ok(())
    }

    fn set_airspeed(&mut self, speed_mps: f32) -> Result<()> {
        let mut v = self.vehicle.lock();
        v.record(Call::SetAirspeed(speed_mps))?;
        v.state.airspeed = speed_mps;
        Ok(())
    }

    fn takeoff(&mut self, altitude_m: f32) -> Result<()> {
        self.vehicle.lock().record(Call::Takeoff(altitude_m))
    }

    fn goto(&mut self, target: GeoPoint) -> Result<()> {
        self.vehicle.lock().record(Call::Goto(target))
    }

    fn close(&mut self) -> Result<()> {
        self.vehicle.lock().record(Call::Close)
    }
}

/// Hands out one [`MockSession`] per connection string. Strings starting
/// with `fail:` refuse to connect.
#[derive(Debug, Default)]
pub struct MockConnector {
    vehicles: Mutex<HashMap<String, MockHandle>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// The vehicle behind `connection_string`, created on first use so tests
    /// can script it before connecting.
    pub fn vehicle(&self, connection_string: &str) -> MockHandle {
        let mut map = self.vehicles.lock().unwrap_or_else(PoisonError::into_inner);
        map.entry(connection_string.to_string())
            .or_insert_with(|| {
                let h = MockHandle::default();
                h.set_mode("STABILIZE");
                h.set_position(37.5665, 126.978, 0.0);
                h.lock().state.last_heartbeat = Some(std::time::Instant::now());
                h
            })
            .clone()
    }
}

impl Connector for MockConnector {
    fn open(&self, connection_string: &str) -> Result<Box<dyn VehicleSession>> {
        if connection_string.starts_with("fail:") {
            anyhow::bail!("mock connect refused: {}", connection_string);
        }
        Ok(Box::new(MockSession::new(self.vehicle(connection_string))))
    }
}

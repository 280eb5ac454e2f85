use anyhow::{anyhow, Context, Result};
use fleet_proto::{Frame, GeoPoint, MissionCommand, MissionItem};
use mavlink::{
    common::{
        MavAutopilot, MavCmd, MavFrame, MavMessage, MavMissionResult, MavModeFlag, MavState,
        MavType, COMMAND_INT_DATA, COMMAND_LONG_DATA, HEARTBEAT_DATA, MISSION_ACK_DATA, MISSION_CLEAR_ALL_DATA,
        MISSION_COUNT_DATA, MISSION_ITEM_INT_DATA, MISSION_REQUEST_INT_DATA,
        MISSION_REQUEST_LIST_DATA, REQUEST_DATA_STREAM_DATA, SYS_STATUS_DATA,
    },
    MavConnection, MavHeader,
};
use num_traits::FromPrimitive;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{mpsc, Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::modes;
use crate::session::{CommandQueue, Connector, VehicleSession};
use crate::state::{BatteryStatus, VehicleState};
use crate::udp::UdpLink;
use crate::LinkConfig;

/// How long `close` waits for the reader to leave `recv`.
const READER_STOP_WAIT: Duration = Duration::from_secs(2);

type Conn = Arc<dyn MavConnection<MavMessage> + Send + Sync>;

/// Outbound side shared between the session and its reader thread.
struct Outbound {
    conn: Conn,
    system_id: u8,
    component_id: u8,
    sequence: AtomicU8,
}

impl Outbound {
    fn send(&self, msg: &MavMessage) -> Result<()> {
        let hdr = MavHeader {
            system_id: self.system_id,
            component_id: self.component_id,
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed),
        };
        self.conn.send(&hdr, msg).context("mavlink send")?;
        Ok(())
    }

    fn send_heartbeat(&self) -> Result<()> {
        let hb = HEARTBEAT_DATA {
            custom_mode: 0,
            mavtype: MavType::MAV_TYPE_GCS,
            autopilot: MavAutopilot::MAV_AUTOPILOT_INVALID,
            base_mode: MavModeFlag::empty(),
            system_status: MavState::MAV_STATE_ACTIVE,
            mavlink_version: 3,
        };
        self.send(&MavMessage::HEARTBEAT(hb))
    }
}

#[derive(Debug, Default)]
struct LinkState {
    vehicle: VehicleState,
    target_system: Option<u8>,
}

/// Vehicle session over a MAVLink connection (ArduCopter semantics).
///
/// A reader thread owns `recv()`: it keeps the attribute cache current,
/// sends our GCS heartbeat and hands mission-protocol messages to whichever
/// exchange is running on the session side.
pub struct MavSession {
    out: Arc<Outbound>,
    state: Arc<Mutex<LinkState>>,
    mission_rx: mpsc::Receiver<MavMessage>,
    stop: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
    target_system: u8,
    target_component: u8,
    mission_timeout: Duration,
    pending: Vec<MissionItem>,
    downloaded: Option<Vec<MissionItem>>,
}

impl MavSession {
    /// Connects and blocks until the vehicle is ready (heartbeat and first
    /// position). With `ready_timeout_ms = 0` an unresponsive link blocks
    /// forever.
    pub fn open(connection_string: &str, cfg: &LinkConfig) -> Result<Self> {
        if let Some(rest) = connection_string.strip_prefix("serial:") {
            probe_serial(rest)?;
        }

        let conn: Conn = match UdpLink::open(connection_string)
            .with_context(|| format!("mavlink connect {}", connection_string))?
        {
            Some(udp) => Arc::new(udp),
            None => Arc::from(
                mavlink::connect::<MavMessage>(connection_string)
                    .with_context(|| format!("mavlink connect {}", connection_string))?,
            ),
        };

        let out = Arc::new(Outbound {
            conn,
            system_id: cfg.source_system,
            component_id: cfg.source_component,
            sequence: AtomicU8::new(0),
        });
        let state = Arc::new(Mutex::new(LinkState::default()));
        let stop = Arc::new(AtomicBool::new(false));
        let (mission_tx, mission_rx) = mpsc::channel();

        let reader = {
            let out = out.clone();
            let state = state.clone();
            let stop = stop.clone();
            let hb_interval = Duration::from_millis(cfg.heartbeat_interval_ms.max(100));
            std::thread::Builder::new()
                .name(format!("mav-reader {}", connection_string))
                .spawn(move || reader_loop(out, state, mission_tx, stop, hb_interval))
                .context("spawn mavlink reader")?
        };

        let mut session = Self {
            out,
            state,
            mission_rx,
            stop,
            reader: Some(reader),
            target_system: 0,
            target_component: cfg.target_component,
            mission_timeout: Duration::from_millis(cfg.mission_timeout_ms.max(100)),
            pending: Vec::new(),
            downloaded: None,
        };

        let deadline = (cfg.ready_timeout_ms > 0)
            .then(|| Instant::now() + Duration::from_millis(cfg.ready_timeout_ms));

        session.target_system = session.wait_for(deadline, "autopilot heartbeat", |s| s.target_system)?;
        info!("link {}: autopilot heartbeat from system {}", connection_string, session.target_system);

        session.request_streams(cfg.stream_rate_hz)?;
        session.wait_for(deadline, "first position", |s| s.vehicle.position_seen.then_some(()))?;
        // Best-effort: ArduPilot only reports HOME_POSITION on request.
        if let Err(e) = session.command_long(MavCmd::MAV_CMD_GET_HOME_POSITION, [0.0; 7]) {
            warn!("link {}: home position request failed: {:#}", connection_string, e);
        }

        info!("link {}: ready", connection_string);
        Ok(session)
    }

    fn wait_for<T>(
        &self,
        deadline: Option<Instant>,
        what: &str,
        probe: impl Fn(&LinkState) -> Option<T>,
    ) -> Result<T> {
        loop {
            if let Some(v) = probe(&self.lock_state()) {
                return Ok(v);
            }
            if deadline.map(|d| Instant::now() >= d).unwrap_or(false) {
                anyhow::bail!("timed out waiting for {}", what);
            }
            std::thread::sleep(Duration::from_millis(50));
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, LinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn request_streams(&self, rate_hz: u16) -> Result<()> {
        let req = REQUEST_DATA_STREAM_DATA {
            req_message_rate: rate_hz,
            target_system: self.target_system,
            target_component: self.target_component,
            req_stream_id: 0, // MAV_DATA_STREAM_ALL
            start_stop: 1,
        };
        self.out.send(&MavMessage::REQUEST_DATA_STREAM(req))
    }

    fn command_long(&self, command: MavCmd, p: [f32; 7]) -> Result<()> {
        let cmd = COMMAND_LONG_DATA {
            target_system: self.target_system,
            target_component: self.target_component,
            command,
            confirmation: 0,
            param1: p[0],
            param2: p[1],
            param3: p[2],
            param4: p[3],
            param5: p[4],
            param6: p[5],
            param7: p[6],
        };
        self.out.send(&MavMessage::COMMAND_LONG(cmd))
    }

    fn item_to_wire(&self, seq: u16, item: &MissionItem) -> Result<MISSION_ITEM_INT_DATA> {
        let p = item.command.params();
        Ok(MISSION_ITEM_INT_DATA {
            param1: p[0],
            param2: p[1],
            param3: p[2],
            param4: p[3],
            x: deg_to_e7(item.latitude),
            y: deg_to_e7(item.longitude),
            z: item.altitude as f32,
            seq,
            command: mav_cmd(&item.command)?,
            target_system: self.target_system,
            target_component: self.target_component,
            frame: mav_frame(item.frame),
            current: item.current,
            autocontinue: item.autocontinue,
            ..Default::default()
        })
    }

    fn next_mission_msg(&self, what: &str) -> Result<MavMessage> {
        self.mission_rx.recv_timeout(self.mission_timeout).map_err(|e| match e {
            mpsc::RecvTimeoutError::Timeout => {
                anyhow!("{}: no response within {:?}", what, self.mission_timeout)
            }
            mpsc::RecvTimeoutError::Disconnected => anyhow!("{}: link reader stopped", what),
        })
    }

    /// Drops mission messages left over from an earlier, aborted exchange.
    fn drain_mission_msgs(&self) {
        while self.mission_rx.try_recv().is_ok() {}
    }

    fn expect_ack(&self, what: &str) -> Result<()> {
        loop {
            match self.next_mission_msg(what)? {
                MavMessage::MISSION_ACK(ack) => return check_ack(&ack, what),
                other => debug!("{}: ignoring {:?}", what, other),
            }
        }
    }

    fn send_ack(&self) -> Result<()> {
        let ack = MISSION_ACK_DATA {
            target_system: self.target_system,
            target_component: self.target_component,
            mavtype: MavMissionResult::MAV_MISSION_ACCEPTED,
            ..Default::default()
        };
        self.out.send(&MavMessage::MISSION_ACK(ack))
    }
}

impl CommandQueue for MavSession {
    fn clear(&mut self) -> Result<()> {
        self.pending.clear();
        Ok(())
    }

    fn add(&mut self, item: MissionItem) -> Result<()> {
        self.pending.push(item);
        Ok(())
    }

    fn upload(&mut self) -> Result<()> {
        self.drain_mission_msgs();

        if self.pending.is_empty() {
            let clear = MISSION_CLEAR_ALL_DATA {
                target_system: self.target_system,
                target_component: self.target_component,
                ..Default::default()
            };
            self.out.send(&MavMessage::MISSION_CLEAR_ALL(clear))?;
            return self.expect_ack("mission clear");
        }

        let count = u16::try_from(self.pending.len()).context("mission has too many items")?;
        let msg = MISSION_COUNT_DATA {
            count,
            target_system: self.target_system,
            target_component: self.target_component,
            ..Default::default()
        };
        self.out.send(&MavMessage::MISSION_COUNT(msg))?;
        debug!("mission upload: announced {} items", count);

        loop {
            let seq = match self.next_mission_msg("mission upload")? {
                MavMessage::MISSION_REQUEST_INT(r) => r.seq,
                MavMessage::MISSION_REQUEST(r) => r.seq,
                MavMessage::MISSION_ACK(ack) => return check_ack(&ack, "mission upload"),
                other => {
                    debug!("mission upload: ignoring {:?}", other);
                    continue;
                }
            };
            let item = self
                .pending
                .get(seq as usize)
                .with_context(|| format!("vehicle requested item {} of {}", seq, count))?;
            let wire = self.item_to_wire(seq, item)?;
            self.out.send(&MavMessage::MISSION_ITEM_INT(wire))?;
        }
    }

    fn download(&mut self) -> Result<()> {
        self.drain_mission_msgs();
        self.downloaded = None;

        let req = MISSION_REQUEST_LIST_DATA {
            target_system: self.target_system,
            target_component: self.target_component,
            ..Default::default()
        };
        self.out.send(&MavMessage::MISSION_REQUEST_LIST(req))?;

        let count = loop {
            match self.next_mission_msg("mission download")? {
                MavMessage::MISSION_COUNT(c) => break c.count,
                other => debug!("mission download: ignoring {:?}", other),
            }
        };

        let mut items = Vec::with_capacity(count as usize);
        for seq in 0..count {
            let req = MISSION_REQUEST_INT_DATA {
                seq,
                target_system: self.target_system,
                target_component: self.target_component,
                ..Default::default()
            };
            self.out.send(&MavMessage::MISSION_REQUEST_INT(req))?;
            let wire = loop {
                match self.next_mission_msg("mission download")? {
                    MavMessage::MISSION_ITEM_INT(d) if d.seq == seq => break d,
                    other => debug!("mission download: ignoring {:?}", other),
                }
            };
            items.push(item_from_wire(&wire)?);
        }
        self.send_ack()?;

        debug!("mission download: {} items", items.len());
        self.downloaded = Some(items);
        Ok(())
    }

    fn wait_ready(&mut self) -> Result<()> {
        // The exchange in `download` is synchronous; ready means it finished.
        anyhow::ensure!(self.downloaded.is_some(), "no completed mission download");
        Ok(())
    }

    fn items(&self) -> Vec<MissionItem> {
        self.downloaded.clone().unwrap_or_default()
    }
}

impl VehicleSession for MavSession {
    fn state(&self) -> VehicleState {
        self.lock_state().vehicle.clone()
    }

    fn set_armed(&mut self, armed: bool) -> Result<()> {
        let flag = if armed { 1.0 } else { 0.0 };
        self.command_long(MavCmd::MAV_CMD_COMPONENT_ARM_DISARM, [flag, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0])
            .context("arm/disarm")
    }

    fn set_mode(&mut self, mode: &str) -> Result<()> {
        let custom = modes::copter_mode_number(mode)
            .with_context(|| format!("unknown flight mode {}", mode))?;
        // param1: MAV_MODE_FLAG_CUSTOM_MODE_ENABLED
        self.command_long(MavCmd::MAV_CMD_DO_SET_MODE, [1.0, custom as f32, 0.0, 0.0, 0.0, 0.0, 0.0])
            .with_context(|| format!("set mode {}", mode))
    }

    fn set_home(&mut self, home: GeoPoint) -> Result<()> {
        let cmd = set_home_command(self.target_system, self.target_component, home);
        self.out.send(&MavMessage::COMMAND_INT(cmd)).context("set home")?;
        // Cache it so the next read reflects the write; HOME_POSITION will confirm.
        self.lock_state().vehicle.home = Some(home);
        Ok(())
    }

    fn set_airspeed(&mut self, speed_mps: f32) -> Result<()> {
        // param1 0 = airspeed, param3 -1 = leave throttle
        self.command_long(MavCmd::MAV_CMD_DO_CHANGE_SPEED, [0.0, speed_mps, -1.0, 0.0, 0.0, 0.0, 0.0])
            .context("change speed")
    }

    fn takeoff(&mut self, altitude_m: f32) -> Result<()> {
        self.command_long(MavCmd::MAV_CMD_NAV_TAKEOFF, [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, altitude_m])
            .context("takeoff")
    }

    fn goto(&mut self, target: GeoPoint) -> Result<()> {
        // current = 2 marks a guided-mode target, not a mission edit.
        let item = MISSION_ITEM_INT_DATA {
            x: deg_to_e7(target.latitude),
            y: deg_to_e7(target.longitude),
            z: target.altitude as f32,
            seq: 0,
            command: MavCmd::MAV_CMD_NAV_WAYPOINT,
            target_system: self.target_system,
            target_component: self.target_component,
            frame: MavFrame::MAV_FRAME_GLOBAL_RELATIVE_ALT_INT,
            current: 2,
            autocontinue: 0,
            ..Default::default()
        };
        self.out.send(&MavMessage::MISSION_ITEM_INT(item)).context("guided goto")
    }

    fn close(&mut self) -> Result<()> {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(h) = self.reader.take() {
            // UDP and TCP reads time out; a serial read may not.
            let deadline = Instant::now() + READER_STOP_WAIT;
            while !h.is_finished() && Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(10));
            }
            if h.is_finished() {
                h.join().map_err(|_| anyhow!("mavlink reader panicked"))?;
            } else {
                warn!("link to system {}: reader still blocked in recv, detaching it", self.target_system);
            }
        }
        info!("link to system {} closed", self.target_system);
        Ok(())
    }
}

impl Drop for MavSession {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

/// Opens [`MavSession`]s with one shared link configuration.
#[derive(Debug, Clone)]
pub struct MavConnector {
    cfg: LinkConfig,
}

impl MavConnector {
    pub fn new(cfg: LinkConfig) -> Self {
        Self { cfg }
    }
}

impl Connector for MavConnector {
    fn open(&self, connection_string: &str) -> Result<Box<dyn VehicleSession>> {
        let session = MavSession::open(connection_string, &self.cfg)?;
        Ok(Box::new(session))
    }
}

fn reader_loop(
    out: Arc<Outbound>,
    state: Arc<Mutex<LinkState>>,
    mission_tx: mpsc::Sender<MavMessage>,
    stop: Arc<AtomicBool>,
    hb_interval: Duration,
) {
    let mut last_hb_send = Instant::now().checked_sub(hb_interval).unwrap_or_else(Instant::now);
    let mut warned_stale = false;

    while !stop.load(Ordering::Relaxed) {
        if last_hb_send.elapsed() >= hb_interval {
            if let Err(e) = out.send_heartbeat() {
                debug!("gcs heartbeat send failed: {:#}", e);
            }
            last_hb_send = Instant::now();
        }

        match out.conn.recv() {
            Ok((hdr, msg)) => {
                if let Some(target) = mission_target(&msg) {
                    let vehicle = state.lock().unwrap_or_else(PoisonError::into_inner).target_system;
                    if !mission_msg_for_us(vehicle, hdr.system_id, target, out.system_id, out.component_id) {
                        debug!("ignoring mission message from system {} for {:?}", hdr.system_id, target);
                        continue;
                    }
                    // Receiver gone means the session was dropped.
                    if mission_tx.send(msg).is_err() {
                        break;
                    }
                    continue;
                }
                let mut st = state.lock().unwrap_or_else(PoisonError::into_inner);
                apply(&mut st, &hdr, &msg);
                if matches!(msg, MavMessage::HEARTBEAT(_)) {
                    warned_stale = false;
                }
            }
            Err(e) => {
                let st = state.lock().unwrap_or_else(PoisonError::into_inner);
                let stale = st.vehicle.hb_age().map(|a| a > Duration::from_secs(5)).unwrap_or(false);
                drop(st);
                if stale && !warned_stale {
                    warn!("no autopilot heartbeat for 5s (last recv error: {:?})", e);
                    warned_stale = true;
                }
                // Light sleep to avoid busy loop
                std::thread::sleep(Duration::from_millis(10));
            }
        }
    }
    debug!("mavlink reader stopped");
}

/// `(target_system, target_component)` of a mission-protocol message.
fn mission_target(msg: &MavMessage) -> Option<(u8, u8)> {
    match msg {
        MavMessage::MISSION_REQUEST(m) => Some((m.target_system, m.target_component)),
        MavMessage::MISSION_REQUEST_INT(m) => Some((m.target_system, m.target_component)),
        MavMessage::MISSION_ACK(m) => Some((m.target_system, m.target_component)),
        MavMessage::MISSION_COUNT(m) => Some((m.target_system, m.target_component)),
        MavMessage::MISSION_ITEM_INT(m) => Some((m.target_system, m.target_component)),
        _ => None,
    }
}

/// A shared link also carries other ground stations' mission exchanges.
/// Only traffic from our vehicle addressed to us (component 0 being a
/// broadcast) belongs to ours.
fn mission_msg_for_us(
    vehicle: Option<u8>,
    sender: u8,
    (system, component): (u8, u8),
    us: u8,
    our_component: u8,
) -> bool {
    vehicle == Some(sender) && system == us && (component == our_component || component == 0)
}

fn apply(st: &mut LinkState, hdr: &MavHeader, msg: &MavMessage) {
    let v = &mut st.vehicle;
    match msg {
        MavMessage::HEARTBEAT(hb) => {
            // GCS and companion heartbeats carry no vehicle state.
            if matches!(hb.autopilot, MavAutopilot::MAV_AUTOPILOT_INVALID) {
                return;
            }
            st.target_system.get_or_insert(hdr.system_id);
            v.armed = hb.base_mode.contains(MavModeFlag::MAV_MODE_FLAG_SAFETY_ARMED);
            v.mode = modes::copter_mode_name(hb.custom_mode)
                .map(str::to_string)
                .unwrap_or_else(|| format!("MODE({})", hb.custom_mode));
            v.last_heartbeat = Some(Instant::now());
        }
        MavMessage::GLOBAL_POSITION_INT(p) => {
            v.location.latitude = e7_to_deg(p.lat);
            v.location.longitude = e7_to_deg(p.lon);
            v.location.msl_alt = p.alt as f64 / 1000.0;
            v.location.relative_alt = p.relative_alt as f64 / 1000.0;
            v.position_seen = true;
        }
        MavMessage::VFR_HUD(hud) => {
            v.airspeed = hud.airspeed;
            v.groundspeed = hud.groundspeed;
            v.heading = hud.heading;
        }
        MavMessage::ATTITUDE(a) => {
            v.attitude.pitch = a.pitch;
            v.attitude.roll = a.roll;
            v.attitude.yaw = a.yaw;
        }
        MavMessage::SYS_STATUS(status) => update_battery(&mut v.battery, status),
        MavMessage::HOME_POSITION(h) => {
            v.home = Some(GeoPoint::new(
                e7_to_deg(h.latitude),
                e7_to_deg(h.longitude),
                h.altitude as f64 / 1000.0,
            ));
        }
        _ => {}
    }
}

fn update_battery(battery: &mut BatteryStatus, status: &SYS_STATUS_DATA) {
    // voltage_battery is in millivolts, convert to volts
    if status.voltage_battery != u16::MAX {
        battery.voltage = Some(status.voltage_battery as f32 / 1000.0);
    }
    // current_battery is in centiamps (0.01A), -1 means invalid
    if status.current_battery != -1 {
        battery.current = Some(status.current_battery as f32 / 100.0);
    }
    // battery_remaining is percentage 0-100, -1 means invalid
    if (0..=100).contains(&status.battery_remaining) {
        battery.remaining = Some(status.battery_remaining as u8);
    }
}

fn check_ack(ack: &MISSION_ACK_DATA, what: &str) -> Result<()> {
    if matches!(ack.mavtype, MavMissionResult::MAV_MISSION_ACCEPTED) {
        Ok(())
    } else {
        anyhow::bail!("{} rejected by vehicle: {:?}", what, ack.mavtype)
    }
}

/// `serial:<dev>:<baud>`: fail early with a clear error if the device is absent.
fn probe_serial(addr: &str) -> Result<()> {
    let (dev, baud) = addr.rsplit_once(':').context("serial address must be serial:<dev>:<baud>")?;
    let baud: u32 = baud.parse().with_context(|| format!("invalid baud {}", baud))?;
    let _ = tokio_serial::new(dev, baud)
        .open()
        .with_context(|| format!("open serial device {}", dev))?;
    Ok(())
}

/// MAV_CMD_DO_SET_HOME as COMMAND_INT so coordinates keep 1e-7 degree
/// resolution. param1 0 means use the given location.
fn set_home_command(target_system: u8, target_component: u8, home: GeoPoint) -> COMMAND_INT_DATA {
    COMMAND_INT_DATA {
        target_system,
        target_component,
        frame: MavFrame::MAV_FRAME_GLOBAL,
        command: MavCmd::MAV_CMD_DO_SET_HOME,
        x: deg_to_e7(home.latitude),
        y: deg_to_e7(home.longitude),
        z: home.altitude as f32,
        ..Default::default()
    }
}

fn deg_to_e7(deg: f64) -> i32 {
    (deg * 1e7).round() as i32
}

fn e7_to_deg(v: i32) -> f64 {
    v as f64 / 1e7
}

fn mav_frame(frame: Frame) -> MavFrame {
    match frame {
        Frame::Global => MavFrame::MAV_FRAME_GLOBAL,
        Frame::Mission => MavFrame::MAV_FRAME_MISSION,
        Frame::RelativeAltitude => MavFrame::MAV_FRAME_GLOBAL_RELATIVE_ALT,
        Frame::TerrainAltitude => MavFrame::MAV_FRAME_GLOBAL_TERRAIN_ALT,
    }
}

fn frame_from_mav(frame: MavFrame) -> Option<Frame> {
    match frame {
        MavFrame::MAV_FRAME_GLOBAL | MavFrame::MAV_FRAME_GLOBAL_INT => Some(Frame::Global),
        MavFrame::MAV_FRAME_MISSION => Some(Frame::Mission),
        MavFrame::MAV_FRAME_GLOBAL_RELATIVE_ALT | MavFrame::MAV_FRAME_GLOBAL_RELATIVE_ALT_INT => {
            Some(Frame::RelativeAltitude)
        }
        MavFrame::MAV_FRAME_GLOBAL_TERRAIN_ALT | MavFrame::MAV_FRAME_GLOBAL_TERRAIN_ALT_INT => {
            Some(Frame::TerrainAltitude)
        }
        _ => None,
    }
}

fn mav_cmd(command: &MissionCommand) -> Result<MavCmd> {
    let cmd = match command {
        MissionCommand::Waypoint { .. } => MavCmd::MAV_CMD_NAV_WAYPOINT,
        MissionCommand::Takeoff { .. } => MavCmd::MAV_CMD_NAV_TAKEOFF,
        MissionCommand::Land { .. } => MavCmd::MAV_CMD_NAV_LAND,
        MissionCommand::SetServo { .. } => MavCmd::MAV_CMD_DO_SET_SERVO,
        MissionCommand::ChangeSpeed { .. } => MavCmd::MAV_CMD_DO_CHANGE_SPEED,
        MissionCommand::ReturnToLaunch => MavCmd::MAV_CMD_NAV_RETURN_TO_LAUNCH,
        MissionCommand::LoiterTime { .. } => MavCmd::MAV_CMD_NAV_LOITER_TIME,
        MissionCommand::Raw { code, .. } => {
            MavCmd::from_u16(*code).with_context(|| format!("MAV_CMD {} unknown to the common dialect", code))?
        }
    };
    Ok(cmd)
}

fn item_from_wire(d: &MISSION_ITEM_INT_DATA) -> Result<MissionItem> {
    let frame = frame_from_mav(d.frame)
        .with_context(|| format!("mission item {}: unsupported frame {:?}", d.seq, d.frame))?;
    let command = MissionCommand::from_wire(d.command as u16, [d.param1, d.param2, d.param3, d.param4]);
    Ok(MissionItem {
        seq: d.seq,
        current: d.current,
        autocontinue: d.autocontinue,
        frame,
        command,
        latitude: e7_to_deg(d.x),
        longitude: e7_to_deg(d.y),
        altitude: d.z as f64,
    })
}

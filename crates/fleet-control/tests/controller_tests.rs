use fleet_control::{FleetController, FleetError, MissionStore, ModeChange, PollPolicy};
use fleet_link::mock::{Call, MockConnector};
use fleet_proto::{GeoPoint, HomeRequest, RawWaypoint};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const CONN: &str = "udpin:0.0.0.0:14550";

fn fleet(max_attempts: Option<u32>) -> (Arc<MockConnector>, FleetController) {
    let connector = Arc::new(MockConnector::new());
    let poll = PollPolicy { interval: Duration::from_millis(1), max_attempts };
    let store = MissionStore::new(std::env::temp_dir().join("fleet-controller-tests"));
    (connector.clone(), FleetController::new(connector, poll, store))
}

async fn connected() -> (Arc<MockConnector>, FleetController) {
    let (connector, ctl) = fleet(Some(20));
    ctl.connect("d1", CONN).await.unwrap();
    (connector, ctl)
}

#[tokio::test]
async fn connect_is_exclusive_per_id() {
    let (_, ctl) = connected().await;
    let err = ctl.connect("d1", "udpin:0.0.0.0:14551").await.unwrap_err();
    assert_eq!(err.kind(), "already_connected");

    ctl.disconnect("d1").await.unwrap();
    ctl.connect("d1", CONN).await.unwrap();
    assert_eq!(ctl.list(), vec!["d1"]);
}

#[tokio::test]
async fn concurrent_connects_for_one_id_admit_one() {
    let (_, ctl) = fleet(Some(20));
    let (a, b) = tokio::join!(ctl.connect("d1", "a"), ctl.connect("d1", "b"));
    assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
    let loser = a.err().or(b.err()).unwrap();
    assert!(matches!(loser, FleetError::AlreadyConnected(_)));
}

#[tokio::test]
async fn mode_change_and_upload_on_one_drone_do_not_interleave() {
    let (connector, ctl) = connected().await;
    let vehicle = connector.vehicle(CONN);
    vehicle.set_mode_lag(5);

    let wps: Vec<RawWaypoint> =
        serde_json::from_value(json!([{"latitude": 37.0, "longitude": 127.0, "altitude": 10.0}])).unwrap();
    let (mode, items) = tokio::join!(ctl.change_mode("d1", "loiter"), ctl.upload_mission("d1", wps));
    assert_eq!(mode.unwrap(), ModeChange::Changed);
    assert_eq!(items.unwrap(), 2);

    let log = vehicle.calls_with_mode();
    assert_eq!(log[0], (Call::SetMode("LOITER".into()), "STABILIZE".to_string()));
    assert!(log.len() > 1);
    for (call, mode) in &log[1..] {
        assert!(matches!(call, Call::Clear | Call::Add(_) | Call::Upload), "unexpected {:?}", call);
        assert_eq!(mode, "LOITER", "{:?} reached the vehicle before the mode settled", call);
    }
}

#[tokio::test]
async fn connect_failure_is_link_error() {
    let (_, ctl) = fleet(Some(20));
    let err = ctl.connect("d1", "fail:/dev/ttyACM9").await.unwrap_err();
    assert!(matches!(err, FleetError::Link { ref op, .. } if op == "connect"));
    assert!(ctl.list().is_empty());
}

#[tokio::test]
async fn every_operation_fails_fast_when_not_connected() {
    let (_, ctl) = fleet(Some(20));
    let not_connected = |r: Result<(), FleetError>| assert_eq!(r.unwrap_err().kind(), "not_connected");

    not_connected(ctl.arm("ghost").await);
    not_connected(ctl.disarm("ghost").await);
    not_connected(ctl.take_off("ghost", 10.0).await);
    not_connected(ctl.land("ghost").await);
    not_connected(ctl.fly_to("ghost", GeoPoint::new(0.0, 0.0, 10.0)).await);
    not_connected(ctl.disconnect("ghost").await);
    not_connected(ctl.execute("ghost", "set_speed", &[5.0]).await);
    not_connected(ctl.change_mode("ghost", "LOITER").await.map(|_| ()));
    not_connected(ctl.telemetry("ghost").await.map(|_| ()));
    not_connected(ctl.set_home("ghost", &HomeRequest::default()).await.map(|_| ()));
    not_connected(ctl.upload_mission("ghost", vec![]).await.map(|_| ()));
    not_connected(ctl.download_mission("ghost").await.map(|_| ()));
    not_connected(ctl.ingest("ghost", b"x", ".txt").await.map(|_| ()));
}

#[tokio::test]
async fn takeoff_requires_arming_then_goes_guided() {
    let (connector, ctl) = connected().await;
    let vehicle = connector.vehicle(CONN);

    let err = ctl.take_off("d1", 10.0).await.unwrap_err();
    assert!(matches!(err, FleetError::PreconditionFailed(_)));
    assert!(vehicle.calls().is_empty());

    ctl.arm("d1").await.unwrap();
    ctl.take_off("d1", 10.0).await.unwrap();
    assert_eq!(
        vehicle.calls(),
        vec![Call::SetArmed(true), Call::SetMode("GUIDED".into()), Call::Takeoff(10.0)]
    );
}

#[tokio::test]
async fn takeoff_waits_for_mode_to_settle() {
    let (connector, ctl) = connected().await;
    let vehicle = connector.vehicle(CONN);
    vehicle.set_armed(true);
    vehicle.set_mode_lag(3);

    ctl.take_off("d1", 5.0).await.unwrap();
    assert_eq!(vehicle.state().mode, "GUIDED");
    assert_eq!(vehicle.calls().last(), Some(&Call::Takeoff(5.0)));
}

#[tokio::test]
async fn takeoff_already_guided_sends_no_mode() {
    let (connector, ctl) = connected().await;
    let vehicle = connector.vehicle(CONN);
    vehicle.set_armed(true);
    vehicle.set_mode("GUIDED");

    ctl.take_off("d1", 10.0).await.unwrap();
    assert_eq!(vehicle.calls(), vec![Call::Takeoff(10.0)]);
}

#[tokio::test]
async fn change_mode_is_a_noop_when_already_there() {
    let (connector, ctl) = connected().await;
    let vehicle = connector.vehicle(CONN);
    vehicle.set_mode("LOITER");

    assert_eq!(ctl.change_mode("d1", "LOITER").await.unwrap(), ModeChange::AlreadyInMode);
    assert!(vehicle.calls().is_empty());

    assert_eq!(ctl.change_mode("d1", "rtl").await.unwrap(), ModeChange::Changed);
    assert_eq!(vehicle.calls(), vec![Call::SetMode("RTL".into())]);
    assert_eq!(vehicle.state().mode, "RTL");
}

#[tokio::test]
async fn stuck_mode_change_times_out() {
    let (connector, ctl) = fleet(Some(5));
    ctl.connect("d1", CONN).await.unwrap();
    connector.vehicle(CONN).set_mode_stuck(true);

    let err = ctl.change_mode("d1", "GUIDED").await.unwrap_err();
    assert!(matches!(err, FleetError::Timeout { attempts: 5, .. }));
    assert_eq!(err.kind(), "timeout");

    // the session lock was released on the error path
    ctl.arm("d1").await.unwrap();
}

#[tokio::test]
async fn mode_write_failure_is_link_error() {
    let (connector, ctl) = connected().await;
    connector.vehicle(CONN).fail_on("set_mode", 1);
    let err = ctl.change_mode("d1", "GUIDED").await.unwrap_err();
    assert_eq!(err.kind(), "link_error");
    assert!(err.to_string().contains("GUIDED"));
}

#[tokio::test]
async fn land_goes_guided_first() {
    let (connector, ctl) = connected().await;
    let vehicle = connector.vehicle(CONN);
    ctl.land("d1").await.unwrap();
    assert_eq!(vehicle.calls(), vec![Call::SetMode("GUIDED".into()), Call::SetMode("LAND".into())]);
}

#[tokio::test]
async fn fly_to_issues_goto() {
    let (connector, ctl) = connected().await;
    let vehicle = connector.vehicle(CONN);
    vehicle.set_mode("GUIDED");
    let target = GeoPoint::new(37.57, 126.98, 30.0);
    ctl.fly_to("d1", target).await.unwrap();
    assert_eq!(vehicle.calls(), vec![Call::Goto(target)]);
}

#[tokio::test]
async fn telemetry_home_falls_back_to_position() {
    let (connector, ctl) = connected().await;
    let vehicle = connector.vehicle(CONN);
    vehicle.set_position(37.5, 127.0, 12.0);

    let t = ctl.telemetry("d1").await.unwrap();
    assert_eq!(t.drone_id, "d1");
    assert_eq!(t.mode, "STABILIZE");
    assert_eq!((t.home_latitude, t.home_longitude, t.home_altitude), (37.5, 127.0, 12.0));
    assert!(t.signal_strength.is_some());

    vehicle.set_home(Some(GeoPoint::new(37.0, 126.0, 3.0)));
    let t = ctl.telemetry("d1").await.unwrap();
    assert_eq!((t.home_latitude, t.home_longitude, t.home_altitude), (37.0, 126.0, 3.0));
    assert_eq!(t.latitude, 37.5);
}

#[tokio::test]
async fn set_home_current_or_explicit() {
    let (connector, ctl) = connected().await;
    let vehicle = connector.vehicle(CONN);
    vehicle.set_position(37.5, 127.0, 4.0);

    let home = ctl.set_home("d1", &HomeRequest { set_current: true, ..Default::default() }).await.unwrap();
    assert_eq!(home, GeoPoint::new(37.5, 127.0, 4.0));

    let req = HomeRequest { set_current: false, latitude: Some(1.0), longitude: Some(2.0), altitude: Some(3.0) };
    let home = ctl.set_home("d1", &req).await.unwrap();
    assert_eq!(vehicle.state().home, Some(home));

    let partial = HomeRequest { latitude: Some(1.0), ..Default::default() };
    let err = ctl.set_home("d1", &partial).await.unwrap_err();
    assert_eq!(err.kind(), "precondition_failed");
    assert_eq!(vehicle.calls().len(), 2);
}

#[tokio::test]
async fn execute_known_commands_only() {
    let (connector, ctl) = connected().await;
    let vehicle = connector.vehicle(CONN);

    ctl.execute("d1", "set_speed", &[6.5]).await.unwrap();
    ctl.execute("d1", "set_altitude", &[25.0]).await.unwrap();
    assert_eq!(vehicle.calls(), vec![Call::SetAirspeed(6.5), Call::Takeoff(25.0)]);

    let err = ctl.execute("d1", "flip", &[1.0]).await.unwrap_err();
    assert!(matches!(err, FleetError::UnsupportedCommand(ref c) if c == "flip"));
    let err = ctl.execute("d1", "set_speed", &[]).await.unwrap_err();
    assert_eq!(err.kind(), "precondition_failed");
}

#[tokio::test]
async fn shutdown_closes_every_session() {
    let (connector, ctl) = fleet(Some(20));
    ctl.connect("d1", "a").await.unwrap();
    ctl.connect("d2", "b").await.unwrap();
    ctl.shutdown().await;
    assert!(ctl.list().is_empty());
    assert_eq!(connector.vehicle("a").calls(), vec![Call::Close]);
    assert_eq!(connector.vehicle("b").calls(), vec![Call::Close]);
}

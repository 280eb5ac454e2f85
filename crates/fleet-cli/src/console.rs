//! Line console over a [`FleetController`].
//!
//! ```text
//! connect d1 udpin:0.0.0.0:14550      -> {"ok":"d1"}
//! takeoff d1 10                       -> {"error":{"kind":"precondition_failed","message":"..."}}
//! ```

use anyhow::{Context, Result};
use fleet_control::{FleetController, FleetError, IngestOutcome, ModeChange};
use fleet_proto::{GeoPoint, HomeRequest, RawWaypoint};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::str::SplitWhitespace;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
enum Request {
    Connect { id: String, conn: String },
    List,
    Arm(String),
    Disarm(String),
    Land(String),
    Disconnect(String),
    Telemetry(String),
    Download(String),
    Takeoff { id: String, altitude: f32 },
    Mode { id: String, mode: String },
    Goto { id: String, target: GeoPoint },
    Home { id: String, req: HomeRequest },
    Exec { id: String, name: String, params: Vec<f32> },
    Mission { id: String, path: PathBuf },
    Ingest { id: String, path: PathBuf },
    Quit,
}

fn word(words: &mut SplitWhitespace<'_>, name: &str) -> Result<String> {
    words.next().map(str::to_string).with_context(|| format!("missing {}", name))
}

fn num<T: std::str::FromStr>(name: &str, text: Option<&str>) -> Result<T> {
    let text = text.with_context(|| format!("missing {}", name))?;
    text.parse().map_err(|_| anyhow::anyhow!("bad {}: {:?}", name, text))
}

impl Request {
    fn parse(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let verb = words.next().context("empty request")?;

        let req = match verb {
            "list" => Request::List,
            "quit" | "exit" => Request::Quit,
            "connect" => Request::Connect { id: word(&mut words, "id")?, conn: word(&mut words, "connection string")? },
            "arm" => Request::Arm(word(&mut words, "id")?),
            "disarm" => Request::Disarm(word(&mut words, "id")?),
            "land" => Request::Land(word(&mut words, "id")?),
            "disconnect" => Request::Disconnect(word(&mut words, "id")?),
            "telemetry" => Request::Telemetry(word(&mut words, "id")?),
            "download" => Request::Download(word(&mut words, "id")?),
            "mode" => Request::Mode { id: word(&mut words, "id")?, mode: word(&mut words, "mode")? },
            "mission" => Request::Mission { id: word(&mut words, "id")?, path: word(&mut words, "file")?.into() },
            "ingest" => Request::Ingest { id: word(&mut words, "id")?, path: word(&mut words, "file")?.into() },
            "takeoff" => {
                let id = word(&mut words, "id")?;
                Request::Takeoff { id, altitude: num("altitude", words.next())? }
            }
            "goto" => {
                let id = word(&mut words, "id")?;
                let target = GeoPoint::new(
                    num("latitude", words.next())?,
                    num("longitude", words.next())?,
                    num("altitude", words.next())?,
                );
                Request::Goto { id, target }
            }
            "home" => {
                let id = word(&mut words, "id")?;
                let req = match words.next() {
                    Some("current") => HomeRequest { set_current: true, ..Default::default() },
                    lat => HomeRequest {
                        set_current: false,
                        latitude: Some(num("latitude", lat)?),
                        longitude: Some(num("longitude", words.next())?),
                        altitude: Some(num("altitude", words.next())?),
                    },
                };
                Request::Home { id, req }
            }
            "exec" => {
                let id = word(&mut words, "id")?;
                let name = word(&mut words, "command")?;
                let params = words.map(|w| num("parameter", Some(w))).collect::<Result<Vec<f32>>>()?;
                Request::Exec { id, name, params }
            }
            other => anyhow::bail!("unknown request {:?}", other),
        };
        Ok(req)
    }
}

/// A failed request, already named by the kind callers match on.
struct Failure {
    kind: &'static str,
    error: anyhow::Error,
}

impl From<FleetError> for Failure {
    fn from(e: FleetError) -> Self {
        Failure { kind: e.kind(), error: e.into() }
    }
}

fn bad_request(error: anyhow::Error) -> Failure {
    Failure { kind: "bad_request", error }
}

fn value<T: Serialize>(v: T) -> Result<Value, Failure> {
    serde_json::to_value(v).map_err(|e| Failure { kind: "internal", error: e.into() })
}

async fn read_file(path: &Path) -> Result<Vec<u8>, Failure> {
    tokio::fs::read(path)
        .await
        .with_context(|| format!("read {}", path.display()))
        .map_err(bad_request)
}

async fn dispatch(ctl: &FleetController, req: Request) -> Result<Value, Failure> {
    let v = match req {
        Request::Connect { id, conn } => {
            ctl.connect(&id, &conn).await?;
            json!(id)
        }
        Request::List => value(ctl.list())?,
        Request::Arm(id) => {
            ctl.arm(&id).await?;
            json!("armed")
        }
        Request::Disarm(id) => {
            ctl.disarm(&id).await?;
            json!("disarmed")
        }
        Request::Land(id) => {
            ctl.land(&id).await?;
            json!("landing")
        }
        Request::Disconnect(id) => {
            ctl.disconnect(&id).await?;
            json!("disconnected")
        }
        Request::Telemetry(id) => value(ctl.telemetry(&id).await?)?,
        Request::Download(id) => value(ctl.download_mission(&id).await?)?,
        Request::Takeoff { id, altitude } => {
            ctl.take_off(&id, altitude).await?;
            json!({ "takeoff": altitude })
        }
        Request::Mode { id, mode } => match ctl.change_mode(&id, &mode).await? {
            ModeChange::AlreadyInMode => json!("already_in_mode"),
            ModeChange::Changed => json!("changed"),
        },
        Request::Goto { id, target } => {
            ctl.fly_to(&id, target).await?;
            value(target)?
        }
        Request::Home { id, req } => value(ctl.set_home(&id, &req).await?)?,
        Request::Exec { id, name, params } => {
            ctl.execute(&id, &name, &params).await?;
            json!(name)
        }
        Request::Mission { id, path } => {
            let bytes = read_file(&path).await?;
            let wps: Vec<RawWaypoint> = serde_json::from_slice(&bytes)
                .with_context(|| format!("parse JSON mission {}", path.display()))
                .map_err(bad_request)?;
            let items = ctl.upload_mission(&id, wps).await?;
            json!({ "items": items })
        }
        Request::Ingest { id, path } => {
            let bytes = read_file(&path).await?;
            let ext = path
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy()))
                .unwrap_or_default();
            match ctl.ingest(&id, &bytes, &ext).await? {
                IngestOutcome::Stored { path } => json!({ "stored": path.display().to_string() }),
                IngestOutcome::Uploaded { path, items } => json!({ "uploaded": path.display().to_string(), "items": items }),
            }
        }
        Request::Quit => Value::Null,
    };
    Ok(v)
}

fn reply(result: Result<Value, Failure>) -> Value {
    match result {
        Ok(v) => json!({ "ok": v }),
        Err(f) => {
            warn!("request failed ({}): {:#}", f.kind, f.error);
            json!({ "error": { "kind": f.kind, "message": format!("{:#}", f.error) } })
        }
    }
}

/// Answers requests from `input` until `quit` or end of input.
pub async fn serve<R, W>(ctl: &FleetController, input: R, mut out: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        debug!("console: {}", line);
        let response = match Request::parse(line) {
            Ok(Request::Quit) => break,
            Ok(req) => reply(dispatch(ctl, req).await),
            Err(e) => reply(Err(bad_request(e))),
        };
        out.write_all(response.to_string().as_bytes()).await?;
        out.write_all(b"\n").await?;
        out.flush().await?;
    }
    Ok(())
}

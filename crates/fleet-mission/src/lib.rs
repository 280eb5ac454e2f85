//! Mission side of the fleet layer: compiling operator waypoints into the
//! vehicle's command sequence, reading planner `.waypoints` files, and the
//! clear/upload/download exchange with a session's command store.

pub mod compile;
pub mod error;
pub mod transfer;
pub mod wpl;

pub use compile::{compile, compile_at, inject_home};
pub use error::MissionError;
pub use transfer::{download, upload, TransferPhase};

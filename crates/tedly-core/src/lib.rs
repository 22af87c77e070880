//! Lock state engine between `tedly-api` and a bridge host.
//!
//! This crate owns the device model and the concurrency rules that keep it
//! consistent while commands and background syncs interleave:
//!
//! - **[`Bridge`]**: fetches the lock inventory, creates one controller per
//!   configured lock, and runs the sync loop. [`Bridge::connect()`] builds
//!   the cloud client from a [`BridgeConfig`] and starts everything.
//!
//! - **[`LockController`]**: per-lock state machine. Host target changes
//!   become `open` / `close` / `pull-spring` commands; sync payloads are
//!   ignored while a command is settling. Exposed state is published through
//!   a `tokio::sync::watch` channel ([`LockController::subscribe()`]).
//!
//! - **[`mapper`]**: pure translation of vendor state codes and battery data
//!   into [`LockState`].
//!
//! - **[`LockApi`]**: the vendor operations the engine needs, implemented
//!   for [`tedly_api::TedeeClient`].

pub mod api;
pub mod bridge;
pub mod config;
pub mod device;
pub mod error;
mod followup;
pub mod mapper;
pub mod state;

// ── Primary re-exports ──────────────────────────────────────────────
pub use api::LockApi;
pub use bridge::{Bridge, RefreshRequest};
pub use config::{
    BridgeConfig, BridgeSettings, ControllerTimings, DeviceConfig, MIN_UPDATE_INTERVAL,
};
pub use device::{CommandOutcome, LockController};
pub use error::CoreError;
pub use state::{AccessoryInfo, Battery, LockCurrentState, LockState, LockTargetState, Mechanism};

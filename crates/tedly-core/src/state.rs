// ── Exposed device model ──
//
// The bridge host shows each lock as a lock mechanism (current + target
// state), an optional second lock mechanism for the latch, and a battery.
// These types are what the host mirrors; they carry no vendor codes.

use serde::Serialize;
use strum::Display;

/// Current state of a lock mechanism as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum LockCurrentState {
    Unsecured,
    Secured,
    Jammed,
    Unknown,
}

/// Requested state of a lock mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum LockTargetState {
    Unsecured,
    Secured,
}

/// The current/target characteristic pair of one lock mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Mechanism {
    pub current: LockCurrentState,
    pub target: LockTargetState,
}

impl Default for Mechanism {
    fn default() -> Self {
        Self {
            current: LockCurrentState::Unknown,
            target: LockTargetState::Secured,
        }
    }
}

impl Mechanism {
    /// `true` once the current state has caught up with the target.
    pub fn is_settled(self) -> bool {
        matches!(
            (self.current, self.target),
            (LockCurrentState::Unsecured, LockTargetState::Unsecured)
                | (LockCurrentState::Secured, LockTargetState::Secured)
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Battery {
    pub level: u8,
    pub charging: bool,
    pub low: bool,
}

/// Everything the host exposes for one physical lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LockState {
    pub lock: Mechanism,
    /// Present only when the device is configured to expose a latch.
    pub latch: Option<Mechanism>,
    pub battery: Battery,
}

impl LockState {
    pub fn new(expose_latch: bool) -> Self {
        Self {
            lock: Mechanism::default(),
            latch: expose_latch.then(Mechanism::default),
            battery: Battery::default(),
        }
    }
}

/// Static accessory information shown by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessoryInfo {
    pub manufacturer: &'static str,
    pub model: &'static str,
    pub serial_number: String,
    pub firmware_revision: Option<String>,
    pub hardware_revision: String,
}

impl AccessoryInfo {
    pub fn from_record(record: &tedly_api::LockRecord) -> Self {
        Self {
            manufacturer: "tedee",
            model: "Smart Lock",
            serial_number: record.serial_number.clone(),
            firmware_revision: record.firmware_version().map(String::from),
            hardware_revision: record.device_revision.to_string(),
        }
    }
}

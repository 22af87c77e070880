// ── Runtime bridge configuration ──
//
// These types describe *what* to expose and how to talk to the cloud.
// They carry credential data and tuning, but never touch disk. The
// binary builds a `BridgeConfig` (via tedly-config) and hands it in.

use std::time::Duration;

use tedly_api::{Account, ClientConfig};

/// The vendor asks integrations not to poll faster than this.
pub const MIN_UPDATE_INTERVAL: Duration = Duration::from_secs(10);

pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(15);

/// Clamp a configured polling interval to the vendor's floor.
pub fn clamp_update_interval(interval: Duration) -> Duration {
    interval.max(MIN_UPDATE_INTERVAL)
}

/// Per-device exposure and behavior toggles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Lock name in the tedee account; the join key against the inventory.
    pub name: String,
    /// Expose the pull-spring as a second lock mechanism.
    pub expose_latch: bool,
    pub lock_label: String,
    pub latch_label: String,
    /// Never send open/pull-spring for this lock.
    pub disable_unlock: bool,
    /// Unlocking a locked door pulls the spring instead of just opening.
    pub unlatch_from_locked: bool,
    /// Unlocking an already unlocked door pulls the spring.
    pub unlatch_from_unlocked: bool,
    /// Refuse latch requests while the lock reports secured.
    pub prevent_unlatch_if_locked: bool,
}

impl DeviceConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expose_latch: false,
            lock_label: "Lock".into(),
            latch_label: "Latch".into(),
            disable_unlock: false,
            unlatch_from_locked: false,
            unlatch_from_unlocked: false,
            prevent_unlatch_if_locked: false,
        }
    }
}

/// Delays used by the command state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerTimings {
    /// How long optimistic state wins over sync after a command.
    pub settle: Duration,
    /// Offsets of the follow-up refreshes after a command.
    pub refresh_after: Vec<Duration>,
    /// Delay before a rejected request is reverted on the host.
    pub revert: Duration,
}

impl Default for ControllerTimings {
    fn default() -> Self {
        Self {
            settle: Duration::from_secs(5),
            refresh_after: vec![
                Duration::from_secs(5),
                Duration::from_secs(10),
                Duration::from_secs(15),
            ],
            revert: Duration::from_millis(500),
        }
    }
}

/// Everything the bridge needs apart from the API client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeSettings {
    pub update_interval: Duration,
    pub devices: Vec<DeviceConfig>,
    pub timings: ControllerTimings,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            update_interval: DEFAULT_UPDATE_INTERVAL,
            devices: Vec::new(),
            timings: ControllerTimings::default(),
        }
    }
}

/// Full configuration for a bridge backed by the tedee cloud.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub account: Account,
    pub client: ClientConfig,
    pub settings: BridgeSettings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_interval_has_a_floor() {
        assert_eq!(
            clamp_update_interval(Duration::from_secs(3)),
            MIN_UPDATE_INTERVAL
        );
        assert_eq!(
            clamp_update_interval(Duration::from_secs(30)),
            Duration::from_secs(30)
        );
    }
}

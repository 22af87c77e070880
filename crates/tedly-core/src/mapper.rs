// ── Vendor state → exposed characteristics ──
//
// Pure translation of the tedee status code into the current/target pairs
// of the lock and latch mechanisms. Some codes only describe motion
// (opening, closing, unlatching) and therefore update the target without
// touching the current state.

use tedly_api::{LockProperties, LockRecord};

use crate::state::{Battery, LockCurrentState, LockTargetState, Mechanism};

/// Vendor code for a door that is unlocked but not fully open.
pub const STATE_HALF_OPEN: u8 = 3;

/// Battery levels strictly below this are reported as low.
pub const LOW_BATTERY_THRESHOLD: u8 = 10;

/// Per-field updates implied by one vendor code. `None` keeps the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub lock_current: Option<LockCurrentState>,
    pub lock_target: Option<LockTargetState>,
    pub latch_current: Option<LockCurrentState>,
    pub latch_target: Option<LockTargetState>,
}

impl Transition {
    const fn new(
        lock_current: Option<LockCurrentState>,
        lock_target: Option<LockTargetState>,
        latch_current: Option<LockCurrentState>,
        latch_target: Option<LockTargetState>,
    ) -> Self {
        Self {
            lock_current,
            lock_target,
            latch_current,
            latch_target,
        }
    }
}

/// The mapping table. Unknown codes yield `None`.
pub fn transition(code: u8) -> Option<Transition> {
    use LockCurrentState as C;
    use LockTargetState as T;

    let t = match code {
        // uninitialized / jammed
        0 | 1 => Transition::new(Some(C::Jammed), None, Some(C::Jammed), None),
        // fully open, half-open
        2 | 3 => Transition::new(
            Some(C::Unsecured),
            Some(T::Unsecured),
            Some(C::Secured),
            Some(T::Secured),
        ),
        // opening
        4 => Transition::new(None, Some(T::Unsecured), None, Some(T::Secured)),
        // closing
        5 => Transition::new(None, Some(T::Secured), None, Some(T::Secured)),
        // closed / locked
        6 => Transition::new(
            Some(C::Secured),
            Some(T::Secured),
            Some(C::Secured),
            Some(T::Secured),
        ),
        // unlatched
        7 => Transition::new(
            Some(C::Unsecured),
            Some(T::Unsecured),
            Some(C::Unsecured),
            Some(T::Unsecured),
        ),
        // unlatching
        8 => Transition::new(None, Some(T::Unsecured), None, Some(T::Unsecured)),
        _ => return None,
    };
    Some(t)
}

/// Human-readable name of a vendor state code.
pub fn describe(code: u8) -> &'static str {
    match code {
        0 => "uninitialized",
        1 => "jammed",
        2 => "open",
        3 => "half-open",
        4 => "opening",
        5 => "closing",
        6 => "locked",
        7 => "unlatched",
        8 => "unlatching",
        _ => "unknown",
    }
}

/// Apply the transition for `code` to the lock and, if exposed, the latch.
///
/// Returns `false` for codes outside the table, in which case nothing
/// is modified.
pub fn apply_state_code(code: u8, lock: &mut Mechanism, latch: Option<&mut Mechanism>) -> bool {
    let Some(t) = transition(code) else {
        return false;
    };

    if let Some(current) = t.lock_current {
        lock.current = current;
    }
    if let Some(target) = t.lock_target {
        lock.target = target;
    }
    if let Some(latch) = latch {
        if let Some(current) = t.latch_current {
            latch.current = current;
        }
        if let Some(target) = t.latch_target {
            latch.target = target;
        }
    }
    true
}

/// Battery characteristics, or `None` when the lock did not report a level.
pub fn battery(properties: &LockProperties) -> Option<Battery> {
    properties.battery_level.map(|level| Battery {
        level,
        charging: properties.is_charging,
        low: level < LOW_BATTERY_THRESHOLD,
    })
}

/// Whether the lock can pull its spring (unlatch).
///
/// A record without a settings block is treated as unsupported.
pub fn supports_pull_spring(record: &LockRecord) -> bool {
    record.settings.is_some_and(|s| s.pull_spring_enabled)
}

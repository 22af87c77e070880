// ── Per-lock controller ──
//
// One `LockController` per configured lock. It owns the exposed state
// (lock mechanism, optional latch mechanism, battery), reconciles it with
// sync payloads, and turns host target changes into vendor commands.
//
// While a command is in flight the controller is *operating*: sync
// payloads are dropped so that the optimistic target set by the command
// is not overwritten by stale cloud state. The guard is released by a
// settle timer, not by command completion.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tedly_api::{LockOperation, LockProperties, LockRecord, LockSync};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::LockApi;
use crate::bridge::RefreshRequest;
use crate::config::{ControllerTimings, DeviceConfig};
use crate::followup::FollowUps;
use crate::mapper::{self, STATE_HALF_OPEN};
use crate::state::{AccessoryInfo, LockCurrentState, LockState, LockTargetState};

/// Result of a host target change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The vendor reported the operation as completed.
    Completed(LockOperation),
    /// The command was sent but failed after the retry budget.
    Failed(LockOperation),
    /// Refused before anything was sent; the target is reverted.
    Rejected,
    /// Nothing to do for this transition.
    Ignored,
}

#[derive(Debug, Clone, Copy)]
enum Endpoint {
    Lock,
    Latch,
}

/// Per-lock state machine driven by the bridge host.
///
/// The host mirrors [`subscribe()`](Self::subscribe) into its lock and latch
/// characteristics and forwards user requests to
/// [`on_lock_target_changed()`](Self::on_lock_target_changed) and
/// [`on_latch_target_changed()`](Self::on_latch_target_changed). The
/// [`Bridge`](crate::Bridge) feeds sync payloads through
/// [`update()`](Self::update). The `tedly` one-shot commands talk to the API
/// client directly and never go through a controller.
pub struct LockController<A> {
    id: u64,
    config: DeviceConfig,
    api: Arc<A>,
    record: Mutex<LockRecord>,
    state: watch::Sender<LockState>,
    in_flight: AtomicUsize,
    refresh: mpsc::Sender<RefreshRequest>,
    followups: FollowUps,
    timings: ControllerTimings,
    info: AccessoryInfo,
}

impl<A: LockApi> LockController<A> {
    /// Build a controller from the inventory record of its lock.
    ///
    /// The record's properties (if any) seed the exposed state.
    pub fn new(
        record: LockRecord,
        config: DeviceConfig,
        api: Arc<A>,
        timings: ControllerTimings,
        refresh: mpsc::Sender<RefreshRequest>,
        cancel: CancellationToken,
    ) -> Arc<Self> {
        let mut initial = LockState::new(config.expose_latch);
        if let Some(properties) = record.properties {
            apply_properties(&mut initial, properties);
        }
        let (state, _) = watch::channel(initial);

        info!(
            lock = %config.name,
            id = record.id,
            latch = config.expose_latch,
            pull_spring = mapper::supports_pull_spring(&record),
            "lock controller ready"
        );

        Arc::new(Self {
            id: record.id,
            info: AccessoryInfo::from_record(&record),
            config,
            api,
            record: Mutex::new(record),
            state,
            in_flight: AtomicUsize::new(0),
            refresh,
            followups: FollowUps::new(cancel),
            timings,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn accessory_info(&self) -> &AccessoryInfo {
        &self.info
    }

    /// Snapshot of the exposed state.
    pub fn state(&self) -> LockState {
        *self.state.borrow()
    }

    /// Receiver that observes every change to the exposed state.
    pub fn subscribe(&self) -> watch::Receiver<LockState> {
        self.state.subscribe()
    }

    /// `true` between the start of a command and the end of its settle window.
    pub fn is_operating(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    /// Reconcile with a sync payload. Returns `true` if exposed state changed.
    ///
    /// Dropped entirely while operating. Payloads without properties are
    /// skipped, as are unknown state codes (battery still applies).
    pub fn update(&self, sync: &LockSync) -> bool {
        if self.is_operating() {
            debug!(lock = %self.name(), "command in flight, sync ignored");
            return false;
        }
        let Some(properties) = sync.properties else {
            debug!(lock = %self.name(), "sync without lock properties, skipped");
            return false;
        };

        self.record
            .lock()
            .expect("lock record poisoned")
            .apply_sync(sync);

        if mapper::transition(properties.state).is_none() {
            debug!(lock = %self.name(), state = properties.state, "unknown lock state code");
        }
        let changed = self
            .state
            .send_if_modified(|state| apply_properties(state, properties));
        if changed {
            debug!(lock = %self.name(), state = properties.state, "state updated from sync");
        }
        changed
    }

    /// Host request for a new lock target.
    pub async fn on_lock_target_changed(self: &Arc<Self>, target: LockTargetState) -> CommandOutcome {
        let current = self.state.borrow().lock.current;
        self.state.send_modify(|s| s.lock.target = target);

        if target == LockTargetState::Secured {
            info!(lock = %self.name(), "lock requested");
            return self.dispatch(LockOperation::Close).await;
        }

        let (pull_spring, half_open) = self.capabilities();

        if current == LockCurrentState::Secured {
            if self.config.disable_unlock {
                info!(lock = %self.name(), "unlock requested but unlocking is disabled");
                self.schedule_revert(Endpoint::Lock);
                return CommandOutcome::Rejected;
            }
            if self.config.unlatch_from_locked && self.config.expose_latch && pull_spring {
                info!(lock = %self.name(), "unlatch from locked requested");
                self.show_latch_unsecured();
                return self.dispatch(LockOperation::PullSpring).await;
            }
            info!(lock = %self.name(), "unlock requested");
            return self.dispatch(LockOperation::Open).await;
        }

        if current != LockCurrentState::Unsecured {
            info!(
                lock = %self.name(),
                current = %current,
                "unlock requested while the lock position is unknown"
            );
            self.schedule_revert(Endpoint::Lock);
            return CommandOutcome::Rejected;
        }

        if !self.config.unlatch_from_unlocked || !pull_spring || self.config.disable_unlock {
            debug!(lock = %self.name(), "already unlocked, nothing to send");
            return CommandOutcome::Ignored;
        }

        if half_open {
            info!(lock = %self.name(), "door is half open, opening instead of unlatching");
            return self.dispatch(LockOperation::Open).await;
        }
        info!(lock = %self.name(), "unlatch from unlocked requested");
        self.show_latch_unsecured();
        self.dispatch(LockOperation::PullSpring).await
    }

    /// Host request for a new latch target. Only meaningful with a latch exposed.
    pub async fn on_latch_target_changed(
        self: &Arc<Self>,
        target: LockTargetState,
    ) -> CommandOutcome {
        if !self.config.expose_latch {
            warn!(lock = %self.name(), "latch target changed but no latch is exposed");
            return CommandOutcome::Ignored;
        }
        self.state.send_modify(|s| {
            if let Some(latch) = s.latch.as_mut() {
                latch.target = target;
            }
        });

        // The latch springs back by itself; securing it is not a command.
        if target == LockTargetState::Secured {
            return CommandOutcome::Ignored;
        }

        let locked = self.state.borrow().lock.current == LockCurrentState::Secured;
        let (pull_spring, half_open) = self.capabilities();

        let refusal = [
            (!pull_spring, "pull spring is not enabled on this lock"),
            (self.config.disable_unlock, "unlocking is disabled"),
            (
                locked && self.config.prevent_unlatch_if_locked,
                "lock is secured",
            ),
        ]
        .into_iter()
        .find_map(|(refused, reason)| refused.then_some(reason));
        if let Some(reason) = refusal {
            info!(lock = %self.name(), reason, "unlatch rejected");
            self.schedule_revert(Endpoint::Latch);
            return CommandOutcome::Rejected;
        }

        self.state
            .send_modify(|s| s.lock.target = LockTargetState::Unsecured);

        if half_open {
            info!(lock = %self.name(), "door is half open, opening instead of unlatching");
            self.dispatch(LockOperation::Open).await
        } else {
            info!(lock = %self.name(), "unlatch requested");
            self.dispatch(LockOperation::PullSpring).await
        }
    }

    /// Cancel pending settle, refresh, and revert tasks.
    pub fn shutdown(&self) {
        self.followups.cancel_all();
    }

    // ── Internals ────────────────────────────────────────────────────

    /// `(supports pull spring, door is half open)` from the stored record.
    fn capabilities(&self) -> (bool, bool) {
        let record = self.record.lock().expect("lock record poisoned");
        let half_open = record
            .properties
            .is_some_and(|p| p.state == STATE_HALF_OPEN);
        (mapper::supports_pull_spring(&record), half_open)
    }

    fn show_latch_unsecured(&self) {
        self.state.send_modify(|s| {
            if let Some(latch) = s.latch.as_mut() {
                latch.target = LockTargetState::Unsecured;
            }
        });
    }

    async fn dispatch(self: &Arc<Self>, operation: LockOperation) -> CommandOutcome {
        let _in_flight = InFlight::enter(self);
        debug!(lock = %self.name(), %operation, "sending command");

        let result = self.api.execute(self.id, operation).await;

        match result {
            Ok(()) => {
                info!(lock = %self.name(), %operation, "command completed");
                CommandOutcome::Completed(operation)
            }
            Err(e) => {
                warn!(lock = %self.name(), %operation, error = %e, "command failed");
                CommandOutcome::Failed(operation)
            }
        }
    }

    /// Settle timer plus the delayed refreshes that follow every command.
    fn schedule_follow_ups(self: &Arc<Self>) {
        let controller = Arc::downgrade(self);
        self.followups.schedule(self.timings.settle, async move {
            if let Some(controller) = controller.upgrade() {
                controller.in_flight.fetch_sub(1, Ordering::SeqCst);
                debug!(lock = %controller.name(), "settle window elapsed");
            }
        });

        for delay in &self.timings.refresh_after {
            let refresh = self.refresh.clone();
            let lock_id = self.id;
            self.followups.schedule(*delay, async move {
                if let Err(e) = refresh.try_send(RefreshRequest { lock_id }) {
                    debug!(lock_id, error = %e, "refresh request dropped");
                }
            });
        }
    }

    fn schedule_revert(self: &Arc<Self>, endpoint: Endpoint) {
        let controller = Arc::downgrade(self);
        self.followups.schedule(self.timings.revert, async move {
            let Some(controller) = controller.upgrade() else {
                return;
            };
            controller.state.send_modify(|s| match endpoint {
                Endpoint::Lock => s.lock.target = LockTargetState::Secured,
                Endpoint::Latch => {
                    if let Some(latch) = s.latch.as_mut() {
                        latch.current = LockCurrentState::Secured;
                        latch.target = LockTargetState::Secured;
                    }
                }
            });
            debug!(lock = %controller.name(), ?endpoint, "target reverted");
        });
    }
}

/// Marks the controller as operating for the lifetime of one command.
///
/// Dropping it, whether the command finished or its future was dropped
/// mid-flight, starts the settle timer and the follow-up refreshes.
struct InFlight<A: LockApi> {
    controller: Arc<LockController<A>>,
}

impl<A: LockApi> InFlight<A> {
    fn enter(controller: &Arc<LockController<A>>) -> Self {
        controller.in_flight.fetch_add(1, Ordering::SeqCst);
        Self {
            controller: Arc::clone(controller),
        }
    }
}

impl<A: LockApi> Drop for InFlight<A> {
    fn drop(&mut self) {
        if tokio::runtime::Handle::try_current().is_ok() {
            self.controller.schedule_follow_ups();
        } else {
            // No runtime to run timers on; release the guard right away.
            self.controller.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

/// Apply one properties payload. Returns `true` if anything changed.
fn apply_properties(state: &mut LockState, properties: LockProperties) -> bool {
    let before = *state;
    mapper::apply_state_code(properties.state, &mut state.lock, state.latch.as_mut());
    if let Some(battery) = mapper::battery(&properties) {
        state.battery = battery;
    }
    *state != before
}

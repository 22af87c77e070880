// ── Bridge ──
//
// Owns the API client and one `LockController` per configured lock that
// exists in the account, and runs the background sync loop. Controllers
// ask for targeted refreshes through an mpsc channel served by the same
// loop, so every sync for a lock goes through one task.

use std::sync::{Arc, RwLock};

use tedly_api::{LockRecord, TedeeClient};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::LockApi;
use crate::config::{BridgeConfig, BridgeSettings, clamp_update_interval};
use crate::device::LockController;
use crate::error::CoreError;

const REFRESH_CHANNEL_SIZE: usize = 64;

/// A controller asking for its lock to be re-synced out of band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshRequest {
    pub lock_id: u64,
}

// ── Bridge ───────────────────────────────────────────────────────

/// Entry point for hosts.
///
/// Cheaply cloneable. Call [`start()`](Self::start) to fetch the inventory,
/// build controllers, and spawn the sync loop.
pub struct Bridge<A> {
    inner: Arc<BridgeInner<A>>,
}

impl<A> Clone for Bridge<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct BridgeInner<A> {
    api: Arc<A>,
    settings: BridgeSettings,
    inventory: RwLock<Vec<LockRecord>>,
    controllers: RwLock<Vec<Arc<LockController<A>>>>,
    refresh_tx: mpsc::Sender<RefreshRequest>,
    refresh_rx: Mutex<Option<mpsc::Receiver<RefreshRequest>>>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Bridge<TedeeClient> {
    /// Build a cloud client from `config`, then start the bridge.
    pub async fn connect(config: BridgeConfig) -> Result<Self, CoreError> {
        let client = TedeeClient::new(config.client, config.account)?;
        let bridge = Self::new(Arc::new(client), config.settings);
        bridge.start().await?;
        Ok(bridge)
    }
}

impl<A: LockApi> Bridge<A> {
    /// Create a bridge. Does NOT contact the API.
    pub fn new(api: Arc<A>, mut settings: BridgeSettings) -> Self {
        let clamped = clamp_update_interval(settings.update_interval);
        if clamped != settings.update_interval {
            warn!(
                requested = ?settings.update_interval,
                using = ?clamped,
                "update interval below the allowed minimum"
            );
            settings.update_interval = clamped;
        }

        let (refresh_tx, refresh_rx) = mpsc::channel(REFRESH_CHANNEL_SIZE);
        Self {
            inner: Arc::new(BridgeInner {
                api,
                settings,
                inventory: RwLock::new(Vec::new()),
                controllers: RwLock::new(Vec::new()),
                refresh_tx,
                refresh_rx: Mutex::new(Some(refresh_rx)),
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn api(&self) -> &Arc<A> {
        &self.inner.api
    }

    pub fn settings(&self) -> &BridgeSettings {
        &self.inner.settings
    }

    /// Fetch the inventory, create a controller per matching device entry,
    /// and spawn the sync loop.
    pub async fn start(&self) -> Result<(), CoreError> {
        let Some(refresh_rx) = self.inner.refresh_rx.lock().await.take() else {
            return Err(CoreError::Internal("bridge already started".into()));
        };

        let locks = self.inner.api.list_locks().await?;
        info!(count = locks.len(), "lock inventory fetched");

        if self.inner.settings.devices.is_empty() {
            warn!("no devices configured");
        }

        let mut controllers = Vec::new();
        for device in &self.inner.settings.devices {
            let Some(record) = locks.iter().find(|l| l.name == device.name) else {
                warn!(lock = %device.name, "no lock with this name in the account, skipping");
                continue;
            };
            controllers.push(LockController::new(
                record.clone(),
                device.clone(),
                Arc::clone(&self.inner.api),
                self.inner.settings.timings.clone(),
                self.inner.refresh_tx.clone(),
                self.inner.cancel.child_token(),
            ));
        }

        *self.inner.inventory.write().expect("inventory lock poisoned") = locks;
        *self
            .inner
            .controllers
            .write()
            .expect("controllers lock poisoned") = controllers;

        let handle = tokio::spawn(sync_task(
            self.clone(),
            refresh_rx,
            self.inner.cancel.child_token(),
        ));
        self.inner.task_handles.lock().await.push(handle);

        debug!(interval = ?self.inner.settings.update_interval, "sync loop started");
        Ok(())
    }

    /// All controllers created at start.
    pub fn controllers(&self) -> Vec<Arc<LockController<A>>> {
        self.inner
            .controllers
            .read()
            .expect("controllers lock poisoned")
            .clone()
    }

    /// Look up a controller by its configured name.
    pub fn controller(&self, name: &str) -> Option<Arc<LockController<A>>> {
        self.inner
            .controllers
            .read()
            .expect("controllers lock poisoned")
            .iter()
            .find(|c| c.name() == name)
            .cloned()
    }

    /// Inventory as fetched at start.
    pub fn inventory(&self) -> Vec<LockRecord> {
        self.inner
            .inventory
            .read()
            .expect("inventory lock poisoned")
            .clone()
    }

    /// One sync pass: fetch every lock's state and feed it to the
    /// controllers. Returns the number of controllers whose state changed.
    pub async fn sync(&self) -> Result<usize, CoreError> {
        let syncs = self.inner.api.sync_all().await?;
        let inventory = self.inventory();

        let mut changed = 0;
        for controller in self.controllers() {
            let Some(lock) = inventory.iter().find(|l| l.name == controller.name()) else {
                debug!(lock = %controller.name(), "not in inventory, skipped");
                continue;
            };
            let Some(sync) = syncs.iter().find(|s| s.id == lock.id) else {
                debug!(lock = %controller.name(), id = lock.id, "no sync data, skipped");
                continue;
            };
            if controller.update(sync) {
                changed += 1;
            }
        }
        Ok(changed)
    }

    /// Re-sync a single lock by id.
    pub async fn refresh_lock(&self, lock_id: u64) -> Result<bool, CoreError> {
        let Some(controller) = self.controllers().into_iter().find(|c| c.id() == lock_id) else {
            return Err(CoreError::LockNotFound {
                identifier: lock_id.to_string(),
            });
        };
        let sync = self.inner.api.sync_one(lock_id).await?;
        Ok(controller.update(&sync))
    }

    /// Stop the sync loop and cancel every controller's pending follow-ups.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        for controller in self.controllers() {
            controller.shutdown();
        }

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        debug!("bridge stopped");
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Periodic sync plus on-demand refreshes from controllers.
async fn sync_task<A: LockApi>(
    bridge: Bridge<A>,
    mut refresh_rx: mpsc::Receiver<RefreshRequest>,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(bridge.inner.settings.update_interval);
    // A slow sync must not be followed by a burst of catch-up ticks.
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                match bridge.sync().await {
                    Ok(changed) => debug!(changed, "periodic sync done"),
                    Err(e) => warn!(error = %e, "periodic sync failed"),
                }
            }
            request = refresh_rx.recv() => {
                let Some(RefreshRequest { lock_id }) = request else { break };
                if let Err(e) = bridge.refresh_lock(lock_id).await {
                    warn!(lock_id, error = %e, "lock refresh failed");
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use tedly_api::{DeviceSettings, LockOperation, LockProperties, LockSync};
    use tokio::time::{Instant, sleep};

    use super::*;
    use crate::config::DeviceConfig;
    use crate::state::{LockCurrentState, LockTargetState};

    struct FakeApi {
        locks: Vec<LockRecord>,
        state: std::sync::Mutex<u8>,
        sync_all_calls: AtomicUsize,
        sync_all_times: std::sync::Mutex<Vec<Instant>>,
        slow_next_sync: std::sync::Mutex<Option<Duration>>,
        sync_one_calls: AtomicUsize,
        fail_next_sync: AtomicBool,
    }

    impl FakeApi {
        fn new(locks: Vec<LockRecord>) -> Self {
            Self {
                locks,
                state: std::sync::Mutex::new(6),
                sync_all_calls: AtomicUsize::new(0),
                sync_all_times: std::sync::Mutex::new(Vec::new()),
                slow_next_sync: std::sync::Mutex::new(None),
                sync_one_calls: AtomicUsize::new(0),
                fail_next_sync: AtomicBool::new(false),
            }
        }

        fn set_state(&self, state: u8) {
            *self.state.lock().unwrap() = state;
        }

        fn sync_for(&self, id: u64) -> LockSync {
            LockSync {
                id,
                properties: Some(LockProperties {
                    state: *self.state.lock().unwrap(),
                    battery_level: Some(50),
                    is_charging: false,
                }),
            }
        }
    }

    impl LockApi for FakeApi {
        async fn list_locks(&self) -> Result<Vec<LockRecord>, CoreError> {
            Ok(self.locks.clone())
        }

        async fn sync_all(&self) -> Result<Vec<LockSync>, CoreError> {
            self.sync_all_calls.fetch_add(1, Ordering::SeqCst);
            self.sync_all_times.lock().unwrap().push(Instant::now());
            let slow = self.slow_next_sync.lock().unwrap().take();
            if let Some(delay) = slow {
                sleep(delay).await;
            }
            if self.fail_next_sync.swap(false, Ordering::SeqCst) {
                return Err(CoreError::Timeout);
            }
            Ok(self.locks.iter().map(|l| self.sync_for(l.id)).collect())
        }

        async fn sync_one(&self, id: u64) -> Result<LockSync, CoreError> {
            self.sync_one_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.sync_for(id))
        }

        async fn execute(&self, _id: u64, _operation: LockOperation) -> Result<(), CoreError> {
            Ok(())
        }
    }

    fn lock(id: u64, name: &str) -> LockRecord {
        LockRecord {
            id,
            name: name.into(),
            serial_number: format!("SN-{id}"),
            device_revision: 1,
            software_versions: Vec::new(),
            settings: Some(DeviceSettings {
                pull_spring_enabled: true,
                auto_pull_spring_enabled: false,
            }),
            properties: Some(LockProperties {
                state: 6,
                battery_level: Some(50),
                is_charging: false,
            }),
        }
    }

    fn bridge(devices: &[&str], interval: Duration) -> (Bridge<FakeApi>, Arc<FakeApi>) {
        let api = Arc::new(FakeApi::new(vec![lock(1, "Front Door"), lock(2, "Garage")]));
        let settings = BridgeSettings {
            update_interval: interval,
            devices: devices.iter().map(|d| DeviceConfig::new(*d)).collect(),
            ..BridgeSettings::default()
        };
        (Bridge::new(Arc::clone(&api), settings), api)
    }

    #[tokio::test(start_paused = true)]
    async fn start_builds_controllers_for_known_names() {
        let (bridge, _api) = bridge(&["Front Door", "Back Door"], Duration::from_secs(15));
        bridge.start().await.unwrap();

        let controllers = bridge.controllers();
        assert_eq!(controllers.len(), 1);
        assert_eq!(controllers[0].name(), "Front Door");
        assert_eq!(controllers[0].id(), 1);
        assert!(bridge.controller("Back Door").is_none());
        assert_eq!(bridge.inventory().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn start_twice_is_an_error() {
        let (bridge, _api) = bridge(&["Front Door"], Duration::from_secs(15));
        bridge.start().await.unwrap();
        assert!(matches!(
            bridge.start().await,
            Err(CoreError::Internal(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn sync_updates_controllers_by_name() {
        let (bridge, api) = bridge(&["Front Door", "Garage"], Duration::from_secs(15));
        bridge.start().await.unwrap();

        api.set_state(2);
        assert_eq!(bridge.sync().await.unwrap(), 2);
        let front = bridge.controller("Front Door").unwrap();
        assert_eq!(front.state().lock.current, LockCurrentState::Unsecured);

        assert_eq!(bridge.sync().await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn loop_syncs_on_interval() {
        let (bridge, api) = bridge(&["Front Door"], Duration::from_secs(15));
        bridge.start().await.unwrap();

        sleep(Duration::from_millis(14_900)).await;
        assert_eq!(api.sync_all_calls.load(Ordering::SeqCst), 0);

        sleep(Duration::from_millis(200)).await;
        assert_eq!(api.sync_all_calls.load(Ordering::SeqCst), 1);

        sleep(Duration::from_secs(15)).await;
        assert_eq!(api.sync_all_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn interval_is_clamped() {
        let (bridge, api) = bridge(&["Front Door"], Duration::from_secs(2));
        assert_eq!(bridge.settings().update_interval, Duration::from_secs(10));
        bridge.start().await.unwrap();

        sleep(Duration::from_millis(9_900)).await;
        assert_eq!(api.sync_all_calls.load(Ordering::SeqCst), 0);
        sleep(Duration::from_millis(200)).await;
        assert_eq!(api.sync_all_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_sync_does_not_burst_missed_ticks() {
        let (bridge, api) = bridge(&["Front Door"], Duration::from_secs(15));
        *api.slow_next_sync.lock().unwrap() = Some(Duration::from_secs(40));
        let started = Instant::now();
        bridge.start().await.unwrap();

        sleep(Duration::from_secs(75)).await;

        let offsets: Vec<Duration> = api
            .sync_all_times
            .lock()
            .unwrap()
            .iter()
            .map(|at| at.duration_since(started))
            .collect();
        assert_eq!(
            offsets,
            vec![
                Duration::from_secs(15),
                Duration::from_secs(55),
                Duration::from_secs(70),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failed_tick_does_not_stop_loop() {
        let (bridge, api) = bridge(&["Front Door"], Duration::from_secs(15));
        api.fail_next_sync.store(true, Ordering::SeqCst);
        api.set_state(2);
        bridge.start().await.unwrap();

        sleep(Duration::from_millis(15_100)).await;
        let front = bridge.controller("Front Door").unwrap();
        assert_eq!(front.state().lock.current, LockCurrentState::Secured);

        sleep(Duration::from_secs(15)).await;
        assert_eq!(api.sync_all_calls.load(Ordering::SeqCst), 2);
        assert_eq!(front.state().lock.current, LockCurrentState::Unsecured);
    }

    #[tokio::test(start_paused = true)]
    async fn commands_trigger_targeted_refreshes() {
        // Long interval so only targeted refreshes hit the API.
        let (bridge, api) = bridge(&["Front Door"], Duration::from_secs(600));
        bridge.start().await.unwrap();
        let front = bridge.controller("Front Door").unwrap();

        front
            .on_lock_target_changed(LockTargetState::Unsecured)
            .await;
        api.set_state(2);

        sleep(Duration::from_millis(5_500)).await;
        assert_eq!(api.sync_one_calls.load(Ordering::SeqCst), 1);

        sleep(Duration::from_secs(10)).await;
        assert_eq!(api.sync_one_calls.load(Ordering::SeqCst), 3);
        assert_eq!(front.state().lock.current, LockCurrentState::Unsecured);
        assert_eq!(api.sync_all_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_of_unknown_lock_is_not_found() {
        let (bridge, _api) = bridge(&["Front Door"], Duration::from_secs(15));
        bridge.start().await.unwrap();
        assert!(matches!(
            bridge.refresh_lock(99).await,
            Err(CoreError::LockNotFound { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_loop() {
        let (bridge, api) = bridge(&["Front Door"], Duration::from_secs(15));
        bridge.start().await.unwrap();
        bridge.shutdown().await;

        sleep(Duration::from_secs(60)).await;
        assert_eq!(api.sync_all_calls.load(Ordering::SeqCst), 0);
    }
}

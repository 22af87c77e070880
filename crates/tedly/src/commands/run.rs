//! `tedly run`: the long-running bridge.

use std::sync::Arc;

use tedly_api::TedeeClient;
use tedly_core::{Bridge, LockController, LockState};
use tracing::{info, warn};

use crate::cli::GlobalOpts;
use crate::error::CliError;

use super::util;

pub async fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let bridge = Bridge::connect(util::bridge_config(global)?).await?;

    let controllers = bridge.controllers();
    if controllers.is_empty() {
        warn!("none of the configured locks exist in the account");
    }
    for controller in &controllers {
        let info = controller.accessory_info();
        info!(
            lock = %controller.name(),
            serial = %info.serial_number,
            firmware = info.firmware_revision.as_deref().unwrap_or("unknown"),
            hardware = %info.hardware_revision,
            "exposing lock"
        );
        tokio::spawn(report_changes(Arc::clone(controller)));
    }

    tokio::signal::ctrl_c().await?;
    info!("interrupted, shutting down");
    bridge.shutdown().await;
    Ok(())
}

/// Log every change to a controller's exposed state.
async fn report_changes(controller: Arc<LockController<TedeeClient>>) {
    let mut rx = controller.subscribe();
    let initial = *rx.borrow_and_update();
    log_state(&controller, initial);

    while rx.changed().await.is_ok() {
        let state = *rx.borrow_and_update();
        log_state(&controller, state);
    }
}

fn log_state(controller: &LockController<TedeeClient>, state: LockState) {
    let config = controller.config();
    info!(
        lock = %controller.name(),
        mechanism = %config.lock_label,
        current = %state.lock.current,
        target = %state.lock.target,
        "lock state"
    );
    if let Some(latch) = state.latch {
        info!(
            lock = %controller.name(),
            mechanism = %config.latch_label,
            current = %latch.current,
            target = %latch.target,
            "latch state"
        );
    }
    if state.battery.low {
        warn!(
            lock = %controller.name(),
            level = state.battery.level,
            charging = state.battery.charging,
            "battery low"
        );
    } else {
        info!(
            lock = %controller.name(),
            level = state.battery.level,
            charging = state.battery.charging,
            "battery"
        );
    }
}

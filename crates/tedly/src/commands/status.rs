//! `tedly status`: exposed state of the configured locks after one sync.

use std::sync::Arc;

use serde::Serialize;
use tabled::Tabled;
use tedly_api::TedeeClient;
use tedly_core::{AccessoryInfo, Bridge, LockController, LockState, Mechanism};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Serialize)]
struct LockStatus {
    name: String,
    id: u64,
    #[serde(flatten)]
    state: LockState,
    info: AccessoryInfo,
}

impl From<&Arc<LockController<TedeeClient>>> for LockStatus {
    fn from(c: &Arc<LockController<TedeeClient>>) -> Self {
        Self {
            name: c.name().to_owned(),
            id: c.id(),
            state: c.state(),
            info: c.accessory_info().clone(),
        }
    }
}

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Lock")]
    lock: String,
    #[tabled(rename = "Latch")]
    latch: String,
    #[tabled(rename = "Battery")]
    battery: String,
    #[tabled(rename = "Firmware")]
    firmware: String,
}

fn mechanism(m: Mechanism) -> String {
    if m.is_settled() {
        m.current.to_string()
    } else {
        format!("{} -> {}", m.current, m.target)
    }
}

impl From<&LockStatus> for StatusRow {
    fn from(s: &LockStatus) -> Self {
        let b = s.state.battery;
        Self {
            name: s.name.clone(),
            lock: mechanism(s.state.lock),
            latch: s.state.latch.map_or_else(|| "-".into(), mechanism),
            battery: format!(
                "{}%{}{}",
                b.level,
                if b.low { " low" } else { "" },
                if b.charging { " (charging)" } else { "" }
            ),
            firmware: s
                .info
                .firmware_revision
                .clone()
                .unwrap_or_else(|| "-".into()),
        }
    }
}

pub async fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let bridge = Bridge::connect(util::bridge_config(global)?).await?;

    let result = bridge.sync().await;
    let statuses: Vec<LockStatus> = bridge.controllers().iter().map(LockStatus::from).collect();
    bridge.shutdown().await;
    result?;

    let out = output::render_list(&global.output, &statuses, |s| StatusRow::from(s), |s| {
        s.name.clone()
    });
    output::print_output(&out, global.quiet);
    Ok(())
}

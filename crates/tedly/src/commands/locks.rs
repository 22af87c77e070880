//! `tedly locks`: the account inventory.

use tabled::Tabled;
use tedly_api::LockRecord;
use tedly_core::mapper;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct LockRow {
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Serial")]
    serial: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Battery")]
    battery: String,
    #[tabled(rename = "Firmware")]
    firmware: String,
    #[tabled(rename = "Pull spring")]
    pull_spring: String,
}

impl From<&LockRecord> for LockRow {
    fn from(l: &LockRecord) -> Self {
        let battery = l
            .properties
            .and_then(|p| mapper::battery(&p))
            .map_or_else(
                || "-".into(),
                |b| {
                    let mut s = format!("{}%", b.level);
                    if b.charging {
                        s.push_str(" (charging)");
                    }
                    s
                },
            );
        Self {
            id: l.id,
            name: l.name.clone(),
            serial: l.serial_number.clone(),
            state: l
                .properties
                .map_or("-", |p| mapper::describe(p.state))
                .into(),
            battery,
            firmware: l.firmware_version().unwrap_or("-").into(),
            pull_spring: if mapper::supports_pull_spring(l) {
                "yes"
            } else {
                "no"
            }
            .into(),
        }
    }
}

pub async fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let client = util::client(global)?;
    let locks = client.list_locks().await?;

    let out = output::render_list(&global.output, &locks, |l| LockRow::from(l), |l| l.name.clone());
    output::print_output(&out, global.quiet);
    Ok(())
}

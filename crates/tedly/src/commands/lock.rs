//! `tedly open|close|unlatch <name>`: one command, waited to completion.

use tedly_api::LockOperation;
use tedly_core::mapper;
use tracing::info;

use crate::cli::{GlobalOpts, LockArgs};
use crate::error::CliError;
use crate::output;

use super::util;

pub async fn handle(
    operation: LockOperation,
    args: &LockArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let client = util::client(global)?;
    let locks = client.list_locks().await?;

    let lock = locks
        .iter()
        .find(|l| l.name == args.name)
        .ok_or_else(|| CliError::LockNotFound {
            name: args.name.clone(),
        })?;

    if operation == LockOperation::PullSpring && !mapper::supports_pull_spring(lock) {
        return Err(CliError::Validation {
            field: "lock".into(),
            reason: format!("pull spring is not enabled on '{}'", lock.name),
        });
    }

    info!(lock = %lock.name, %operation, "sending command");
    match operation {
        LockOperation::Open => client.open(lock.id).await?,
        LockOperation::Close => client.close(lock.id).await?,
        LockOperation::PullSpring => client.pull_spring(lock.id).await?,
    }

    let message = format!("{}: {operation} completed", lock.name);
    output::print_output(
        &output::success(&message, output::should_color(&global.color)),
        global.quiet,
    );
    Ok(())
}

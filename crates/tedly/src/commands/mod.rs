//! Command handlers, one module per top-level subcommand.

pub mod config_cmd;
pub mod lock;
pub mod locks;
pub mod run;
pub mod status;
pub mod util;

use tedly_api::LockOperation;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Run => run::handle(global).await,
        Command::Locks => locks::handle(global).await,
        Command::Status => status::handle(global).await,
        Command::Open(args) => lock::handle(LockOperation::Open, &args, global).await,
        Command::Close(args) => lock::handle(LockOperation::Close, &args, global).await,
        Command::Unlatch(args) => lock::handle(LockOperation::PullSpring, &args, global).await,
        Command::Config(args) => config_cmd::handle(&args, global),
        Command::Completions(_) => Err(CliError::Internal(
            "completions are handled before dispatch".into(),
        )),
    }
}

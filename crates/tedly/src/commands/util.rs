//! Shared helpers for command handlers.

use std::path::PathBuf;

use tedly_api::TedeeClient;
use tedly_config::Config;
use tedly_core::BridgeConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// `--config` if given, otherwise the platform default.
pub fn config_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(tedly_config::config_path)
}

pub fn load_config(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(tedly_config::load_config_from(&config_path(global))?)
}

/// Load, validate, and resolve credentials.
pub fn bridge_config(global: &GlobalOpts) -> Result<BridgeConfig, CliError> {
    Ok(load_config(global)?.to_bridge_config()?)
}

/// A cloud client for one-shot commands.
pub fn client(global: &GlobalOpts) -> Result<TedeeClient, CliError> {
    let config = bridge_config(global)?;
    Ok(TedeeClient::new(config.client, config.account)?)
}

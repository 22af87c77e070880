//! `tedly config`: inspect the effective configuration and store secrets.

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            let cfg = util::load_config(global)?;
            let rendered = tedly_config::render_redacted(&cfg)?;
            output::print_output(rendered.trim_end(), global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            let path = util::config_path(global);
            output::print_output(&path.display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::SetPassword => {
            let cfg = util::load_config(global)?;
            let email = cfg
                .email
                .filter(|e| !e.trim().is_empty())
                .ok_or_else(|| CliError::Validation {
                    field: "email".into(),
                    reason: "set the account email in the config file first".into(),
                })?;

            let password = rpassword::prompt_password(format!("Password for {email}: "))?;
            if password.is_empty() {
                return Err(CliError::Validation {
                    field: "password".into(),
                    reason: "must not be empty".into(),
                });
            }
            tedly_config::store_password(&email, &password)?;

            let message = format!("Password for {email} stored in the system keyring");
            output::print_output(
                &output::success(&message, output::should_color(&global.color)),
                global.quiet,
            );
            Ok(())
        }
    }
}

//! The `fluid-rs` command-line entry point.

use std::process::ExitCode;

use fluid_rs_cli::commands::register_builtin_commands;
use fluid_rs_cli::CommandRegistry;
use fluid_rs_core::logging::setup_logging;
use fluid_rs_core::{settings_loader, SETTINGS};

fn main() -> ExitCode {
    let mut registry = CommandRegistry::new();
    register_builtin_commands(&mut registry);
    let matches = registry.build_cli().get_matches();

    let settings = match matches.get_one::<String>("settings") {
        Some(path) => match settings_loader::from_file_with_env(path) {
            Ok(settings) => settings,
            Err(err) => {
                eprintln!("error[{}]: {err}", err.code());
                return ExitCode::FAILURE;
            }
        },
        None => settings_loader::from_env(),
    };
    setup_logging(&settings);
    if SETTINGS.configure(settings.clone()).is_err() {
        tracing::debug!("Global settings were already configured");
    }

    match registry.execute(&matches, &settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(code = err.code(), "{err}");
            eprintln!("error[{}]: {err}", err.code());
            ExitCode::FAILURE
        }
    }
}

//! The `warmup` management command.
//!
//! Parses every template the configured loader can list so the compiled
//! cache is populated before the first render, then prints the report as JSON.

use fluid_rs_core::{Settings, TemplateError, TemplateResult};
use fluid_rs_template::engine::WarmupReport;
use fluid_rs_template::Engine;

use crate::command::ManagementCommand;

/// Fills the compiled-template cache.
pub struct WarmupCommand;

/// Runs the warmup and serializes the report.
pub fn warmup(engine: &Engine, flush: bool, pretty: bool) -> TemplateResult<(WarmupReport, String)> {
    if flush {
        engine.flush_cache()?;
    }
    let report = engine.warmup();
    let json = if pretty {
        serde_json::to_string_pretty(&report)
    } else {
        serde_json::to_string(&report)
    }
    .map_err(|e| TemplateError::Cache(format!("Failed to serialize warmup report: {e}")))?;
    Ok((report, json))
}

impl ManagementCommand for WarmupCommand {
    fn name(&self) -> &'static str {
        "warmup"
    }

    fn help(&self) -> &'static str {
        "Parse all templates into the compiled cache"
    }

    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd.arg(
            clap::Arg::new("flush")
                .long("flush")
                .action(clap::ArgAction::SetTrue)
                .help("Flush the cache first"),
        )
        .arg(
            clap::Arg::new("pretty")
                .long("pretty")
                .action(clap::ArgAction::SetTrue)
                .help("Pretty-print the JSON report"),
        )
    }

    fn handle(&self, matches: &clap::ArgMatches, settings: &Settings) -> TemplateResult<()> {
        let engine = crate::engine_from_settings(settings)?;
        let (report, json) = warmup(&engine, matches.get_flag("flush"), matches.get_flag("pretty"))?;
        println!("{json}");

        if report.is_success() {
            Ok(())
        } else {
            Err(TemplateError::Configuration(format!(
                "Warmup failed for {} template(s)",
                report.failures.len()
            )))
        }
    }
}

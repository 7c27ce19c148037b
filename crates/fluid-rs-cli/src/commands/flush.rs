//! The `flush` management command.

use fluid_rs_core::{Settings, TemplateResult};

use crate::command::ManagementCommand;

/// Removes every compiled template from the configured cache.
pub struct FlushCommand;

impl ManagementCommand for FlushCommand {
    fn name(&self) -> &'static str {
        "flush"
    }

    fn help(&self) -> &'static str {
        "Remove all compiled templates from the cache"
    }

    fn handle(&self, _matches: &clap::ArgMatches, settings: &Settings) -> TemplateResult<()> {
        crate::engine_from_settings(settings)?.flush_cache()?;
        tracing::info!(backend = ?settings.cache.backend, "Template cache flushed");
        Ok(())
    }
}

//! The `check` management command.
//!
//! Parses templates without rendering them and reports every syntax,
//! namespace or argument error with its stable error code.

use fluid_rs_core::{Settings, TemplateError, TemplateResult};
use fluid_rs_template::engine::WarmupFailure;
use fluid_rs_template::loaders::TemplateKind;
use fluid_rs_template::Engine;

use crate::command::ManagementCommand;

/// Validates templates, layouts and partials.
pub struct CheckCommand;

const KINDS: [TemplateKind; 3] = [TemplateKind::Template, TemplateKind::Layout, TemplateKind::Partial];

/// Parses a template kind from its lowercase name.
pub fn parse_kind(kind: &str) -> TemplateResult<TemplateKind> {
    KINDS
        .into_iter()
        .find(|k| k.as_str() == kind)
        .ok_or_else(|| TemplateError::Configuration(format!("Unknown template kind: {kind}")))
}

/// Checks the named templates of one kind, or every listed template when
/// `names` is empty.
pub fn run_checks(engine: &Engine, kind: TemplateKind, names: &[String]) -> Vec<WarmupFailure> {
    let mut targets: Vec<(TemplateKind, String)> =
        names.iter().map(|name| (kind, name.clone())).collect();
    let mut failures = Vec::new();

    if names.is_empty() {
        for kind in KINDS {
            match engine.loader().list(kind) {
                Ok(listed) => targets.extend(listed.into_iter().map(|name| (kind, name))),
                Err(err) => failures.push(WarmupFailure::new(kind, "*", &err)),
            }
        }
    }

    for (kind, name) in targets {
        if let Err(err) = engine.check(kind, &name) {
            failures.push(WarmupFailure::new(kind, &name, &err));
        }
    }
    failures
}

impl ManagementCommand for CheckCommand {
    fn name(&self) -> &'static str {
        "check"
    }

    fn help(&self) -> &'static str {
        "Parse templates and report errors"
    }

    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd.arg(
            clap::Arg::new("names")
                .num_args(0..)
                .help("Templates to check; all listed templates when omitted"),
        )
        .arg(
            clap::Arg::new("kind")
                .long("kind")
                .short('k')
                .value_parser(["template", "layout", "partial"])
                .default_value("template")
                .help("Kind of the named templates"),
        )
    }

    fn handle(&self, matches: &clap::ArgMatches, settings: &Settings) -> TemplateResult<()> {
        let engine = crate::engine_from_settings(settings)?;
        let kind = parse_kind(
            matches
                .get_one::<String>("kind")
                .map_or("template", String::as_str),
        )?;
        let names: Vec<String> = matches
            .get_many::<String>("names")
            .map(|values| values.cloned().collect())
            .unwrap_or_default();

        let failures = run_checks(&engine, kind, &names);
        if failures.is_empty() {
            tracing::info!("Template check identified no issues");
            return Ok(());
        }

        for failure in &failures {
            tracing::warn!(
                "{}:{} ({}): {}",
                failure.kind,
                failure.name,
                failure.code,
                failure.error
            );
        }
        Err(TemplateError::Configuration(format!(
            "Template check found {} error(s)",
            failures.len()
        )))
    }
}

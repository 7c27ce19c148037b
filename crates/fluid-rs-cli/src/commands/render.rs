//! The `render` management command.
//!
//! Renders a named template (or inline source with `--inline`) and prints the
//! result to stdout. Variables are passed as a JSON object.

use fluid_rs_core::{Settings, TemplateError, TemplateResult};
use fluid_rs_template::{Engine, Value, Variables};

use crate::command::ManagementCommand;

/// Renders one template to stdout.
pub struct RenderCommand;

/// Parses a JSON object into template variables.
pub fn parse_variables(json: &str) -> TemplateResult<Variables> {
    let parsed: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| TemplateError::Configuration(format!("Invalid variables JSON: {e}")))?;
    match parsed {
        serde_json::Value::Object(map) => Ok(map
            .into_iter()
            .map(|(key, value)| (key, Value::from(value)))
            .collect()),
        other => Err(TemplateError::Configuration(format!(
            "Variables must be a JSON object, got {other}"
        ))),
    }
}

/// Renders the template selected by `matches` with `engine`.
pub fn render(engine: &Engine, matches: &clap::ArgMatches) -> TemplateResult<String> {
    let variables = match (
        matches.get_one::<String>("vars"),
        matches.get_one::<String>("vars-file"),
    ) {
        (Some(json), _) => parse_variables(json)?,
        (None, Some(path)) => parse_variables(&std::fs::read_to_string(path)?)?,
        (None, None) => Variables::new(),
    };
    let template = matches
        .get_one::<String>("template")
        .ok_or_else(|| TemplateError::Configuration("No template given".to_string()))?;

    if matches.get_flag("inline") {
        engine.render_source(template, variables)
    } else {
        engine.render(template, variables)
    }
}

impl ManagementCommand for RenderCommand {
    fn name(&self) -> &'static str {
        "render"
    }

    fn help(&self) -> &'static str {
        "Render a template and print the output"
    }

    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd.arg(
            clap::Arg::new("template")
                .required(true)
                .help("Template name, or template source with --inline"),
        )
        .arg(
            clap::Arg::new("inline")
                .long("inline")
                .action(clap::ArgAction::SetTrue)
                .help("Treat the argument as template source"),
        )
        .arg(
            clap::Arg::new("vars")
                .long("vars")
                .conflicts_with("vars-file")
                .help("Variables as a JSON object"),
        )
        .arg(
            clap::Arg::new("vars-file")
                .long("vars-file")
                .help("Path to a JSON file holding the variables"),
        )
    }

    fn handle(&self, matches: &clap::ArgMatches, settings: &Settings) -> TemplateResult<()> {
        let engine = crate::engine_from_settings(settings)?;
        let output = render(&engine, matches)?;
        println!("{output}");
        Ok(())
    }
}

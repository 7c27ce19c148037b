//! Management command framework for fluid-rs.
//!
//! This module provides the [`ManagementCommand`] trait for defining CLI commands
//! and [`CommandRegistry`] for registering and dispatching them.
//!
//! ## Defining a Custom Command
//!
//! ```rust
//! use fluid_rs_cli::command::ManagementCommand;
//! use fluid_rs_core::{Settings, TemplateResult};
//!
//! struct GreetCommand;
//!
//! impl ManagementCommand for GreetCommand {
//!     fn name(&self) -> &str { "greet" }
//!     fn help(&self) -> &str { "Say hello" }
//!
//!     fn handle(&self, _matches: &clap::ArgMatches, _settings: &Settings) -> TemplateResult<()> {
//!         println!("Hello from fluid-rs!");
//!         Ok(())
//!     }
//! }
//! ```

use std::collections::HashMap;

use fluid_rs_core::{Settings, TemplateError, TemplateResult};

/// A command that can be registered and invoked through the CLI.
pub trait ManagementCommand: Send + Sync {
    /// Returns the name of this command (used to invoke it from the CLI).
    fn name(&self) -> &str;

    /// Returns a short help description for this command.
    fn help(&self) -> &str;

    /// Adds custom arguments to the clap command.
    ///
    /// The default implementation returns the command unchanged.
    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd
    }

    /// Executes the command with the given argument matches and settings.
    fn handle(&self, matches: &clap::ArgMatches, settings: &Settings) -> TemplateResult<()>;
}

/// A registry of management commands, keyed by name.
pub struct CommandRegistry {
    commands: HashMap<String, Box<dyn ManagementCommand>>,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRegistry {
    /// Creates a new empty command registry.
    pub fn new() -> Self {
        Self {
            commands: HashMap::new(),
        }
    }

    /// Registers a management command, replacing one with the same name.
    pub fn register(&mut self, command: Box<dyn ManagementCommand>) {
        let name = command.name().to_string();
        self.commands.insert(name, command);
    }

    /// Returns the command with the given name, if registered.
    pub fn get(&self, name: &str) -> Option<&dyn ManagementCommand> {
        self.commands.get(name).map(AsRef::as_ref)
    }

    /// Returns a sorted list of all registered command names.
    pub fn list_commands(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.commands.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Returns the number of registered commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns `true` if no commands are registered.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Builds a top-level clap `Command` containing all registered subcommands.
    ///
    /// A global `--settings` option names the TOML or JSON settings file.
    pub fn build_cli(&self) -> clap::Command {
        let mut app = clap::Command::new("fluid-rs")
            .about("fluid-rs template utility")
            .subcommand_required(true)
            .arg(
                clap::Arg::new("settings")
                    .long("settings")
                    .short('s')
                    .global(true)
                    .help("Path to a TOML or JSON settings file"),
            );

        let mut entries: Vec<_> = self.commands.iter().collect();
        entries.sort_by_key(|(name, _)| (*name).clone());

        for (name, cmd) in entries {
            // clap wants &'static str names; commands are registered once at startup.
            let static_name: &'static str = Box::leak(name.clone().into_boxed_str());
            let subcmd = clap::Command::new(static_name).about(cmd.help().to_string());
            app = app.subcommand(cmd.add_arguments(subcmd));
        }

        app
    }

    /// Dispatches to the subcommand named in `matches`.
    pub fn execute(&self, matches: &clap::ArgMatches, settings: &Settings) -> TemplateResult<()> {
        let (name, sub_matches) = matches
            .subcommand()
            .ok_or_else(|| TemplateError::Configuration("No subcommand specified".to_string()))?;

        let cmd = self
            .get(name)
            .ok_or_else(|| TemplateError::Configuration(format!("Unknown command: {name}")))?;

        tracing::debug!(command = name, "Running management command");
        cmd.handle(sub_matches, settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestCommand {
        cmd_name: String,
    }

    impl TestCommand {
        fn new(name: &str) -> Self {
            Self {
                cmd_name: name.to_string(),
            }
        }
    }

    impl ManagementCommand for TestCommand {
        fn name(&self) -> &str {
            &self.cmd_name
        }

        fn help(&self) -> &'static str {
            "A test command"
        }

        fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
            cmd.arg(
                clap::Arg::new("verbose")
                    .long("verbose")
                    .action(clap::ArgAction::SetTrue),
            )
        }

        fn handle(&self, _matches: &clap::ArgMatches, _settings: &Settings) -> TemplateResult<()> {
            Ok(())
        }
    }

    struct FailingCommand;

    impl ManagementCommand for FailingCommand {
        fn name(&self) -> &'static str {
            "fail"
        }

        fn help(&self) -> &'static str {
            "A command that always fails"
        }

        fn handle(&self, _matches: &clap::ArgMatches, _settings: &Settings) -> TemplateResult<()> {
            Err(TemplateError::Configuration("deliberate failure".to_string()))
        }
    }

    #[test]
    fn test_registry_new_is_empty() {
        let registry = CommandRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = CommandRegistry::new();
        registry.register(Box::new(TestCommand::new("test")));
        assert_eq!(registry.len(), 1);
        let cmd = registry.get("test").unwrap();
        assert_eq!(cmd.name(), "test");
        assert_eq!(cmd.help(), "A test command");
        assert!(registry.get("other").is_none());
    }

    #[test]
    fn test_list_commands_sorted() {
        let mut registry = CommandRegistry::new();
        registry.register(Box::new(TestCommand::new("warmup")));
        registry.register(Box::new(TestCommand::new("check")));
        registry.register(Box::new(TestCommand::new("render")));
        assert_eq!(registry.list_commands(), vec!["check", "render", "warmup"]);
    }

    #[test]
    fn test_register_replaces_existing() {
        let mut registry = CommandRegistry::new();
        registry.register(Box::new(TestCommand::new("test")));
        registry.register(Box::new(TestCommand::new("test")));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_build_cli_with_global_settings() {
        let mut registry = CommandRegistry::new();
        registry.register(Box::new(TestCommand::new("test")));

        let matches = registry
            .build_cli()
            .try_get_matches_from(["fluid-rs", "test", "--verbose", "--settings", "fluid.toml"])
            .unwrap();
        let (name, sub_matches) = matches.subcommand().unwrap();
        assert_eq!(name, "test");
        assert!(sub_matches.get_flag("verbose"));
        assert_eq!(
            sub_matches.get_one::<String>("settings").map(String::as_str),
            Some("fluid.toml")
        );
    }

    #[test]
    fn test_execute_dispatches() {
        let mut registry = CommandRegistry::new();
        registry.register(Box::new(TestCommand::new("test")));
        registry.register(Box::new(FailingCommand));
        let settings = Settings::default();

        let ok = registry.build_cli().try_get_matches_from(["fluid-rs", "test"]).unwrap();
        assert!(registry.execute(&ok, &settings).is_ok());

        let failing = registry.build_cli().try_get_matches_from(["fluid-rs", "fail"]).unwrap();
        let err = registry.execute(&failing, &settings).unwrap_err();
        assert_eq!(err.code(), 6001);
    }
}

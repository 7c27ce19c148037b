//! Built-in management commands.
//!
//! Each command implements the [`ManagementCommand`](crate::command::ManagementCommand)
//! trait and builds its own [`Engine`](fluid_rs_template::Engine) from the loaded settings.

pub mod check;
pub mod flush;
pub mod render;
pub mod warmup;

pub use check::CheckCommand;
pub use flush::FlushCommand;
pub use render::RenderCommand;
pub use warmup::WarmupCommand;

use crate::command::CommandRegistry;

/// Registers all built-in management commands into the given registry.
pub fn register_builtin_commands(registry: &mut CommandRegistry) {
    registry.register(Box::new(RenderCommand));
    registry.register(Box::new(CheckCommand));
    registry.register(Box::new(WarmupCommand));
    registry.register(Box::new(FlushCommand));
}

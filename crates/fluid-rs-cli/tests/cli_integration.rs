//! Integration tests for the management command registry.
//!
//! Commands are dispatched through the same clap tree the binary builds,
//! against settings pointing at a temporary template directory.

use fluid_rs_cli::commands::register_builtin_commands;
use fluid_rs_cli::CommandRegistry;
use fluid_rs_core::settings::{CacheBackendKind, CacheSettings, PathSettings};
use fluid_rs_core::{settings_loader, Settings};

// ============================================================================
// Shared helpers
// ============================================================================

fn registry() -> CommandRegistry {
    let mut registry = CommandRegistry::new();
    register_builtin_commands(&mut registry);
    registry
}

fn settings(root: &std::path::Path) -> Settings {
    Settings {
        paths: PathSettings {
            template_root_paths: vec![root.join("Templates")],
            layout_root_paths: vec![root.join("Layouts")],
            partial_root_paths: vec![root.join("Partials")],
            format: "html".to_string(),
        },
        cache: CacheSettings {
            backend: CacheBackendKind::File,
            directory: Some(root.join("cache")),
        },
        ..Settings::default()
    }
}

fn run(settings: &Settings, args: &[&str]) -> fluid_rs_core::TemplateResult<()> {
    let registry = registry();
    let matches = registry
        .build_cli()
        .try_get_matches_from(std::iter::once("fluid-rs").chain(args.iter().copied()))
        .unwrap();
    registry.execute(&matches, settings)
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn test_builtin_commands_are_registered() {
    assert_eq!(registry().list_commands(), ["check", "flush", "render", "warmup"]);
}

#[test]
fn test_warmup_then_flush() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("Templates")).unwrap();
    std::fs::write(dir.path().join("Templates/Index.html"), "Hello {name}").unwrap();
    let settings = settings(dir.path());

    run(&settings, &["warmup"]).unwrap();
    assert_eq!(std::fs::read_dir(dir.path().join("cache")).unwrap().count(), 1);

    run(&settings, &["check", "Index"]).unwrap();
    run(&settings, &["render", "Index", "--vars", r#"{"name": "x"}"#]).unwrap();

    run(&settings, &["flush"]).unwrap();
    assert_eq!(std::fs::read_dir(dir.path().join("cache")).unwrap().count(), 0);
}

#[test]
fn test_check_reports_broken_templates() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("Partials")).unwrap();
    std::fs::write(dir.path().join("Partials/Card.html"), "<bad:tag />").unwrap();
    let settings = settings(dir.path());

    let err = run(&settings, &["check"]).unwrap_err();
    assert!(err.to_string().contains("1 error(s)"));
    assert!(run(&settings, &["warmup"]).is_err());
}

#[test]
fn test_settings_file_feeds_commands() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().display().to_string();
    let toml = format!(
        "[paths]\ntemplate_root_paths = [\"{root}/Templates\"]\n\n[cache]\nbackend = \"none\"\n"
    );
    let path = dir.path().join("fluid.toml");
    std::fs::write(&path, toml).unwrap();

    let settings = settings_loader::from_toml_file(&path).unwrap();
    assert_eq!(settings.cache.backend, CacheBackendKind::None);
    let err = run(&settings, &["render", "Missing"]).unwrap_err();
    assert_eq!(err.code(), 4001);
}

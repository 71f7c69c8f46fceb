//! CLI entry point for `keel-package`.

mod args;

pub use args::Args;

use crate::error::Result;
use crate::packager::config::PluginMode;
use crate::packager::{engine, Packager};

/// Parses arguments, locates the engine, runs the pipeline, and prints a
/// summary. Returns the process exit code.
pub async fn run() -> Result<i32> {
    let args = Args::parse_args();

    let app_root = args
        .app_root
        .canonicalize()
        .map_err(|_| anyhow::anyhow!("App directory not found: {}", args.app_root.display()))?;

    let overrides = args.overrides();
    let engine_root = engine::locate_engine(&app_root, overrides.engine.as_deref())?;

    let packager = Packager::new(app_root, engine_root, overrides.clone());
    let packaged = packager.run().await?;

    println!("{}", packaged.bundle_path.display());
    if let Some(dmg) = &packaged.dmg_path {
        println!("{}", dmg.display());
    }
    if let Some(note) = plugin_note(packaged.plugin_mode) {
        println!("{note}");
    }

    Ok(0)
}

/// Summary note keyed off the resolved plugin mode, not the CLI flag:
/// side-by-side is the default and applies without any `--mode` argument.
fn plugin_note(mode: PluginMode) -> Option<&'static str> {
    (mode == PluginMode::SideBySide).then_some("Plugins stay external (side-by-side, hot-reload)")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packager::config::{AppDescriptor, PackageOverrides, ResolvedBuild};

    #[test]
    fn external_plugin_note_follows_the_resolved_mode() {
        assert!(plugin_note(PluginMode::SideBySide).is_some());
        assert!(plugin_note(PluginMode::Bundled).is_none());
    }

    #[test]
    fn note_appears_for_the_default_resolution_without_flags() {
        let build = ResolvedBuild::resolve_with_env(
            &AppDescriptor::default(),
            &PackageOverrides::default(),
            |_| None,
        );
        assert!(plugin_note(build.plugin_mode).is_some());
    }
}

//! Framework runtime (engine) discovery.
//!
//! The packager never builds Keel Desktop itself; it only locates a built
//! copy. An explicit `--engine` path is used verbatim (and failing fast when
//! absent). Otherwise an ordered list of probes runs, first match wins:
//!
//! 1. the packager's own installation root (the tool ships in
//!    `<engine>/tools/`),
//! 2. a `keel-desktop/` directory vendored inside the app tree,
//! 3. the global per-version cache at `~/.keel/engines/<version>`, keyed by
//!    the install root's `version.txt`.

use crate::error::{PackagerError, Result};
use std::path::{Path, PathBuf};

/// Directory of the engine's AppKit host project inside an engine checkout.
pub const ENGINE_APP_DIR: &str = "Keel.App";

/// Vendored engine directory name inside an app tree.
pub const VENDORED_ENGINE_DIR: &str = "keel-desktop";

/// Returns the engine's publish `Contents/` directory, preferring the
/// requested configuration and falling back to the other one.
pub fn engine_contents(engine: &Path, debug: bool) -> Option<PathBuf> {
    let modes: [&str; 2] = if debug {
        ["Debug", "Release"]
    } else {
        ["Release", "Debug"]
    };
    for mode in modes {
        let contents = engine
            .join(ENGINE_APP_DIR)
            .join("bin")
            .join(mode)
            .join("net10.0-macos")
            .join("osx-arm64")
            .join("Keel.app")
            .join("Contents");
        if contents.exists() {
            return Some(contents);
        }
    }
    None
}

/// A candidate has a usable runtime when its publish output exists and
/// contains the MacOS binary directory.
fn has_built_runtime(engine: &Path) -> bool {
    engine_contents(engine, false).is_some_and(|contents| contents.join("MacOS").exists())
}

/// Engine root derived from the running executable (`<engine>/tools/<exe>`).
fn install_root() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    Some(exe.parent()?.parent()?.to_path_buf())
}

fn probe_install_root() -> Option<PathBuf> {
    install_root().filter(|root| has_built_runtime(root))
}

fn probe_vendored(app_root: &Path) -> Option<PathBuf> {
    let vendored = app_root.join(VENDORED_ENGINE_DIR);
    has_built_runtime(&vendored).then_some(vendored)
}

/// Per-version cache, keyed by the install root's version.txt marker.
fn probe_version_cache() -> Option<PathBuf> {
    let version_file = install_root()?.join("version.txt");
    let version = std::fs::read_to_string(version_file).ok()?;
    let cached = dirs::home_dir()?
        .join(".keel")
        .join("engines")
        .join(version.trim());
    has_built_runtime(&cached).then_some(cached)
}

/// Locates the engine root for this run.
///
/// With an explicit path: use it if it exists, otherwise fail fast without
/// probing. Without one: run the probe order above and fail with
/// [`PackagerError::EngineNotFound`] when nothing matches.
pub fn locate_engine(app_root: &Path, explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(PackagerError::ExplicitEnginePathNotFound {
            path: path.to_path_buf(),
        });
    }

    let probes: [(&str, Box<dyn Fn() -> Option<PathBuf> + '_>); 3] = [
        ("install root", Box::new(probe_install_root)),
        ("vendored", Box::new(|| probe_vendored(app_root))),
        ("version cache", Box::new(probe_version_cache)),
    ];

    for (label, probe) in probes {
        if let Some(engine) = probe() {
            log::info!("Engine: {} ({})", engine.display(), label);
            return Ok(engine);
        }
    }

    Err(PackagerError::EngineNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_engine(root: &Path, mode: &str, with_macos: bool) {
        let contents = root
            .join(ENGINE_APP_DIR)
            .join("bin")
            .join(mode)
            .join("net10.0-macos")
            .join("osx-arm64")
            .join("Keel.app")
            .join("Contents");
        std::fs::create_dir_all(&contents).expect("mkdir");
        if with_macos {
            std::fs::create_dir_all(contents.join("MacOS")).expect("mkdir");
        }
    }

    #[test]
    fn explicit_missing_path_fails_fast() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("nope");
        let err = locate_engine(dir.path(), Some(&missing)).expect_err("must fail");
        assert!(matches!(
            err,
            PackagerError::ExplicitEnginePathNotFound { .. }
        ));
    }

    #[test]
    fn vendored_engine_is_discovered() {
        let app = tempfile::tempdir().expect("tempdir");
        let vendored = app.path().join(VENDORED_ENGINE_DIR);
        fake_engine(&vendored, "Release", true);
        let found = probe_vendored(app.path()).expect("found");
        assert_eq!(found, vendored);
    }

    #[test]
    fn publish_output_without_macos_dir_does_not_count() {
        let app = tempfile::tempdir().expect("tempdir");
        fake_engine(&app.path().join(VENDORED_ENGINE_DIR), "Release", false);
        assert!(probe_vendored(app.path()).is_none());
    }

    #[test]
    fn debug_flag_prefers_debug_output() {
        let engine = tempfile::tempdir().expect("tempdir");
        fake_engine(engine.path(), "Release", true);
        fake_engine(engine.path(), "Debug", true);
        let contents = engine_contents(engine.path(), true).expect("found");
        assert!(contents.to_string_lossy().contains("Debug"));
    }

    #[test]
    fn release_is_the_fallback_for_debug() {
        let engine = tempfile::tempdir().expect("tempdir");
        fake_engine(engine.path(), "Release", true);
        let contents = engine_contents(engine.path(), true).expect("found");
        assert!(contents.to_string_lossy().contains("Release"));
    }
}

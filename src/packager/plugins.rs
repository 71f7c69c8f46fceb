//! Plugin placement resolution and bundle-relative path rewriting.
//!
//! In side-by-side mode the plugin directory stays outside the bundle and
//! the shipped config points back at it with a relative path that climbs
//! from `Contents/Resources` up to the app root. That climb distance is a
//! property of the bundle layout and is centralized here; every rewrite
//! must go through [`rewrite_external_path`].

use super::config::{PluginMode, PluginsConfig};
use std::path::{Path, PathBuf};

/// Directory levels between the bundle's Resources directory and the app
/// root: `<app>/dist/<Name>.app/Contents/Resources`.
pub const BUNDLE_TO_APP_ROOT_STEPS: usize = 4;

/// Placeholder plugin directory name shipped in side-by-side configs. The
/// runtime treats it as "no bundled plugins present".
pub const NO_BUNDLED_PLUGINS_DIR: &str = ".no-bundled-plugins";

/// Rewrites an app-root-relative path so it stays valid from inside the
/// bundle's Resources directory.
///
/// Absolute, home-relative and environment-variable-rooted values already
/// point outside the bundle and pass through unchanged.
pub fn rewrite_external_path(value: &str) -> String {
    if value.starts_with('/') || value.starts_with('~') || value.starts_with('$') {
        return value.to_string();
    }
    let mut rewritten = "../".repeat(BUNDLE_TO_APP_ROOT_STEPS);
    rewritten.push_str(value);
    rewritten
}

/// Resolved plugin placement for one packaging run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PluginPlacement {
    /// Plugin subsystem disabled in the descriptor.
    Disabled,
    /// Plugin directory is copied into Resources and signed with the app.
    Bundled {
        /// Source plugin directory (may not exist; assembly skips the copy
        /// then).
        source: PathBuf,
        /// Directory name inside Resources.
        dir_name: String,
    },
    /// Plugin directory stays external and hot-reloadable.
    SideBySide {
        /// Declared plugin directory name under the app root.
        dir_name: String,
    },
}

/// Decides placement from the enabled flag and the resolved mode.
pub fn resolve_placement(
    app_root: &Path,
    plugins: &PluginsConfig,
    mode: PluginMode,
) -> PluginPlacement {
    if !plugins.enabled {
        return PluginPlacement::Disabled;
    }
    match mode {
        PluginMode::Bundled => PluginPlacement::Bundled {
            source: app_root.join(&plugins.dir),
            dir_name: plugins.dir.clone(),
        },
        PluginMode::SideBySide => PluginPlacement::SideBySide {
            dir_name: plugins.dir.clone(),
        },
    }
}

/// Produces the plugin block of the config shipped inside the bundle.
///
/// Side-by-side: external discovery points back at the original directories
/// through the bundle-relative rewrite and hot reload stays on. Bundled:
/// hot reload is off, the user directory is dropped, and the extension
/// directory is preserved since community extensions remain external even
/// in bundled mode. Both modes record the resolved external-signature
/// allowance.
pub fn project_plugins(
    plugins: &PluginsConfig,
    placement: &PluginPlacement,
    allow_external: bool,
) -> PluginsConfig {
    let mut shipped = plugins.clone();
    match placement {
        PluginPlacement::Disabled => shipped,
        PluginPlacement::Bundled { .. } => {
            shipped.hot_reload = Some(false);
            shipped.user_dir = None;
            shipped.allow_external_signatures = allow_external;
            shipped
        }
        PluginPlacement::SideBySide { dir_name } => {
            shipped.user_dir = Some(rewrite_external_path(dir_name));
            shipped.dir = NO_BUNDLED_PLUGINS_DIR.to_string();
            shipped.hot_reload = Some(true);
            shipped.allow_external_signatures = allow_external;
            if let Some(native_dir) = &plugins.native_dir {
                shipped.native_dir = Some(rewrite_external_path(native_dir));
            }
            if let Some(extension_dir) = &plugins.extension_dir {
                shipped.extension_dir = Some(rewrite_external_path(extension_dir));
            }
            shipped
        }
    }
}

//! App descriptor loading and data model.
//!
//! The descriptor (`keel.config.json`, with `keel.json` as a fallback name)
//! is the single declarative input describing an app: identity, plugin
//! layout, Bun runtime layout, workers and build settings. It is loaded once
//! per packaging run and immutable thereafter.
//!
//! The file format is JSONC-lite: full-line `//` comments are stripped
//! before parsing. Unknown fields are preserved so they survive into the
//! runtime config shipped inside the bundle.

mod resolve;

pub use resolve::{PackageOverrides, ResolvedBuild, NOTARY_PROFILE_ENV, SIGNING_IDENTITY_ENV};

use crate::error::{PackagerError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;

/// Accepted descriptor file names, in lookup order.
pub const CONFIG_FILE_NAMES: [&str; 2] = ["keel.config.json", "keel.json"];

/// Placement of native plugin dylibs relative to the bundle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
pub enum PluginMode {
    /// Plugin directory is copied into bundle resources and signed with the app.
    #[serde(rename = "bundled")]
    #[value(name = "bundled")]
    Bundled,
    /// Plugin directory stays outside the bundle, hot-reloadable without resigning.
    #[serde(rename = "side-by-side")]
    #[value(name = "side-by-side")]
    SideBySide,
}

/// Top-level app descriptor.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppDescriptor {
    /// Display name, also used (minus spaces) for the bundle directory name.
    #[serde(default = "defaults::name")]
    pub name: String,

    /// Bundle identifier (CFBundleIdentifier).
    #[serde(default = "defaults::id")]
    pub id: String,

    /// Version string (CFBundleShortVersionString).
    #[serde(default = "defaults::version")]
    pub version: String,

    /// Directory containing AppIcon.icns and in-app icon assets.
    #[serde(default = "defaults::icon_dir")]
    pub icon_dir: String,

    /// Relative path to the managed assembly to ship in Resources, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_assembly: Option<String>,

    /// Native plugin configuration.
    #[serde(default)]
    pub plugins: PluginsConfig,

    /// Bun runtime configuration.
    #[serde(default)]
    pub runtime: RuntimeBlock,

    /// Declared worker hosts.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub workers: Vec<WorkerConfig>,

    /// Auxiliary scripts shipped under Resources/scripts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scripts: Option<ScriptsConfig>,

    /// Build-only settings. Stripped from the config shipped in the bundle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildDescriptor>,

    /// Fields this tool does not interpret but must ship unchanged.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for AppDescriptor {
    fn default() -> Self {
        Self {
            name: defaults::name(),
            id: defaults::id(),
            version: defaults::version(),
            icon_dir: defaults::icon_dir(),
            app_assembly: None,
            plugins: PluginsConfig::default(),
            runtime: RuntimeBlock::default(),
            workers: Vec::new(),
            scripts: None,
            build: None,
            extra: serde_json::Map::new(),
        }
    }
}

impl AppDescriptor {
    /// Bundle directory stem: the display name with spaces removed.
    pub fn safe_name(&self) -> String {
        self.name.replace(' ', "")
    }
}

/// Native plugin block of the descriptor.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginsConfig {
    /// Whether the plugin subsystem is active at all.
    #[serde(default = "defaults::enabled")]
    pub enabled: bool,

    /// Default placement mode; overridden by build.pluginMode and --mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<PluginMode>,

    /// Plugin directory name under the app root.
    #[serde(default = "defaults::plugins_dir")]
    pub dir: String,

    /// Optional user-writable plugin directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_dir: Option<String>,

    /// Optional third-party extension directory. Absolute, `~`- and
    /// `$`-rooted values already point outside the bundle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension_dir: Option<String>,

    /// Optional native helper directory, rewritten like userDir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_dir: Option<String>,

    /// Allow loading dylibs signed by other teams.
    #[serde(default)]
    pub allow_external_signatures: bool,

    /// Whether the shipped app watches plugin directories for changes.
    /// Set by the projector, not by app authors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hot_reload: Option<bool>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: None,
            dir: defaults::plugins_dir(),
            user_dir: None,
            extension_dir: None,
            native_dir: None,
            allow_external_signatures: false,
            hot_reload: None,
            extra: serde_json::Map::new(),
        }
    }
}

/// Bun runtime block of the descriptor.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeBlock {
    /// Whether the app ships a Bun runtime at all.
    #[serde(default = "defaults::enabled")]
    pub enabled: bool,

    /// Runtime source root under the app root.
    #[serde(default = "defaults::runtime_root")]
    pub root: String,

    /// Name of the compiled main host executable. Set by the projector.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compiled_exe: Option<String>,

    /// Name of the compiled worker host executable. Set by the projector.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compiled_worker_exe: Option<String>,

    /// Whether web assets were pre-bundled at package time. Set by the projector.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_built_web: Option<bool>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for RuntimeBlock {
    fn default() -> Self {
        Self {
            enabled: true,
            root: defaults::runtime_root(),
            compiled_exe: None,
            compiled_worker_exe: None,
            pre_built_web: None,
            extra: serde_json::Map::new(),
        }
    }
}

/// One declared worker host.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerConfig {
    /// Logical worker name.
    #[serde(default)]
    pub name: String,

    /// Services directory for this worker, relative to the runtime root.
    #[serde(default)]
    pub services_dir: String,
}

/// Auxiliary scripts block.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptsConfig {
    /// Scripts directory name under the app root.
    #[serde(default = "defaults::scripts_dir")]
    pub dir: String,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            dir: defaults::scripts_dir(),
            extra: serde_json::Map::new(),
        }
    }
}

/// Build-only block of the descriptor.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildDescriptor {
    /// Plugin placement mode for this build.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_mode: Option<PluginMode>,

    /// Output directory under the app root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_dir: Option<String>,

    /// codesign identity. "-" or absent means ad-hoc.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signing_identity: Option<String>,

    /// Refuse to package with an ad-hoc signature.
    #[serde(default)]
    pub require_signing_identity: bool,

    /// Submit the final artifact for notarization.
    #[serde(default)]
    pub notarize: bool,

    /// notarytool keychain profile name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notary_profile: Option<String>,

    /// Also create a compressed disk image.
    #[serde(default)]
    pub dmg: bool,

    /// LSMinimumSystemVersion override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_system_version: Option<String>,

    /// LSApplicationCategoryType.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Extra files or directories copied verbatim into Resources.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_resources: Vec<String>,
}

mod defaults {
    pub fn name() -> String {
        "Keel App".to_string()
    }
    pub fn id() -> String {
        "com.keel.app".to_string()
    }
    pub fn version() -> String {
        "1.0.0".to_string()
    }
    pub fn icon_dir() -> String {
        "icons".to_string()
    }
    pub fn plugins_dir() -> String {
        "dylib".to_string()
    }
    pub fn runtime_root() -> String {
        "runtime".to_string()
    }
    pub fn scripts_dir() -> String {
        "scripts".to_string()
    }
    pub fn enabled() -> bool {
        true
    }
}

static LINE_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*//.*$").expect("line-comment pattern is valid"));

/// Strips full-line `//` comments so annotated descriptors parse as JSON.
pub fn strip_line_comments(text: &str) -> String {
    LINE_COMMENT.replace_all(text, "").into_owned()
}

/// Loads the app descriptor from the app root.
///
/// Tries `keel.config.json` first, then `keel.json`. Fails with
/// [`PackagerError::ConfigMissing`] when neither exists; packaging cannot
/// proceed without a descriptor.
pub async fn load_descriptor(app_root: &Path) -> Result<AppDescriptor> {
    for name in CONFIG_FILE_NAMES {
        let path = app_root.join(name);
        if path.exists() {
            let text = tokio::fs::read_to_string(&path).await?;
            let descriptor: AppDescriptor = serde_json::from_str(&strip_line_comments(&text))
                .map_err(|source| PackagerError::ConfigInvalid {
                    path: path.clone(),
                    source,
                })?;
            log::info!("Config: {}", name);
            return Ok(descriptor);
        }
    }

    Err(PackagerError::ConfigMissing {
        app_root: app_root.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_comments_are_stripped() {
        let text = "// header\n{\n  // inline full-line\n  \"name\": \"Demo\"\n}\n";
        let stripped = strip_line_comments(&text);
        let value: serde_json::Value = serde_json::from_str(&stripped).expect("valid JSON");
        assert_eq!(value["name"], "Demo");
    }

    #[test]
    fn unknown_fields_survive_a_round_trip() {
        let descriptor: AppDescriptor = serde_json::from_str(
            r#"{"name": "Demo", "telemetry": {"enabled": false}}"#,
        )
        .expect("parses");
        let out = serde_json::to_value(&descriptor).expect("serializes");
        assert_eq!(out["telemetry"]["enabled"], false);
    }

    #[test]
    fn safe_name_drops_spaces() {
        let descriptor = AppDescriptor {
            name: "Docs Viewer".to_string(),
            ..Default::default()
        };
        assert_eq!(descriptor.safe_name(), "DocsViewer");
    }

    #[test]
    fn plugin_mode_parses_kebab_case() {
        let plugins: PluginsConfig =
            serde_json::from_str(r#"{"mode": "side-by-side"}"#).expect("parses");
        assert_eq!(plugins.mode, Some(PluginMode::SideBySide));
    }
}

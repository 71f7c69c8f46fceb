//! Layered build-setting resolution.
//!
//! Every setting is resolved by an explicit precedence chain
//! (CLI override > build descriptor > descriptor default > built-in default)
//! rather than by merging dictionaries, so precedence stays auditable.
//! Signing identity and notary profile additionally fall back to the
//! environment.

use super::{AppDescriptor, BuildDescriptor, PluginMode};
use std::path::PathBuf;

/// Environment fallback for the codesign identity.
pub const SIGNING_IDENTITY_ENV: &str = "KEEL_SIGNING_IDENTITY";

/// Environment fallback for the notarytool keychain profile.
pub const NOTARY_PROFILE_ENV: &str = "KEEL_NOTARY_PROFILE";

/// CLI-level overrides, the highest-precedence resolution layer.
#[derive(Clone, Debug, Default)]
pub struct PackageOverrides {
    /// Explicit engine location (bypasses the probe order).
    pub engine: Option<PathBuf>,

    /// Prefer the engine's Debug publish output.
    pub debug: bool,

    /// `--mode`, overrides build.pluginMode and plugins.mode.
    pub mode: Option<PluginMode>,

    /// `--dmg`, overrides build.dmg.
    pub dmg: Option<bool>,

    /// `--allow-external`, overrides plugins.allowExternalSignatures.
    pub allow_external: Option<bool>,
}

/// Fully resolved build settings for one packaging run.
#[derive(Clone, Debug)]
pub struct ResolvedBuild {
    pub plugin_mode: PluginMode,
    pub out_dir: String,
    pub signing_identity: Option<String>,
    pub require_signing_identity: bool,
    pub notarize: bool,
    pub notary_profile: Option<String>,
    pub create_dmg: bool,
    pub minimum_system_version: String,
    pub category: String,
    pub extra_resources: Vec<String>,
    pub allow_external_signatures: bool,
}

impl ResolvedBuild {
    /// Resolves build settings against the real process environment.
    pub fn resolve(descriptor: &AppDescriptor, overrides: &PackageOverrides) -> Self {
        Self::resolve_with_env(descriptor, overrides, |key| std::env::var(key).ok())
    }

    /// Resolution with an injectable environment, for tests.
    pub fn resolve_with_env(
        descriptor: &AppDescriptor,
        overrides: &PackageOverrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let build = descriptor.build.clone().unwrap_or_default();

        Self {
            plugin_mode: resolve_plugin_mode(descriptor, &build, overrides),
            out_dir: build.out_dir.unwrap_or_else(|| "dist".to_string()),
            signing_identity: build
                .signing_identity
                .or_else(|| env(SIGNING_IDENTITY_ENV)),
            require_signing_identity: build.require_signing_identity,
            notarize: build.notarize,
            notary_profile: build.notary_profile.or_else(|| env(NOTARY_PROFILE_ENV)),
            create_dmg: overrides.dmg.unwrap_or(build.dmg),
            minimum_system_version: build
                .minimum_system_version
                .unwrap_or_else(|| crate::packager::DEFAULT_MIN_SYSTEM_VERSION.to_string()),
            category: build
                .category
                .unwrap_or_else(|| "public.app-category.utilities".to_string()),
            extra_resources: build.extra_resources,
            allow_external_signatures: overrides
                .allow_external
                .unwrap_or(descriptor.plugins.allow_external_signatures),
        }
    }
}

/// Plugin mode precedence: `--mode` > build.pluginMode > plugins.mode > side-by-side.
fn resolve_plugin_mode(
    descriptor: &AppDescriptor,
    build: &BuildDescriptor,
    overrides: &PackageOverrides,
) -> PluginMode {
    overrides
        .mode
        .or(build.plugin_mode)
        .or(descriptor.plugins.mode)
        .unwrap_or(PluginMode::SideBySide)
}

//! Packaging pipeline orchestration.
//!
//! The [`Packager`] drives the stages strictly in order, each stage's output
//! feeding the next: descriptor loading, build-setting resolution, plugin
//! placement, bundle assembly, runtime compilation, config projection,
//! signing, and disk-image/notarization. The pipeline is sequential with no
//! internal parallelism; an interrupted run leaves a partial bundle that the
//! next run deletes and rebuilds.
//!
//! # Module Organization
//!
//! - [`config`] - descriptor model, JSONC loading, layered build resolution
//! - [`engine`] - framework runtime discovery
//! - [`plugins`] - plugin placement and bundle-relative path rewriting
//! - [`assemble`] - bundle skeleton and content assembly
//! - [`runtime`] - Bun web pre-bundling and host compilation
//! - [`project`] - shipped runtime config projection
//! - [`sign`] - entitlements, codesign, verification, Gatekeeper
//! - [`notarize`] - DMG creation, notarytool submission, stapling

pub mod assemble;
pub mod config;
pub mod engine;
pub mod notarize;
pub mod plugins;
pub mod project;
pub mod runtime;
pub mod sign;
pub mod utils;

use crate::error::{PackagerError, Result};
use config::{PluginMode, ResolvedBuild};
use std::path::PathBuf;

pub use config::PackageOverrides;

/// LSMinimumSystemVersion floor applied when the descriptor does not
/// override it.
pub const DEFAULT_MIN_SYSTEM_VERSION: &str = "15.0";

/// Final artifacts of one packaging run.
#[derive(Clone, Debug)]
pub struct PackagedApp {
    /// The signed `.app` bundle.
    pub bundle_path: PathBuf,
    /// The compressed disk image, when one was requested.
    pub dmg_path: Option<PathBuf>,
    /// Plugin mode the run resolved to, after all override layers.
    pub plugin_mode: PluginMode,
}

/// One packaging run over one app root.
///
/// The output directory and bundle path are exclusively owned by a single
/// run; concurrent runs against the same app root must be serialized by the
/// operator.
#[derive(Debug)]
pub struct Packager {
    app_root: PathBuf,
    engine_root: PathBuf,
    overrides: PackageOverrides,
}

impl Packager {
    /// Creates a packager for an app root and a located engine.
    pub fn new(app_root: PathBuf, engine_root: PathBuf, overrides: PackageOverrides) -> Self {
        Self {
            app_root,
            engine_root,
            overrides,
        }
    }

    /// Runs the full pipeline and returns the produced artifacts.
    pub async fn run(&self) -> Result<PackagedApp> {
        let descriptor = config::load_descriptor(&self.app_root).await?;
        let build = ResolvedBuild::resolve(&descriptor, &self.overrides);
        let placement =
            plugins::resolve_placement(&self.app_root, &descriptor.plugins, build.plugin_mode);

        log::info!(
            "Packaging {} v{} (mode: {:?})",
            descriptor.name,
            descriptor.version,
            build.plugin_mode
        );

        let bundle = assemble::assemble(
            &self.app_root,
            &self.engine_root,
            &descriptor,
            &build,
            &placement,
            self.overrides.debug,
        )
        .await?;

        let compiled =
            runtime::compile_runtime(&self.app_root, &self.engine_root, &descriptor, &bundle)
                .await?;

        let shipped = project::project_runtime_config(
            &descriptor,
            &placement,
            build.allow_external_signatures,
            &compiled,
        );
        project::write_runtime_config(&shipped, &bundle.resources).await?;

        sign::run_signing(&self.engine_root, &bundle, &build).await?;

        let dmg_path = if build.create_dmg {
            Some(
                notarize::create_dmg(
                    &bundle.root,
                    &descriptor.name,
                    &self.app_root.join(&build.out_dir),
                    &descriptor.safe_name(),
                )
                .await?,
            )
        } else {
            None
        };

        if build.notarize {
            let profile =
                build
                    .notary_profile
                    .as_deref()
                    .ok_or_else(|| PackagerError::SigningPrecondition {
                        reason: "notarization enabled but no notary profile configured".to_string(),
                    })?;
            let target = dmg_path.as_deref().unwrap_or(&bundle.root);
            notarize::notarize(target, &bundle.root, profile).await?;
        }

        Ok(PackagedApp {
            bundle_path: bundle.root,
            dmg_path,
            plugin_mode: build.plugin_mode,
        })
    }
}

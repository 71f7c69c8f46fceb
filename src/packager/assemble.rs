//! Bundle skeleton creation and content assembly.
//!
//! Builds the fixed `.app` layout (`Contents/MacOS`, `Contents/Resources`)
//! and fills it in a fixed order: Info.plist, framework runtime, app icon,
//! plugins, managed assembly, scripts, extra resources, icon sources.
//! Assembly is idempotent by replacement: an existing bundle at the target
//! path is deleted in full before anything is copied.

use crate::error::Result;
use crate::packager::config::{AppDescriptor, ResolvedBuild};
use crate::packager::engine;
use crate::packager::plugins::PluginPlacement;
use crate::packager::utils::fs;
use serde_json::json;
use std::path::{Path, PathBuf};

/// Executable name of the engine's AppKit host inside the bundle.
pub const ENGINE_EXECUTABLE: &str = "Keel.App";

/// Engine Contents/ entries regenerated during packaging and therefore not
/// copied from the publish output.
const ENGINE_COPY_SKIP: [&str; 3] = ["_CodeSignature", "Info.plist", "PkgInfo"];

/// Fixed paths of a bundle under construction.
#[derive(Clone, Debug)]
pub struct BundlePaths {
    /// `<outDir>/<SafeName>.app`
    pub root: PathBuf,
    /// `<root>/Contents`
    pub contents: PathBuf,
    /// `<root>/Contents/MacOS`
    pub macos: PathBuf,
    /// `<root>/Contents/Resources`
    pub resources: PathBuf,
}

impl BundlePaths {
    /// Lays out bundle paths for an app name inside an output directory.
    pub fn new(out_dir: &Path, safe_name: &str) -> Self {
        let root = out_dir.join(format!("{safe_name}.app"));
        let contents = root.join("Contents");
        Self {
            macos: contents.join("MacOS"),
            resources: contents.join("Resources"),
            contents,
            root,
        }
    }
}

/// Assembles the bundle from the app tree and the engine publish output.
pub async fn assemble(
    app_root: &Path,
    engine_root: &Path,
    descriptor: &AppDescriptor,
    build: &ResolvedBuild,
    placement: &PluginPlacement,
    debug: bool,
) -> Result<BundlePaths> {
    let bundle = BundlePaths::new(&app_root.join(&build.out_dir), &descriptor.safe_name());

    // Clean previous build, then skeleton
    fs::remove_dir_all(&bundle.root).await?;
    fs::create_dir_all(&bundle.macos, false).await?;
    fs::create_dir_all(&bundle.resources, false).await?;

    write_info_plist(engine_root, descriptor, build, &bundle).await?;
    copy_engine_runtime(engine_root, &bundle, debug).await?;
    copy_app_icon(app_root, descriptor, &bundle).await?;
    apply_plugin_placement(placement, &bundle).await?;
    copy_app_assembly(app_root, descriptor, &bundle).await?;
    copy_scripts(app_root, descriptor, &bundle).await?;
    copy_extra_resources(app_root, build, &bundle).await?;
    copy_icon_sources(app_root, descriptor, &bundle).await?;

    Ok(bundle)
}

/// Renders Info.plist from the engine's template, falling back to the
/// engine's static Info.plist when no template ships.
async fn write_info_plist(
    engine_root: &Path,
    descriptor: &AppDescriptor,
    build: &ResolvedBuild,
    bundle: &BundlePaths,
) -> Result<()> {
    let engine_app = engine_root.join(engine::ENGINE_APP_DIR);
    let template_path = engine_app.join("Info.plist.template");
    let dest = bundle.contents.join("Info.plist");

    if template_path.exists() {
        let template = tokio::fs::read_to_string(&template_path).await?;
        let rendered = handlebars::Handlebars::new().render_template(
            &template,
            &json!({
                "BUNDLE_NAME": descriptor.name,
                "BUNDLE_ID": descriptor.id,
                "BUNDLE_VERSION": descriptor.version,
                "BUNDLE_EXECUTABLE": ENGINE_EXECUTABLE,
                "BUNDLE_CATEGORY": build.category,
                "BUNDLE_MIN_VERSION": build.minimum_system_version,
            }),
        )?;
        tokio::fs::write(&dest, rendered).await?;
        log::info!("Info.plist: {} ({})", descriptor.name, descriptor.id);
        return Ok(());
    }

    let static_plist = engine_app.join("Info.plist");
    if static_plist.exists() {
        fs::copy_file(&static_plist, &dest).await?;
    } else {
        log::warn!("Engine ships no Info.plist template; bundle will have none");
    }
    Ok(())
}

/// Copies the engine publish Contents/ tree into the bundle.
///
/// Skips signature artifacts and metadata regenerated during packaging, and
/// skips the engine's raw runtime sources under Resources: the compiled
/// runtime produced later supersedes them.
async fn copy_engine_runtime(engine_root: &Path, bundle: &BundlePaths, debug: bool) -> Result<()> {
    let Some(src_contents) = engine::engine_contents(engine_root, debug) else {
        log::warn!("Framework not built; run the engine build first. Bundle will lack the runtime");
        return Ok(());
    };

    let mut entries = tokio::fs::read_dir(&src_contents).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let name_str = name.to_string_lossy().into_owned();
        if ENGINE_COPY_SKIP.contains(&name_str.as_str()) {
            continue;
        }
        let dst = bundle.contents.join(&name);
        if entry.file_type().await?.is_dir() {
            if name_str == "Resources" {
                fs::copy_dir_filtered(&entry.path(), &dst, |rel| {
                    !rel.starts_with(crate::packager::runtime::ENGINE_RUNTIME_DIR)
                })
                .await?;
            } else {
                fs::copy_dir(&entry.path(), &dst).await?;
            }
        } else {
            fs::copy_file(&entry.path(), &dst).await?;
        }
    }
    log::info!("Framework: copied");
    Ok(())
}

async fn copy_app_icon(
    app_root: &Path,
    descriptor: &AppDescriptor,
    bundle: &BundlePaths,
) -> Result<()> {
    let icon_file = app_root.join(&descriptor.icon_dir).join("AppIcon.icns");
    if icon_file.exists() {
        fs::copy_file(&icon_file, &bundle.resources.join("AppIcon.icns")).await?;
        log::info!("Icon: AppIcon.icns");
    }
    Ok(())
}

/// Physically copies the plugin directory for bundled placement. Side-by-side
/// placement leaves the directory untouched on disk; only the shipped config
/// changes.
async fn apply_plugin_placement(placement: &PluginPlacement, bundle: &BundlePaths) -> Result<()> {
    match placement {
        PluginPlacement::Disabled => {}
        PluginPlacement::Bundled { source, dir_name } => {
            if source.is_dir() {
                fs::copy_dir(source, &bundle.resources.join(dir_name)).await?;
                log::info!("Plugins: bundled ({dir_name}/)");
            } else {
                log::warn!(
                    "Plugins: bundled mode requested but {} does not exist",
                    source.display()
                );
            }
        }
        PluginPlacement::SideBySide { dir_name } => {
            log::info!("Plugins: side-by-side ({dir_name}/ stays external)");
        }
    }
    Ok(())
}

/// Ships the declared managed assembly. The engine copy may already have
/// placed it; a declared-but-missing assembly is a warning, not fatal.
async fn copy_app_assembly(
    app_root: &Path,
    descriptor: &AppDescriptor,
    bundle: &BundlePaths,
) -> Result<()> {
    let Some(assembly) = &descriptor.app_assembly else {
        return Ok(());
    };
    let dest = bundle.resources.join(assembly);
    if dest.exists() {
        return Ok(());
    }
    let src = app_root.join(assembly);
    if src.exists() {
        fs::copy_file(&src, &dest).await?;
        log::info!("App assembly: {assembly}");
    } else {
        log::warn!("appAssembly not found: {}", src.display());
    }
    Ok(())
}

async fn copy_scripts(
    app_root: &Path,
    descriptor: &AppDescriptor,
    bundle: &BundlePaths,
) -> Result<()> {
    let dir_name = descriptor
        .scripts
        .as_ref()
        .map(|s| s.dir.as_str())
        .unwrap_or("scripts");
    let scripts_dir = app_root.join(dir_name);
    if fs::dir_is_populated(&scripts_dir).await? {
        fs::copy_dir(&scripts_dir, &bundle.resources.join("scripts")).await?;
        log::info!("Scripts: {dir_name}/");
    }
    Ok(())
}

/// Copies each configured extra resource (file or directory) verbatim into
/// Resources under its own file name.
async fn copy_extra_resources(
    app_root: &Path,
    build: &ResolvedBuild,
    bundle: &BundlePaths,
) -> Result<()> {
    for extra in &build.extra_resources {
        let src = app_root.join(extra);
        let Some(file_name) = src.file_name() else {
            log::warn!("Extra resource has no file name, skipped: {extra}");
            continue;
        };
        if !src.exists() {
            log::warn!("Extra resource not found, skipped: {}", src.display());
            continue;
        }
        let dst = bundle.resources.join(file_name);
        if src.is_dir() {
            fs::copy_dir(&src, &dst).await?;
        } else {
            fs::copy_file(&src, &dst).await?;
        }
        log::info!("Extra: {extra}");
    }
    Ok(())
}

/// Ships the full icon source directory for in-app UI, distinct from the
/// single rendered AppIcon.icns.
async fn copy_icon_sources(
    app_root: &Path,
    descriptor: &AppDescriptor,
    bundle: &BundlePaths,
) -> Result<()> {
    let icon_dir = app_root.join(&descriptor.icon_dir);
    if icon_dir.is_dir() {
        fs::copy_dir(&icon_dir, &bundle.resources.join("icons")).await?;
    }
    Ok(())
}

//! Bun runtime compilation.
//!
//! Pre-bundles web components, statically links discovered service modules
//! into single-file host executables, and ships a pre-resolved config
//! artifact. The resulting bundle contains no raw TypeScript and performs no
//! source evaluation at launch.
//!
//! Every step is individually skippable when its inputs are absent; failures
//! of the external bundler or compiler are fatal.

pub mod services;
pub mod web;

use crate::error::{PackagerError, Result};
use crate::packager::assemble::BundlePaths;
use crate::packager::config::AppDescriptor;
use crate::packager::utils::{fs, process};
use services::Service;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Engine-side runtime source directory (`<engine>/runtime/`), also the name
/// of the engine's raw runtime tree excluded from the framework copy.
pub const ENGINE_RUNTIME_DIR: &str = "runtime";

/// File name of the pre-resolved config artifact inside the bundle.
pub const RESOLVED_CONFIG_FILE: &str = "keel.resolved.json";

/// Transient wrapper file names, removed on success and failure.
const HOST_WRAPPER: &str = "_compiled_host_entry.ts";
const WORKER_WRAPPER: &str = "_compiled_worker_entry.ts";

/// Locate bun once per run.
static BUN: LazyLock<Option<PathBuf>> = LazyLock::new(|| match which::which("bun") {
    Ok(path) => {
        log::debug!("Found bun at: {}", path.display());
        Some(path)
    }
    Err(e) => {
        log::debug!("bun not found in PATH: {e}");
        None
    }
});

fn ensure_bun() -> Result<()> {
    if BUN.is_some() {
        Ok(())
    } else {
        Err(PackagerError::ToolMissing {
            tool: "bun".to_string(),
            hint: "Install Bun (https://bun.sh) to compile the app runtime, or disable the \
                   runtime block in keel.config.json."
                .to_string(),
        })
    }
}

/// Artifacts produced by runtime compilation, recorded in the shipped config.
#[derive(Clone, Debug, Default)]
pub struct CompiledRuntime {
    /// Main host executable name under Contents/MacOS, if compiled.
    pub exe: Option<String>,
    /// Worker host executable name under Contents/MacOS, if compiled.
    pub worker_exe: Option<String>,
    /// Whether any web component was pre-bundled.
    pub pre_built_web: bool,
}

/// Runs the full runtime compilation stage for one bundle.
pub async fn compile_runtime(
    app_root: &Path,
    engine_root: &Path,
    descriptor: &AppDescriptor,
    bundle: &BundlePaths,
) -> Result<CompiledRuntime> {
    if !descriptor.runtime.enabled {
        return Ok(CompiledRuntime::default());
    }

    let runtime_root = app_root.join(&descriptor.runtime.root);
    let bundle_runtime = bundle.resources.join(&descriptor.runtime.root);
    fs::create_dir_all(&bundle_runtime, false).await?;

    // Resolve the declarative config ahead of time; degradable.
    let extracted = web::extract_runtime_config(&runtime_root).await?;

    let web_dir_name = extracted
        .as_ref()
        .map(|e| e.web_dir.clone())
        .unwrap_or_else(|| "web".to_string());

    let components = declared_or_discovered_components(
        extracted.as_ref().map(|e| &e.components),
        &runtime_root,
        &web_dir_name,
    );

    let mut pre_built_web = false;
    if !components.is_empty() && runtime_root.exists() {
        let bundle_web_dir = bundle_runtime.join(&web_dir_name);
        fs::create_dir_all(&bundle_web_dir, false).await?;
        log::info!("Pre-bundling {} web component(s)...", components.len());
        for (name, entry) in &components {
            let entry_abs = runtime_root.join(entry.trim_start_matches("./"));
            if !entry_abs.exists() {
                log::warn!("{entry} not found, skipping {name}");
                continue;
            }
            ensure_bun()?;
            web::bundle_web_component(&runtime_root, name, &entry_abs, &bundle_web_dir).await?;
            pre_built_web = true;
        }
    }

    // Ship the resolved config so the compiled exe reads JSON, not TypeScript.
    let mut resolved = extracted.and_then(|e| e.resolved);
    if let Some(resolved) = &mut resolved {
        mark_web_pre_built(resolved);
        let artifact = bundle_runtime.join(RESOLVED_CONFIG_FILE);
        tokio::fs::write(&artifact, serde_json::to_vec_pretty(resolved)?).await?;
        log::info!("Runtime config: {RESOLVED_CONFIG_FILE} (pre-resolved)");
    }

    let safe_name = descriptor.safe_name();

    // Main host: services statically linked into a single-file executable.
    let exe = match find_bootstrap(&runtime_root, engine_root, "host.ts") {
        Some(host_module) => {
            let services_dir = services_dir_name(resolved.as_ref());
            let main_services = services::discover_services(&runtime_root.join(services_dir));
            let outfile = bundle.macos.join(&safe_name);
            if main_services.is_empty() {
                log::info!("Compiling runtime -> {safe_name}...");
                compile_single_file(&host_module, &outfile).await?;
            } else {
                let names: Vec<&str> = main_services.iter().map(|s| s.name.as_str()).collect();
                log::info!(
                    "Compiling runtime -> {safe_name} (services: {})...",
                    names.join(", ")
                );
                let wrapper = runtime_root.join(HOST_WRAPPER);
                let source = services::host_wrapper_source(&main_services, &host_module);
                compile_via_wrapper(&wrapper, &source, &outfile).await?;
            }
            Some(safe_name.clone())
        }
        None => {
            log::warn!("host.ts not found; runtime not compiled");
            None
        }
    };

    // Worker host, only when workers are declared.
    let worker_exe = if descriptor.workers.is_empty() {
        None
    } else {
        match find_bootstrap(&runtime_root, engine_root, "worker-host.ts") {
            Some(worker_module) => {
                let worker_name = format!("{safe_name}-worker");
                let outfile = bundle.macos.join(&worker_name);
                let workers_services = discover_worker_services(descriptor, &runtime_root);
                if workers_services.is_empty() {
                    log::info!("Compiling worker -> {worker_name}...");
                    compile_single_file(&worker_module, &outfile).await?;
                } else {
                    let total: usize = workers_services.iter().map(|(_, s)| s.len()).sum();
                    log::info!(
                        "Compiling worker -> {worker_name} ({total} services across {} worker(s))...",
                        workers_services.len()
                    );
                    let wrapper = runtime_root.join(WORKER_WRAPPER);
                    let source = services::worker_wrapper_source(&workers_services, &worker_module);
                    compile_via_wrapper(&wrapper, &source, &outfile).await?;
                }
                Some(worker_name)
            }
            None => {
                log::warn!("worker-host.ts not found; workers not compiled");
                None
            }
        }
    };

    Ok(CompiledRuntime {
        exe,
        worker_exe,
        pre_built_web,
    })
}

/// Declared components from the extracted config, or entry-like files
/// auto-discovered in the web source directory when none are declared.
fn declared_or_discovered_components(
    declared: Option<&serde_json::Map<String, serde_json::Value>>,
    runtime_root: &Path,
    web_dir_name: &str,
) -> Vec<(String, String)> {
    if let Some(declared) = declared {
        let components: Vec<(String, String)> = declared
            .iter()
            .filter_map(|(name, entry)| entry.as_str().map(|e| (name.clone(), e.to_string())))
            .collect();
        if !components.is_empty() {
            return components;
        }
    }

    let web_src_dir = runtime_root.join(web_dir_name);
    let Ok(read) = std::fs::read_dir(&web_src_dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = read.filter_map(|e| e.ok().map(|e| e.path())).collect();
    files.sort();
    files
        .into_iter()
        .filter(|f| {
            f.is_file()
                && matches!(
                    f.extension().and_then(|e| e.to_str()),
                    Some("ts") | Some("tsx")
                )
        })
        .filter_map(|f| {
            let stem = f.file_stem()?.to_str()?.to_string();
            let file = f.file_name()?.to_str()?.to_string();
            Some((stem, format!("./{web_dir_name}/{file}")))
        })
        .collect()
}

fn mark_web_pre_built(resolved: &mut serde_json::Value) {
    match resolved.get_mut("web").and_then(|w| w.as_object_mut()) {
        Some(web) => {
            web.insert("preBuilt".to_string(), serde_json::Value::Bool(true));
        }
        None => {
            if let Some(root) = resolved.as_object_mut() {
                root.insert("web".to_string(), serde_json::json!({ "preBuilt": true }));
            }
        }
    }
}

fn services_dir_name(resolved: Option<&serde_json::Value>) -> &str {
    resolved
        .and_then(|v| v.get("services"))
        .and_then(|s| s.get("dir"))
        .and_then(|d| d.as_str())
        .unwrap_or("services")
}

/// Bootstrap lookup order: the app's installed SDK copy, then the engine's
/// runtime source tree.
fn find_bootstrap(runtime_root: &Path, engine_root: &Path, file: &str) -> Option<PathBuf> {
    let installed = runtime_root.join("node_modules/keel-desktop").join(file);
    if installed.exists() {
        return Some(installed);
    }
    let engine_side = engine_root.join(ENGINE_RUNTIME_DIR).join(file);
    engine_side.exists().then_some(engine_side)
}

fn discover_worker_services(
    descriptor: &AppDescriptor,
    runtime_root: &Path,
) -> Vec<(String, Vec<Service>)> {
    descriptor
        .workers
        .iter()
        .filter(|w| !w.name.is_empty() && !w.services_dir.is_empty())
        .filter_map(|w| {
            let found = services::discover_services(&runtime_root.join(&w.services_dir));
            (!found.is_empty()).then(|| (w.name.clone(), found))
        })
        .collect()
}

async fn compile_single_file(module: &Path, outfile: &Path) -> Result<()> {
    ensure_bun()?;
    let args: Vec<OsString> = vec![
        "build".into(),
        "--compile".into(),
        module.as_os_str().to_owned(),
        "--outfile".into(),
        outfile.as_os_str().to_owned(),
    ];
    process::run("bun", &args).await
}

/// Writes the transient wrapper, compiles it, and removes it on both the
/// success and failure paths.
async fn compile_via_wrapper(wrapper: &Path, source: &str, outfile: &Path) -> Result<()> {
    ensure_bun()?;
    tokio::fs::write(wrapper, source).await?;
    let result = compile_single_file(wrapper, outfile).await;
    if let Err(e) = tokio::fs::remove_file(wrapper).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            log::warn!("Could not remove wrapper {}: {e}", wrapper.display());
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_components_win_over_discovery() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut declared = serde_json::Map::new();
        declared.insert(
            "main".to_string(),
            serde_json::Value::String("./web/main.tsx".to_string()),
        );
        let components = declared_or_discovered_components(Some(&declared), dir.path(), "web");
        assert_eq!(
            components,
            vec![("main".to_string(), "./web/main.tsx".to_string())]
        );
    }

    #[test]
    fn entry_like_files_are_discovered_when_nothing_is_declared() {
        let dir = tempfile::tempdir().expect("tempdir");
        let web = dir.path().join("web");
        std::fs::create_dir_all(&web).expect("mkdir");
        std::fs::write(web.join("main.tsx"), "").expect("write");
        std::fs::write(web.join("settings.ts"), "").expect("write");
        std::fs::write(web.join("styles.css"), "").expect("write");

        let components = declared_or_discovered_components(None, dir.path(), "web");
        assert_eq!(
            components,
            vec![
                ("main".to_string(), "./web/main.tsx".to_string()),
                ("settings".to_string(), "./web/settings.ts".to_string()),
            ]
        );
    }

    #[test]
    fn resolved_config_is_marked_pre_built() {
        let mut resolved = serde_json::json!({"web": {"dir": "web"}, "services": {}});
        mark_web_pre_built(&mut resolved);
        assert_eq!(resolved["web"]["preBuilt"], true);

        let mut without_web = serde_json::json!({"services": {}});
        mark_web_pre_built(&mut without_web);
        assert_eq!(without_web["web"]["preBuilt"], true);
    }

    #[test]
    fn services_dir_comes_from_the_resolved_config() {
        let resolved = serde_json::json!({"services": {"dir": "svc"}});
        assert_eq!(services_dir_name(Some(&resolved)), "svc");
        assert_eq!(services_dir_name(None), "services");
    }
}

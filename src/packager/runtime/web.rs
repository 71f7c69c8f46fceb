//! Declarative runtime config extraction and web component pre-bundling.
//!
//! Both steps shell out to Bun: extraction evaluates the app's
//! `keel.config.ts` through the SDK resolver so the bundle ships a fully
//! resolved JSON artifact, and pre-bundling turns each declared web entry
//! into optimized browser-targeted output so no raw TypeScript ships.

use crate::error::Result;
use crate::packager::utils::process;
use serde::Deserialize;
use std::path::Path;

/// Output of evaluating `keel.config.ts` through the SDK's `resolveConfig`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedRuntimeConfig {
    /// Web source directory name under the runtime root.
    #[serde(default = "default_web_dir")]
    pub web_dir: String,

    /// Declared web components: logical name to entry path (relative to the
    /// runtime root).
    #[serde(default)]
    pub components: serde_json::Map<String, serde_json::Value>,

    /// The fully resolved config, serialized into the bundle so the compiled
    /// executable never evaluates TypeScript at startup.
    #[serde(default)]
    pub resolved: Option<serde_json::Value>,
}

fn default_web_dir() -> String {
    "web".to_string()
}

/// Evaluates the runtime's declarative config module ahead of time.
///
/// Returns None (with a warning) when the config module is absent or the
/// extraction fails; the runtime then ships without a pre-resolved config.
pub async fn extract_runtime_config(runtime_root: &Path) -> Result<Option<ExtractedRuntimeConfig>> {
    let config_module = runtime_root.join("keel.config.ts");
    if !config_module.exists() {
        return Ok(None);
    }

    let script = format!(
        r#"
        const {{ resolveConfig }} = require("{sdk}");
        const mod = require("{config}");
        const cfg = mod.default ?? mod;
        const resolved = resolveConfig(cfg);
        console.log(JSON.stringify({{
            webDir: cfg.web?.dir ?? "web",
            components: cfg.web?.components ?? {{}},
            resolved: resolved,
        }}));
        "#,
        sdk = runtime_root
            .join("node_modules/@keel/sdk/config.ts")
            .display(),
        config = config_module.display(),
    );

    match process::run_capture("bun", &["-e", script.as_str()], Some(runtime_root)).await {
        Ok(output) => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            match serde_json::from_str::<ExtractedRuntimeConfig>(stdout.trim()) {
                Ok(extracted) => Ok(Some(extracted)),
                Err(e) => {
                    log::warn!("Could not parse runtime config extraction output: {e}");
                    Ok(None)
                }
            }
        }
        Err(e) => {
            log::warn!("Could not resolve runtime config: {e}");
            Ok(None)
        }
    }
}

/// Pre-bundles one web component entry to `<out_dir>/<name>.js` (plus CSS
/// when the entry imports any) via `Bun.build`. A bundler failure is fatal.
pub async fn bundle_web_component(
    runtime_root: &Path,
    name: &str,
    entry: &Path,
    out_dir: &Path,
) -> Result<()> {
    let script = format!(
        r#"
        const result = await Bun.build({{
            entrypoints: ["{entry}"],
            outdir: "{outdir}",
            target: "browser",
            format: "esm",
            naming: "{name}.[ext]",
        }});
        if (!result.success) {{
            for (const log of result.logs) console.error(log.message);
            process.exit(1);
        }}
        console.log("{name}: " + result.outputs.length + " file(s)");
        "#,
        entry = entry.display(),
        outdir = out_dir.display(),
    );

    let output = process::run_capture("bun", &["-e", script.as_str()], Some(runtime_root)).await?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.trim().is_empty() {
        log::info!("  {}", stdout.trim());
    }
    Ok(())
}

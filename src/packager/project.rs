//! Runtime config projection.
//!
//! Produces the config the shipped app actually reads: the descriptor with
//! the build block stripped, plugin paths rewritten for the bundle layout,
//! and compiled-runtime artifacts recorded. The projected config never
//! references the source app root by absolute path.

use crate::error::Result;
use crate::packager::config::AppDescriptor;
use crate::packager::plugins::{self, PluginPlacement};
use crate::packager::runtime::CompiledRuntime;
use std::path::Path;

/// File name of the projected config inside bundle Resources.
pub const RUNTIME_CONFIG_FILE: &str = "keel.config.json";

/// Builds the projected descriptor shipped inside the bundle.
pub fn project_runtime_config(
    descriptor: &AppDescriptor,
    placement: &PluginPlacement,
    allow_external: bool,
    compiled: &CompiledRuntime,
) -> AppDescriptor {
    let mut shipped = descriptor.clone();
    shipped.build = None;
    shipped.plugins = plugins::project_plugins(&descriptor.plugins, placement, allow_external);

    if let Some(exe) = &compiled.exe {
        shipped.runtime.compiled_exe = Some(exe.clone());
    }
    if let Some(worker_exe) = &compiled.worker_exe {
        shipped.runtime.compiled_worker_exe = Some(worker_exe.clone());
    }
    if compiled.pre_built_web {
        shipped.runtime.pre_built_web = Some(true);
    }

    shipped
}

/// Writes the projected config into bundle Resources.
pub async fn write_runtime_config(shipped: &AppDescriptor, resources: &Path) -> Result<()> {
    let path = resources.join(RUNTIME_CONFIG_FILE);
    tokio::fs::write(&path, serde_json::to_vec_pretty(shipped)?).await?;
    log::info!("Config: {RUNTIME_CONFIG_FILE}");
    Ok(())
}

//! Disk image creation and notarization.
//!
//! The DMG is a compressed UDZO image of the signed bundle, recreated from
//! scratch when one already exists. Notarization submits the distribution
//! artifact (the DMG when one was created, else the bundle) and blocks until
//! the service returns a verdict; the resulting ticket is stapled to the
//! artifact and, best-effort, to the inner bundle.

use crate::error::Result;
use crate::packager::utils::process;
use std::io;
use std::path::{Path, PathBuf};

/// Creates `<out_dir>/<safe_name>.dmg` from the signed bundle.
pub async fn create_dmg(
    bundle_root: &Path,
    volume_name: &str,
    out_dir: &Path,
    safe_name: &str,
) -> Result<PathBuf> {
    let dmg_path = out_dir.join(format!("{safe_name}.dmg"));
    match tokio::fs::remove_file(&dmg_path).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    log::info!("Creating DMG...");
    let src = bundle_root.display().to_string();
    let dest = dmg_path.display().to_string();
    process::run(
        "hdiutil",
        &[
            "create",
            "-volname",
            volume_name,
            "-srcfolder",
            src.as_str(),
            "-ov",
            "-format",
            "UDZO",
            dest.as_str(),
        ],
    )
    .await?;
    log::info!("DMG: {}", dmg_path.display());
    Ok(dmg_path)
}

/// Submits the artifact for notarization and staples the ticket.
///
/// Blocks until the notary service returns a verdict; there is no
/// client-side timeout. When the submitted artifact is a disk image the
/// inner bundle is stapled too, best-effort, since the image's ticket
/// already satisfies distribution.
pub async fn notarize(target: &Path, bundle_root: &Path, profile: &str) -> Result<()> {
    let target_str = target.display().to_string();
    let target_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| target_str.clone());
    log::info!("Notarizing: {target_name} (profile={profile})...");
    process::run(
        "xcrun",
        &[
            "notarytool",
            "submit",
            target_str.as_str(),
            "--keychain-profile",
            profile,
            "--wait",
        ],
    )
    .await?;

    log::info!("Stapling ticket: {target_name}");
    process::run("xcrun", &["stapler", "staple", target_str.as_str()]).await?;

    if target != bundle_root {
        let bundle_str = bundle_root.display().to_string();
        match process::run_status("xcrun", &["stapler", "staple", bundle_str.as_str()]).await {
            Ok(status) if !status.success() => {
                log::warn!("Could not staple inner bundle (exit {status}); DMG ticket suffices");
            }
            Err(e) => log::warn!("Could not staple inner bundle: {e}; DMG ticket suffices"),
            Ok(_) => {}
        }
    }
    Ok(())
}

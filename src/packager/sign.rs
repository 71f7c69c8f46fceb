//! Code signing pipeline.
//!
//! A strict state machine: entitlements, precondition validation, signing,
//! verification, Gatekeeper assessment, quarantine clearing. Each state's
//! failure is terminal except the documented best-effort steps. Precondition
//! violations fire before codesign ever runs.

use crate::error::{PackagerError, Result};
use crate::packager::assemble::BundlePaths;
use crate::packager::config::{ResolvedBuild, NOTARY_PROFILE_ENV, SIGNING_IDENTITY_ENV};
use crate::packager::engine;
use crate::packager::utils::process;
use std::path::{Path, PathBuf};

/// Apple's marker identity for ad-hoc (local, non-distributable) signatures.
pub const ADHOC_IDENTITY: &str = "-";

/// Entitlement granted when externally-signed plugins are allowed.
const DISABLE_LIBRARY_VALIDATION: &str = "com.apple.security.cs.disable-library-validation";

/// Resolved signing inputs for one run.
#[derive(Clone, Debug)]
pub struct SigningContext {
    /// codesign identity; [`ADHOC_IDENTITY`] for ad-hoc.
    pub identity: String,
    /// Trust-tier label, for logs ("hardened-runtime", optionally
    /// "+ external-signatures").
    pub tier: String,
    /// Entitlements manifest actually used, if the engine ships a base one.
    pub entitlements: Option<PathBuf>,
    /// Whether the identity is ad-hoc.
    pub is_adhoc: bool,
    /// Whether hardened-runtime options apply (real identities only).
    pub hardened_runtime: bool,
}

/// Patches the library-validation-disabled entitlement into a base
/// entitlements manifest.
pub fn patch_entitlements(base: &str) -> String {
    let patch = format!("    <key>{DISABLE_LIBRARY_VALIDATION}</key>\n    <true/>\n");
    base.replace("</dict>", &format!("{patch}</dict>"))
}

/// Builds the entitlements manifest shipped in Resources from the engine's
/// base template, optionally patched for third-party plugin trust. Returns
/// the manifest path and the trust-tier label.
async fn build_entitlements(
    engine_root: &Path,
    bundle: &BundlePaths,
    allow_external: bool,
) -> Result<(Option<PathBuf>, String)> {
    let base_path = engine_root
        .join(engine::ENGINE_APP_DIR)
        .join("entitlements.base.plist");
    let mut tier = "hardened-runtime".to_string();

    if !base_path.exists() {
        return Ok((None, tier));
    }

    let mut text = tokio::fs::read_to_string(&base_path).await?;
    if allow_external {
        // External signatures: allow loading dylibs signed by other teams.
        text = patch_entitlements(&text);
        tier.push_str(" + external-signatures");
    }

    let dest = bundle.resources.join("entitlements.plist");
    tokio::fs::write(&dest, text).await?;
    Ok((Some(dest), tier))
}

/// Validates the hard signing preconditions.
///
/// Ad-hoc + requireSigningIdentity, ad-hoc + notarize, and notarize without
/// a notary profile are all hard stops, raised before any codesign
/// invocation (and before disk-image creation).
pub fn validate_preconditions(is_adhoc: bool, build: &ResolvedBuild) -> Result<()> {
    if build.require_signing_identity && is_adhoc {
        return Err(PackagerError::SigningPrecondition {
            reason: format!(
                "requireSigningIdentity is set but no signing identity was configured. \
                 Set build.signingIdentity or {SIGNING_IDENTITY_ENV}."
            ),
        });
    }
    if build.notarize && is_adhoc {
        return Err(PackagerError::SigningPrecondition {
            reason: format!(
                "notarization requires a real Developer ID signing identity \
                 (ad-hoc '{ADHOC_IDENTITY}' is not valid). \
                 Set build.signingIdentity or {SIGNING_IDENTITY_ENV}."
            ),
        });
    }
    if build.notarize && build.notary_profile.is_none() {
        return Err(PackagerError::SigningPrecondition {
            reason: format!(
                "notarization enabled but no notary profile configured. \
                 Set build.notaryProfile or {NOTARY_PROFILE_ENV} \
                 (xcrun notarytool keychain profile name)."
            ),
        });
    }
    Ok(())
}

async fn sign_bundle(bundle: &BundlePaths, ctx: &SigningContext) -> Result<()> {
    let mut args: Vec<String> = vec![
        "--force".into(),
        "--deep".into(),
        "--sign".into(),
        ctx.identity.clone(),
    ];
    if ctx.hardened_runtime {
        // Required for production distribution; meaningless for ad-hoc.
        args.push("--options".into());
        args.push("runtime".into());
        args.push("--timestamp".into());
    }
    if let Some(entitlements) = &ctx.entitlements {
        args.push("--entitlements".into());
        args.push(entitlements.display().to_string());
    }
    args.push(bundle.root.display().to_string());

    log::info!(
        "Signing ({}, {})...",
        ctx.tier,
        if ctx.is_adhoc {
            "ad-hoc"
        } else {
            ctx.identity.as_str()
        }
    );
    process::run("codesign", &args).await
}

async fn verify_signature(bundle: &BundlePaths) -> Result<()> {
    log::info!("Verifying signature...");
    let bundle_path = bundle.root.display().to_string();
    let status = process::run_status(
        "codesign",
        &[
            "--verify",
            "--strict",
            "--deep",
            "--verbose=2",
            bundle_path.as_str(),
        ],
    )
    .await?;
    if !status.success() {
        return Err(PackagerError::SignatureInvalid {
            bundle: bundle.root.clone(),
        });
    }
    Ok(())
}

async fn gatekeeper_check(bundle: &BundlePaths, is_adhoc: bool) -> Result<()> {
    let bundle_path = bundle.root.display().to_string();
    let status =
        process::run_status("spctl", &["-a", "-t", "exec", "-vv", bundle_path.as_str()]).await?;
    if status.success() {
        return Ok(());
    }
    if is_adhoc {
        log::info!("Gatekeeper rejected ad-hoc signature (expected for local/dev builds)");
        return Ok(());
    }
    Err(PackagerError::GatekeeperRejected {
        bundle: bundle.root.clone(),
        code: status.code(),
    })
}

/// Best-effort: drop any download-quarantine marker so the bundle launches
/// directly from the output directory.
async fn clear_quarantine(bundle: &BundlePaths) {
    let bundle_path = bundle.root.display().to_string();
    match process::run_status(
        "xattr",
        &["-dr", "com.apple.quarantine", bundle_path.as_str()],
    )
    .await
    {
        Ok(status) if !status.success() => {
            log::debug!("xattr exited with {status}; quarantine marker left in place");
        }
        Err(e) => log::debug!("could not clear quarantine marker: {e}"),
        Ok(_) => {}
    }
}

/// Drives the full signing state machine over an assembled bundle.
pub async fn run_signing(
    engine_root: &Path,
    bundle: &BundlePaths,
    build: &ResolvedBuild,
) -> Result<SigningContext> {
    let (entitlements, tier) =
        build_entitlements(engine_root, bundle, build.allow_external_signatures).await?;

    let identity = build
        .signing_identity
        .clone()
        .unwrap_or_else(|| ADHOC_IDENTITY.to_string());
    let is_adhoc = identity == ADHOC_IDENTITY;

    validate_preconditions(is_adhoc, build)?;

    if is_adhoc {
        log::info!(
            "Using ad-hoc signature ('{ADHOC_IDENTITY}'). Suitable for local/dev, \
             not trusted distribution"
        );
    }

    let ctx = SigningContext {
        hardened_runtime: !is_adhoc,
        identity,
        tier,
        entitlements,
        is_adhoc,
    };

    sign_bundle(bundle, &ctx).await?;
    verify_signature(bundle).await?;
    gatekeeper_check(bundle, ctx.is_adhoc).await?;
    clear_quarantine(bundle).await;

    Ok(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packager::config::{AppDescriptor, PackageOverrides};

    fn resolved(build: crate::packager::config::BuildDescriptor) -> ResolvedBuild {
        let descriptor = AppDescriptor {
            build: Some(build),
            ..Default::default()
        };
        ResolvedBuild::resolve_with_env(&descriptor, &PackageOverrides::default(), |_| None)
    }

    #[test]
    fn adhoc_with_required_identity_is_a_hard_stop() {
        let build = resolved(crate::packager::config::BuildDescriptor {
            require_signing_identity: true,
            ..Default::default()
        });
        let err = validate_preconditions(true, &build).expect_err("must fail");
        assert!(matches!(err, PackagerError::SigningPrecondition { .. }));
    }

    #[test]
    fn adhoc_with_notarize_is_a_hard_stop() {
        let build = resolved(crate::packager::config::BuildDescriptor {
            notarize: true,
            notary_profile: Some("keel-notary".to_string()),
            ..Default::default()
        });
        let err = validate_preconditions(true, &build).expect_err("must fail");
        assert!(matches!(err, PackagerError::SigningPrecondition { .. }));
    }

    #[test]
    fn notarize_without_profile_is_a_hard_stop() {
        let build = resolved(crate::packager::config::BuildDescriptor {
            notarize: true,
            signing_identity: Some("Developer ID Application: Keel".to_string()),
            ..Default::default()
        });
        let err = validate_preconditions(false, &build).expect_err("must fail");
        assert!(matches!(err, PackagerError::SigningPrecondition { .. }));
    }

    #[test]
    fn real_identity_with_profile_passes() {
        let build = resolved(crate::packager::config::BuildDescriptor {
            notarize: true,
            signing_identity: Some("Developer ID Application: Keel".to_string()),
            notary_profile: Some("keel-notary".to_string()),
            ..Default::default()
        });
        validate_preconditions(false, &build).expect("valid");
    }

    #[test]
    fn entitlements_patch_lands_before_the_closing_dict() {
        let base = "<?xml version=\"1.0\"?>\n<plist>\n<dict>\n    <key>a</key>\n    <true/>\n</dict>\n</plist>\n";
        let patched = patch_entitlements(base);
        assert!(patched.contains(DISABLE_LIBRARY_VALIDATION));
        let key_pos = patched.find(DISABLE_LIBRARY_VALIDATION).expect("patched");
        let dict_pos = patched.find("</dict>").expect("closing dict");
        assert!(key_pos < dict_pos);
    }
}

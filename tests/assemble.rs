//! Bundle assembly behavior against a fake engine publish tree.

use keel_packager::packager::assemble;
use keel_packager::packager::config::{self, PackageOverrides, ResolvedBuild};
use keel_packager::packager::plugins;
use std::path::{Path, PathBuf};

/// Builds a minimal engine checkout: publish output with a MacOS binary, a
/// Resources tree containing raw runtime sources, and an Info.plist template.
fn fake_engine(root: &Path) -> PathBuf {
    let engine = root.join("engine");
    let contents = engine
        .join("Keel.App/bin/Release/net10.0-macos/osx-arm64/Keel.app/Contents");
    std::fs::create_dir_all(contents.join("MacOS")).expect("mkdir");
    std::fs::create_dir_all(contents.join("MonoBundle")).expect("mkdir");
    std::fs::create_dir_all(contents.join("Resources/runtime")).expect("mkdir");
    std::fs::create_dir_all(contents.join("_CodeSignature")).expect("mkdir");
    std::fs::write(contents.join("MacOS/Keel.App"), b"\xfe\xed\xfa\xce").expect("write");
    std::fs::write(contents.join("MonoBundle/App.dll"), b"dll").expect("write");
    std::fs::write(contents.join("Resources/runtime/host.ts"), "// raw").expect("write");
    std::fs::write(contents.join("Resources/sdk.json"), "{}").expect("write");
    std::fs::write(contents.join("Info.plist"), "<plist/>").expect("write");
    std::fs::write(contents.join("PkgInfo"), "APPL????").expect("write");
    std::fs::write(contents.join("_CodeSignature/CodeResources"), "sig").expect("write");

    std::fs::write(
        engine.join("Keel.App/Info.plist.template"),
        "<plist><dict>\
         <key>CFBundleName</key><string>{{BUNDLE_NAME}}</string>\
         <key>CFBundleIdentifier</key><string>{{BUNDLE_ID}}</string>\
         <key>CFBundleShortVersionString</key><string>{{BUNDLE_VERSION}}</string>\
         <key>CFBundleExecutable</key><string>{{BUNDLE_EXECUTABLE}}</string>\
         <key>LSApplicationCategoryType</key><string>{{BUNDLE_CATEGORY}}</string>\
         <key>LSMinimumSystemVersion</key><string>{{BUNDLE_MIN_VERSION}}</string>\
         </dict></plist>",
    )
    .expect("write template");
    engine
}

async fn assemble_app(app_root: &Path, engine: &Path, descriptor_json: &str) -> assemble::BundlePaths {
    std::fs::write(app_root.join("keel.config.json"), descriptor_json).expect("write descriptor");
    let descriptor = config::load_descriptor(app_root).await.expect("loads");
    let build = ResolvedBuild::resolve_with_env(&descriptor, &PackageOverrides::default(), |_| {
        None
    });
    let placement = plugins::resolve_placement(app_root, &descriptor.plugins, build.plugin_mode);
    assemble::assemble(app_root, engine, &descriptor, &build, &placement, false)
        .await
        .expect("assembles")
}

#[tokio::test]
async fn skeleton_and_framework_are_laid_out() {
    let dir = tempfile::tempdir().expect("tempdir");
    let engine = fake_engine(dir.path());
    let app = dir.path().join("app");
    std::fs::create_dir_all(&app).expect("mkdir");

    let bundle = assemble_app(&app, &engine, r#"{"name": "Docs Viewer"}"#).await;

    assert!(bundle.root.ends_with("dist/DocsViewer.app"));
    assert!(bundle.macos.is_dir());
    assert!(bundle.resources.is_dir());
    // Framework binary and assemblies are copied.
    assert!(bundle.contents.join("MacOS/Keel.App").is_file());
    assert!(bundle.contents.join("MonoBundle/App.dll").is_file());
    // Signature artifacts and regenerated metadata are not.
    assert!(!bundle.contents.join("_CodeSignature").exists());
    assert!(!bundle.contents.join("PkgInfo").exists());
    // Raw runtime sources are superseded by the compiled runtime.
    assert!(!bundle.contents.join("Resources/runtime").exists());
    assert!(bundle.contents.join("Resources/sdk.json").is_file());
}

#[tokio::test]
async fn info_plist_is_rendered_from_the_template() {
    let dir = tempfile::tempdir().expect("tempdir");
    let engine = fake_engine(dir.path());
    let app = dir.path().join("app");
    std::fs::create_dir_all(&app).expect("mkdir");

    let bundle = assemble_app(
        &app,
        &engine,
        r#"{
            "name": "Docs Viewer",
            "id": "com.example.docs",
            "version": "2.1.0",
            "build": {"minimumSystemVersion": "16.0", "category": "public.app-category.productivity"}
        }"#,
    )
    .await;

    let plist = std::fs::read_to_string(bundle.contents.join("Info.plist")).expect("read");
    assert!(plist.contains("<string>Docs Viewer</string>"));
    assert!(plist.contains("<string>com.example.docs</string>"));
    assert!(plist.contains("<string>2.1.0</string>"));
    assert!(plist.contains("<string>Keel.App</string>"));
    assert!(plist.contains("<string>public.app-category.productivity</string>"));
    assert!(plist.contains("<string>16.0</string>"));
}

#[tokio::test]
async fn bundled_plugins_are_copied_byte_identical() {
    let dir = tempfile::tempdir().expect("tempdir");
    let engine = fake_engine(dir.path());
    let app = dir.path().join("app");
    std::fs::create_dir_all(app.join("dylib/sub")).expect("mkdir");
    std::fs::write(app.join("dylib/libplugin.dylib"), b"\x01\x02\x03").expect("write");
    std::fs::write(app.join("dylib/sub/extra.dylib"), b"\x04\x05").expect("write");

    let bundle = assemble_app(
        &app,
        &engine,
        r#"{"name": "Demo", "build": {"pluginMode": "bundled"}}"#,
    )
    .await;

    let copied = bundle.resources.join("dylib");
    assert_eq!(
        std::fs::read(copied.join("libplugin.dylib")).expect("read"),
        b"\x01\x02\x03"
    );
    assert_eq!(
        std::fs::read(copied.join("sub/extra.dylib")).expect("read"),
        b"\x04\x05"
    );
}

#[tokio::test]
async fn side_by_side_leaves_plugins_on_disk_and_out_of_the_bundle() {
    let dir = tempfile::tempdir().expect("tempdir");
    let engine = fake_engine(dir.path());
    let app = dir.path().join("app");
    std::fs::create_dir_all(app.join("dylib")).expect("mkdir");
    std::fs::write(app.join("dylib/libplugin.dylib"), b"\x01").expect("write");

    let bundle = assemble_app(
        &app,
        &engine,
        r#"{"name": "Demo", "build": {"pluginMode": "side-by-side"}}"#,
    )
    .await;

    assert!(!bundle.resources.join("dylib").exists());
    assert!(app.join("dylib/libplugin.dylib").is_file());
}

#[tokio::test]
async fn icons_scripts_and_extra_resources_are_shipped() {
    let dir = tempfile::tempdir().expect("tempdir");
    let engine = fake_engine(dir.path());
    let app = dir.path().join("app");
    std::fs::create_dir_all(app.join("icons")).expect("mkdir");
    std::fs::write(app.join("icons/AppIcon.icns"), b"icns").expect("write");
    std::fs::write(app.join("icons/tray.png"), b"png").expect("write");
    std::fs::create_dir_all(app.join("scripts")).expect("mkdir");
    std::fs::write(app.join("scripts/postinstall.sh"), "#!/bin/sh\n").expect("write");
    std::fs::create_dir_all(app.join("data")).expect("mkdir");
    std::fs::write(app.join("data/seed.db"), b"db").expect("write");
    std::fs::write(app.join("LICENSE.txt"), "license").expect("write");

    let bundle = assemble_app(
        &app,
        &engine,
        r#"{"name": "Demo", "build": {"extraResources": ["data", "LICENSE.txt"]}}"#,
    )
    .await;

    assert!(bundle.resources.join("AppIcon.icns").is_file());
    assert!(bundle.resources.join("icons/tray.png").is_file());
    assert!(bundle.resources.join("icons/AppIcon.icns").is_file());
    assert!(bundle.resources.join("scripts/postinstall.sh").is_file());
    assert!(bundle.resources.join("data/seed.db").is_file());
    assert!(bundle.resources.join("LICENSE.txt").is_file());
}

#[tokio::test]
async fn declared_but_missing_assembly_degrades_to_a_warning() {
    let dir = tempfile::tempdir().expect("tempdir");
    let engine = fake_engine(dir.path());
    let app = dir.path().join("app");
    std::fs::create_dir_all(&app).expect("mkdir");

    // Assembly declared but not present: assembly must still succeed.
    let bundle = assemble_app(
        &app,
        &engine,
        r#"{"name": "Demo", "appAssembly": "App.dll"}"#,
    )
    .await;
    assert!(bundle.root.is_dir());
}

#[tokio::test]
async fn reassembly_replaces_the_previous_bundle() {
    let dir = tempfile::tempdir().expect("tempdir");
    let engine = fake_engine(dir.path());
    let app = dir.path().join("app");
    std::fs::create_dir_all(&app).expect("mkdir");

    let first = assemble_app(&app, &engine, r#"{"name": "Demo"}"#).await;
    // Plant a stray file; the next run must not preserve it.
    std::fs::write(first.resources.join("stale.txt"), "stale").expect("write");

    let second = assemble_app(&app, &engine, r#"{"name": "Demo"}"#).await;
    assert_eq!(first.root, second.root);
    assert!(!second.resources.join("stale.txt").exists());

    let plist_a = std::fs::read(first.contents.join("Info.plist")).expect("read");
    let plist_b = std::fs::read(second.contents.join("Info.plist")).expect("read");
    assert_eq!(plist_a, plist_b);
}

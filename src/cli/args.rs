//! Command line argument parsing and validation.

use crate::packager::config::{PackageOverrides, PluginMode};
use clap::Parser;
use std::path::PathBuf;

/// Distributable .app bundle packager for Keel Desktop apps
#[derive(Parser, Debug)]
#[command(
    name = "keel-package",
    version,
    about = "Package a Keel app into a distributable .app bundle",
    long_about = "Assembles a signed macOS .app bundle from an app source tree.

Usage:
  keel-package /path/to/app                 Package with config defaults
  keel-package /path/to/app --mode bundled  Self-contained bundle
  keel-package /path/to/app --dmg           Also create a DMG
  keel-package /path/to/app --engine /path  Explicit engine location

Exit code 0 = signed bundle exists in the app's output directory."
)]
pub struct Args {
    /// Path to the app directory (contains keel.config.json)
    #[arg(value_name = "APP_ROOT")]
    pub app_root: PathBuf,

    /// Explicit path to Keel Desktop (skips the engine probe order)
    #[arg(long, value_name = "PATH")]
    pub engine: Option<PathBuf>,

    /// Use the engine's Debug publish output
    #[arg(long)]
    pub debug: bool,

    /// Override build.pluginMode
    #[arg(long, value_enum, value_name = "MODE")]
    pub mode: Option<PluginMode>,

    /// Create a DMG (overrides build.dmg)
    #[arg(long)]
    pub dmg: bool,

    /// Allow externally-signed plugins
    #[arg(long = "allow-external")]
    pub allow_external: bool,
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Overrides layer derived from the flags. Boolean flags only override
    /// the descriptor when actually passed.
    pub fn overrides(&self) -> PackageOverrides {
        PackageOverrides {
            engine: self.engine.clone(),
            debug: self.debug,
            mode: self.mode,
            dmg: self.dmg.then_some(true),
            allow_external: self.allow_external.then_some(true),
        }
    }
}

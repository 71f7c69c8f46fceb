//! Keel Desktop app packager.
//!
//! Turns an app source tree (keel.config.json descriptor, pre-built framework
//! runtime, optional managed assembly, optional native plugin dylibs, Bun
//! UI/service sources) into a signed, verified macOS `.app` bundle and
//! optionally a notarized `.dmg`.
//!
//! It can be used both as a CLI tool (`keel-package`) and as a library
//! dependency.

pub mod cli;
pub mod error;
pub mod packager;

// Re-export commonly used types
pub use error::{PackagerError, Result};
pub use packager::{PackageOverrides, PackagedApp, Packager};

//! Error types for packaging operations.
//!
//! Every fatal condition the pipeline can hit has a dedicated variant with
//! an actionable message; degradable conditions are logged at the call site
//! and never surface here.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for packager operations
pub type Result<T> = std::result::Result<T, PackagerError>;

/// Main error type for all packager operations
#[derive(Error, Debug)]
pub enum PackagerError {
    /// No app descriptor found in the app root
    #[error(
        "no keel.config.json or keel.json found in {}\n\
         Every packaged app needs a descriptor. Create keel.config.json in the app root.",
        app_root.display()
    )]
    ConfigMissing {
        /// App root that was searched
        app_root: PathBuf,
    },

    /// App descriptor exists but could not be parsed
    #[error("failed to parse {}: {source}", path.display())]
    ConfigInvalid {
        /// Descriptor file that failed to parse
        path: PathBuf,
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// An explicit --engine path was given but does not exist
    #[error("explicit engine path not found: {}", path.display())]
    ExplicitEnginePathNotFound {
        /// The path that was passed
        path: PathBuf,
    },

    /// No engine candidate had a built framework runtime
    #[error(
        "Keel Desktop not found.\n\
         Build the framework first (run the engine build in the keel checkout),\n\
         or specify the engine explicitly: --engine /path/to/engine"
    )]
    EngineNotFound,

    /// A signing precondition was violated before codesign ran
    #[error("signing precondition violated: {reason}")]
    SigningPrecondition {
        /// Human-readable description of the violated precondition
        reason: String,
    },

    /// An external tool exited non-zero
    #[error("{command} failed with exit code {code:?}{detail}")]
    Subprocess {
        /// The command that failed (program name plus a short hint)
        command: String,
        /// Exit code if the process terminated normally
        code: Option<i32>,
        /// Captured stderr, prefixed for display, or empty
        detail: String,
    },

    /// codesign --verify rejected the freshly signed bundle
    #[error(
        "signature verification failed for {}: the signature is corrupt or incomplete",
        bundle.display()
    )]
    SignatureInvalid {
        /// Bundle that failed verification
        bundle: PathBuf,
    },

    /// Gatekeeper rejected a bundle signed with a real identity
    #[error("Gatekeeper assessment failed for {} (spctl exit code {code:?})", bundle.display())]
    GatekeeperRejected {
        /// Bundle that was rejected
        bundle: PathBuf,
        /// spctl exit code, propagated to the process exit code
        code: Option<i32>,
    },

    /// A required external tool is not installed
    #[error("required tool not found on PATH: {tool}\n{hint}")]
    ToolMissing {
        /// Tool binary name
        tool: String,
        /// Installation hint
        hint: String,
    },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Template rendering errors
    #[error("template error: {0}")]
    Template(#[from] handlebars::RenderError),

    /// Generic errors from anyhow
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),
}

impl PackagerError {
    /// Exit code this error should terminate the process with.
    ///
    /// Subprocess and Gatekeeper failures propagate the failing tool's code
    /// where one is available; everything else exits 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            PackagerError::Subprocess { code, .. } => code.unwrap_or(1),
            PackagerError::GatekeeperRejected { code, .. } => code.unwrap_or(1),
            _ => 1,
        }
    }
}

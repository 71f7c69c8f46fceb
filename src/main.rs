//! Keel Package - distributable .app bundle packager for Keel Desktop apps.
//!
//! Assembles, signs and optionally notarizes a macOS application bundle from
//! an app source tree, with proper error propagation to the process exit code.

mod cli;
mod error;
mod packager;

use std::process;

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::init();

    // Run CLI and get exit code
    let exit_code = match cli::run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    };

    process::exit(exit_code);
}

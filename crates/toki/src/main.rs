//! # Toki CLI
//!
//! The binary is intentionally thin: the CLI lives in `src/cli/`, while this file
//! only invokes `cli::run()` and handles process termination.
//!
//! ## Layering
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  CLI Layer (crates/toki/src/cli/)                           │
//! │  - clap argument parsing (setup.rs)                         │
//! │  - Config, logging and dispatch (commands.rs)               │
//! │  - Terminal rendering with console styles (render.rs)       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Library (crates/tokistore/)                                │
//! │  - TripStore, bundles, archives, geohash                    │
//! │  - No knowledge of stdout/stderr or process exits           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything in `tokistore` is UI agnostic. The CLI layer is responsible for
//! **all** user-facing concerns: argument parsing, configuration, log output,
//! error reporting, and rendering.
//!
//! ## Testing Approach
//!
//! - **Rendering**: unit tests in `render.rs` feed canned records and compare text.
//! - **Argument parsing**: unit tests in `setup.rs` parse argument vectors.
//! - **End to end**: `tests/cli_e2e.rs` drives the built binary against a temp
//!   data directory.

mod cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

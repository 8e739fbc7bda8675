//! # CLI Behavior
//!
//! This is **one possible UI client** for the trip journal, not the journal itself.
//! The CLI is the only place that knows about terminal I/O, exit codes, and output
//! formatting.
//!
//! ## The Active Trip
//!
//! Card commands work on the active trip unless `--trip` names another one. The
//! first trip ever created becomes active; `toki trip use <trip>` switches.
//!
//! ## Trip Selectors
//!
//! Wherever a command takes a trip it accepts either the trip id or its exact name.
//!
//! ## Output Streams
//!
//! Results go to stdout. Errors and logs go to stderr; a failed command exits
//! with status 1.
//!
//! ## Module Structure
//!
//! - `setup`: Argument parsing via clap, help text
//! - `commands`: Per-command handlers that call the store and print output
//! - `render`: Output formatting (lists, details, colors)

mod commands;
mod render;
pub mod setup;

pub use commands::run;

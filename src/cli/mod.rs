// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Command-line interface.
//!
//! Argument parsing, the `extract`, `encode` and `convert` commands, and the
//! console logging macros shared with the library.

// Modules
/// CLI arguments.
pub mod args;

/// Command implementations.
pub mod commands;

/// Console logging.
pub mod logging;

//! Command-line front end.
//!
//! - [`args`]: clap definitions and global flags.
//! - [`commands`]: one async handler per subcommand.
//! - [`output`]: coloured text rendering.

pub mod args;
pub mod commands;
pub mod output;

pub use args::{Cli, Commands, LogFormat, Verbosity};

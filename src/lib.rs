//! Client core for a remote program emulator.
//!
//! The crate lets a user configure, launch and observe executions of programs
//! hosted by an emulator service, re-run historical executions, step through
//! debug sessions and keep a local view of their credit balance.
//!
//! Sub-systems:
//! - [`runtime`]: variable sets, cost model, run configurations and the
//!   execution orchestrator.
//! - [`debugger`]: the debug session state machine and breakpoints.
//! - [`dashboard`]: credit ledger, dependency highlighting, refresh loop.
//! - [`service`]: the remote service boundary and its implementations.
//! - [`protocol`]: wire envelope and transfer objects.
//! - [`config`]: TOML configuration with flag and environment overrides.
//! - [`cli`]: the `emulator-client` command-line front end.

pub mod cli;
pub mod config;
pub mod dashboard;
pub mod debugger;
pub mod error;
pub mod protocol;
pub mod runtime;
pub mod service;

pub use error::{ClientError, ErrorKind};

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, ClientError>;

//! Execution configuration and orchestration.
//!
//! Sub-modules:
//! - [`variables`]: Sparse named inputs and their positional form.
//! - [`cost`]: Architecture tiers and surcharges.
//! - [`run_config`]: Run configurations and program targets.
//! - [`executor`]: Public façade; sequences the remote calls of one run.
//! - [`result`]: Outcome interpretation and execution reports.

pub mod cost;
pub mod executor;
pub mod result;
pub mod run_config;
pub mod variables;

pub use cost::{Architecture, CostModel};
pub use executor::ExecutionOrchestrator;
pub use result::{Advisory, ExecutionReport};
pub use run_config::{EntityKind, ProgramTarget, RunConfiguration};
pub use variables::{PositionalInput, VariableSet};

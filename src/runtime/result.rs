//! Interpretation of execution outcomes.
//!
//! A halt other than `FINISHED` is not an error: the outcome is still valid
//! and displayed, it only carries an advisory for the user.

use crate::protocol::{ExecutionOutcome, HaltReason};
use crate::runtime::cost::Architecture;
use crate::runtime::run_config::ProgramTarget;
use crate::ClientError;
use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

/// Non-fatal notice attached to an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Advisory {
    InsufficientCredits,
    StoppedManually,
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Advisory::InsufficientCredits => write!(
                f,
                "Program execution halted due to insufficient credits and did not execute completely"
            ),
            Advisory::StoppedManually => write!(f, "Program execution was stopped manually"),
        }
    }
}

/// HTTP status the server answers with when a run is refused for lack of
/// credits.
pub const PAYMENT_REQUIRED: i32 = 402;

impl Advisory {
    /// Advisory carried by a rejected request, if any. The server refuses an
    /// execution that runs out of credits with status 402 instead of an
    /// outcome.
    pub fn from_rejection(err: &ClientError) -> Option<Advisory> {
        match err.remote_details() {
            Some((_, PAYMENT_REQUIRED)) => Some(Advisory::InsufficientCredits),
            _ => None,
        }
    }
}

/// Map a halt reason to its advisory, logging the classification.
pub fn classify_halt(outcome: &ExecutionOutcome) -> Option<Advisory> {
    match outcome.halt_reason {
        HaltReason::Finished => {
            info!(cycles = outcome.cycles, result = outcome.result, "Execution finished");
            None
        }
        HaltReason::StoppedManually => {
            warn!(cycles = outcome.cycles, "Execution stopped manually");
            Some(Advisory::StoppedManually)
        }
        HaltReason::InsufficientCredits => {
            warn!(cycles = outcome.cycles, "Execution halted: insufficient credits");
            Some(Advisory::InsufficientCredits)
        }
    }
}

/// Everything the caller needs to present one completed execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionReport {
    pub target: ProgramTarget,
    pub expansion_level: u32,
    pub architecture: Architecture,
    pub input: Vec<i64>,
    pub outcome: ExecutionOutcome,
    pub advisory: Option<Advisory>,
    /// Credits charged optimistically for this run.
    pub charged: u64,
}

impl ExecutionReport {
    pub fn is_complete(&self) -> bool {
        self.advisory.is_none()
    }
}

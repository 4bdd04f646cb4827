//! Boundary to the remote emulator service.
//!
//! Everything the client core needs from the server goes through
//! [`EmulatorService`], so orchestration and debugging can be exercised
//! against [`ScriptedService`] without a live server.
//!
//! - [`http`]: `reqwest` implementation speaking the JSON envelope.
//! - [`scripted`]: in-memory implementation with queued replies and a call log.

pub mod http;
pub mod scripted;

pub use http::HttpService;
pub use scripted::{ScriptedService, ServiceCall};

use crate::protocol::{
    ExecutionOutcome, HistoricalRun, ProgramCommands, ProgramInfo, ProgramSummary, UserInfo,
};
use crate::runtime::cost::Architecture;
use crate::Result;
use async_trait::async_trait;

/// Remote operations consumed by the client.
///
/// The server keeps one active program per user; it is selected with
/// [`bind_active_program`](EmulatorService::bind_active_program) and every
/// later program or debug call applies to it.
#[async_trait]
pub trait EmulatorService: Send + Sync {
    async fn bind_active_program(&self, name: &str) -> Result<()>;

    async fn check_runnable(&self, expansion_level: u32, architecture: Architecture) -> Result<()>;

    async fn execute(
        &self,
        expansion_level: u32,
        architecture: Architecture,
        input: &[i64],
    ) -> Result<ExecutionOutcome>;

    async fn debug_start(
        &self,
        expansion_level: u32,
        architecture: Architecture,
        input: &[i64],
        breakpoints: &[u32],
    ) -> Result<ExecutionOutcome>;

    async fn debug_step(&self) -> Result<ExecutionOutcome>;

    /// Undo the last instruction; `sessionCycles` of the reply is the
    /// (negative) refund.
    async fn debug_step_back(&self) -> Result<ExecutionOutcome>;

    async fn debug_continue(&self) -> Result<ExecutionOutcome>;

    /// Ends the session and returns its total cost.
    async fn debug_stop(&self) -> Result<i64>;

    async fn debug_add_breakpoint(&self, index: u32) -> Result<()>;

    async fn debug_remove_breakpoint(&self, index: u32) -> Result<()>;

    /// Expanded instructions of the active program at `expansion_level`.
    async fn program_commands(&self, expansion_level: u32) -> Result<ProgramCommands>;

    async fn program_summary(&self, expansion_level: u32) -> Result<ProgramSummary>;

    /// Chain of instructions the one at `index` was expanded from.
    async fn command_history(&self, expansion_level: u32, index: u32) -> Result<Vec<String>>;

    /// Upload a program definition file. Returns the server's
    /// acknowledgement text.
    async fn upload_program(&self, file_name: &str, contents: Vec<u8>) -> Result<String>;

    async fn dependency_chain(&self, name: &str) -> Result<Vec<String>>;

    /// Programs that call the named helper function.
    async fn programs_using(&self, function: &str) -> Result<Vec<String>>;

    async fn list_users(&self) -> Result<Vec<UserInfo>>;

    async fn list_programs(&self) -> Result<Vec<ProgramInfo>>;

    async fn list_functions(&self) -> Result<Vec<ProgramInfo>>;

    async fn user_statistics(&self, user: &str) -> Result<Vec<HistoricalRun>>;

    async fn user_credits(&self) -> Result<i64>;

    async fn add_credits(&self, amount: i64) -> Result<()>;

    /// Highest expansion level of the active program.
    async fn max_expansion_level(&self) -> Result<u32>;

    /// Input names the active program declares.
    async fn input_variables(&self) -> Result<Vec<String>>;
}

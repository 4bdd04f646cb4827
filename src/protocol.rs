//! Wire types exchanged with the emulator service.
//!
//! Every response is wrapped in an [`Envelope`]; the payload types mirror the
//! server's JSON field names (camelCase).

use crate::runtime::cost::Architecture;
use crate::{ClientError, Result};
use serde::{Deserialize, Serialize};

/// Uniform response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub code: i32,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    /// Surface `success = false` as [`ClientError::Remote`], otherwise hand back
    /// the (possibly absent) payload.
    pub fn into_result(self) -> Result<Option<T>> {
        if self.success {
            Ok(self.data)
        } else {
            Err(ClientError::Remote {
                message: self.message,
                code: self.code,
            })
        }
    }

    /// Like [`into_result`](Self::into_result) but a missing payload is a
    /// decode error.
    pub fn into_data(self) -> Result<T> {
        let message = self.message.clone();
        self.into_result()?.ok_or_else(|| {
            ClientError::Decode(format!("response carried no data (message: '{}')", message))
        })
    }
}

/// One named variable value, as recorded by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableBinding {
    #[serde(rename = "variable")]
    pub name: String,
    pub value: i64,
}

impl VariableBinding {
    pub fn new(name: impl Into<String>, value: i64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Terminal classification of one execution attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HaltReason {
    #[default]
    Finished,
    StoppedManually,
    InsufficientCredits,
}

/// Result of an execution, a debug start or a debug step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionOutcome {
    #[serde(default)]
    pub cycles: u64,
    /// Cost of this request alone; negative when stepping back refunds cycles.
    #[serde(default)]
    pub session_cycles: i64,
    #[serde(default)]
    pub result: i64,
    #[serde(rename = "variableToValue", default)]
    pub bindings: Vec<VariableBinding>,
    #[serde(default)]
    pub debug_index: i64,
    #[serde(default)]
    pub is_debug: bool,
    #[serde(default)]
    pub halt_reason: HaltReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub name: String,
    #[serde(default)]
    pub program_uploaded_count: u32,
    #[serde(default)]
    pub function_uploaded_count: u32,
    #[serde(default)]
    pub credits: i64,
    #[serde(default)]
    pub credits_used: i64,
    #[serde(default)]
    pub run_count: u32,
}

/// Catalogue entry for an uploaded program or helper function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramInfo {
    pub name: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub commands_count: u32,
    #[serde(default)]
    pub max_level: u32,
    #[serde(default)]
    pub ran_count: u32,
    #[serde(default)]
    pub average_cost: f64,
    #[serde(default)]
    pub source_program: Option<String>,
    #[serde(default)]
    pub function: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunType {
    #[default]
    Program,
    HelperFunction,
}

/// Immutable record of a past execution (a "statistic").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalRun {
    pub index: u32,
    #[serde(default)]
    pub program_name: String,
    #[serde(default)]
    pub run_type: RunType,
    pub expansion_level: u32,
    pub architecture: String,
    #[serde(default)]
    pub input: Vec<i64>,
    #[serde(default)]
    pub result: i64,
    #[serde(default)]
    pub cycles_count: u64,
    #[serde(rename = "variableToValue", default)]
    pub recorded_input: Vec<VariableBinding>,
}

/// Expanded instruction listing of the active program at one level, in
/// execution order. Debug indices point into it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgramCommands {
    pub commands: Vec<String>,
}

impl ProgramCommands {
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Instruction at a zero-based debug index, if it is in range.
    pub fn at(&self, index: i64) -> Option<&str> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.commands.get(i))
            .map(String::as_str)
    }
}

/// Instruction counts per architecture tier, indexed I..IV.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramSummary {
    #[serde(default)]
    pub architecture_commands_count: Vec<u32>,
}

impl ProgramSummary {
    pub fn count(&self, architecture: Architecture) -> u32 {
        let slot = Architecture::ALL
            .iter()
            .position(|a| *a == architecture)
            .unwrap_or(0);
        self.architecture_commands_count
            .get(slot)
            .copied()
            .unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.architecture_commands_count.iter().sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    pub expansion_level: u32,
    pub architecture: Architecture,
    pub input: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugStartRequest {
    pub expansion_level: u32,
    pub architecture: Architecture,
    pub input: Vec<i64>,
    pub breakpoints: Vec<u32>,
}

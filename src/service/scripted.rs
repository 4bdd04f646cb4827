//! In-memory [`EmulatorService`] with scripted replies.
//!
//! Replies are queued up front (or between calls) and every call is recorded
//! in order, so tests can assert exactly which remote operations a component
//! issued and with which arguments.

use super::EmulatorService;
use crate::protocol::{
    ExecutionOutcome, HistoricalRun, ProgramCommands, ProgramInfo, ProgramSummary, UserInfo,
};
use crate::runtime::cost::Architecture;
use crate::{ClientError, Result};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Remote operation identifiers, used to inject failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Bind,
    CheckRunnable,
    Execute,
    DebugStart,
    DebugStep,
    DebugStepBack,
    DebugContinue,
    DebugStop,
    AddBreakpoint,
    RemoveBreakpoint,
    ProgramCommands,
    ProgramSummary,
    CommandHistory,
    Upload,
    DependencyChain,
    ProgramsUsing,
    ListUsers,
    ListPrograms,
    ListFunctions,
    UserStatistics,
    UserCredits,
    AddCredits,
    MaxLevel,
    InputVariables,
}

/// One recorded call with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceCall {
    Bind(String),
    CheckRunnable {
        expansion_level: u32,
        architecture: Architecture,
    },
    Execute {
        expansion_level: u32,
        architecture: Architecture,
        input: Vec<i64>,
    },
    DebugStart {
        expansion_level: u32,
        architecture: Architecture,
        input: Vec<i64>,
        breakpoints: Vec<u32>,
    },
    DebugStep,
    DebugStepBack,
    DebugContinue,
    DebugStop,
    AddBreakpoint(u32),
    RemoveBreakpoint(u32),
    ProgramCommands(u32),
    ProgramSummary(u32),
    CommandHistory {
        expansion_level: u32,
        index: u32,
    },
    Upload(String),
    DependencyChain(String),
    ProgramsUsing(String),
    ListUsers,
    ListPrograms,
    ListFunctions,
    UserStatistics(String),
    UserCredits,
    AddCredits(i64),
    MaxLevel,
    InputVariables,
}

impl ServiceCall {
    pub fn op(&self) -> Op {
        match self {
            ServiceCall::Bind(_) => Op::Bind,
            ServiceCall::CheckRunnable { .. } => Op::CheckRunnable,
            ServiceCall::Execute { .. } => Op::Execute,
            ServiceCall::DebugStart { .. } => Op::DebugStart,
            ServiceCall::DebugStep => Op::DebugStep,
            ServiceCall::DebugStepBack => Op::DebugStepBack,
            ServiceCall::DebugContinue => Op::DebugContinue,
            ServiceCall::DebugStop => Op::DebugStop,
            ServiceCall::AddBreakpoint(_) => Op::AddBreakpoint,
            ServiceCall::RemoveBreakpoint(_) => Op::RemoveBreakpoint,
            ServiceCall::ProgramCommands(_) => Op::ProgramCommands,
            ServiceCall::ProgramSummary(_) => Op::ProgramSummary,
            ServiceCall::CommandHistory { .. } => Op::CommandHistory,
            ServiceCall::Upload(_) => Op::Upload,
            ServiceCall::DependencyChain(_) => Op::DependencyChain,
            ServiceCall::ProgramsUsing(_) => Op::ProgramsUsing,
            ServiceCall::ListUsers => Op::ListUsers,
            ServiceCall::ListPrograms => Op::ListPrograms,
            ServiceCall::ListFunctions => Op::ListFunctions,
            ServiceCall::UserStatistics(_) => Op::UserStatistics,
            ServiceCall::UserCredits => Op::UserCredits,
            ServiceCall::AddCredits(_) => Op::AddCredits,
            ServiceCall::MaxLevel => Op::MaxLevel,
            ServiceCall::InputVariables => Op::InputVariables,
        }
    }
}

#[derive(Default)]
struct State {
    known: BTreeSet<String>,
    active: Option<String>,
    runnability: Option<(String, i32)>,
    executions: VecDeque<ExecutionOutcome>,
    debug_replies: VecDeque<ExecutionOutcome>,
    stop_cost: i64,
    failures: HashMap<Op, VecDeque<(String, i32)>>,
    dependencies: HashMap<String, Vec<String>>,
    used_by: HashMap<String, Vec<String>>,
    users: Vec<UserInfo>,
    programs: Vec<ProgramInfo>,
    functions: Vec<ProgramInfo>,
    statistics: HashMap<String, Vec<HistoricalRun>>,
    credits: i64,
    max_level: u32,
    inputs: Vec<String>,
    commands: HashMap<u32, Vec<String>>,
    summaries: HashMap<u32, Vec<u32>>,
    lineage: HashMap<u32, Vec<String>>,
    calls: Vec<ServiceCall>,
}

/// Scripted stand-in for the emulator server.
#[derive(Default)]
pub struct ScriptedService {
    state: Mutex<State>,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a program or function name that may be bound.
    pub fn with_program(self, name: impl Into<String>) -> Self {
        self.lock().known.insert(name.into());
        self
    }

    pub fn with_credits(self, credits: i64) -> Self {
        self.lock().credits = credits;
        self
    }

    pub fn with_max_level(self, level: u32) -> Self {
        self.lock().max_level = level;
        self
    }

    pub fn with_inputs<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lock().inputs = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_dependencies<I, S>(self, name: impl Into<String>, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lock()
            .dependencies
            .insert(name.into(), deps.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_used_by<I, S>(self, function: impl Into<String>, programs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lock()
            .used_by
            .insert(function.into(), programs.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_users(self, users: Vec<UserInfo>) -> Self {
        self.lock().users = users;
        self
    }

    pub fn with_catalogue(self, programs: Vec<ProgramInfo>, functions: Vec<ProgramInfo>) -> Self {
        {
            let mut state = self.lock();
            for info in programs.iter().chain(functions.iter()) {
                state.known.insert(info.name.clone());
            }
            state.programs = programs;
            state.functions = functions;
        }
        self
    }

    pub fn with_statistics(self, user: impl Into<String>, runs: Vec<HistoricalRun>) -> Self {
        self.lock().statistics.insert(user.into(), runs);
        self
    }

    /// Instruction listing of the active program at `level`.
    pub fn with_commands<I, S>(self, level: u32, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lock()
            .commands
            .insert(level, commands.into_iter().map(Into::into).collect());
        self
    }

    /// Per-tier instruction counts (I..IV) at `level`.
    pub fn with_summary(self, level: u32, counts: [u32; 4]) -> Self {
        self.lock().summaries.insert(level, counts.to_vec());
        self
    }

    /// Ancestry lines of the instruction at `index`.
    pub fn with_lineage<I, S>(self, index: u32, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lock()
            .lineage
            .insert(index, lines.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_stop_cost(self, cost: i64) -> Self {
        self.lock().stop_cost = cost;
        self
    }

    /// Make every runnability check fail with `reason`.
    pub fn reject_runnability(&self, reason: impl Into<String>, code: i32) {
        self.lock().runnability = Some((reason.into(), code));
    }

    pub fn push_execution(&self, outcome: ExecutionOutcome) {
        self.lock().executions.push_back(outcome);
    }

    /// Queue a reply for the next debug start, step, step back or continue.
    pub fn push_debug(&self, outcome: ExecutionOutcome) {
        self.lock().debug_replies.push_back(outcome);
    }

    pub fn set_credits(&self, credits: i64) {
        self.lock().credits = credits;
    }

    /// Make the next call of `op` fail with a remote rejection.
    pub fn fail_next(&self, op: Op, message: impl Into<String>, code: i32) {
        self.lock()
            .failures
            .entry(op)
            .or_default()
            .push_back((message.into(), code));
    }

    pub fn active_program(&self) -> Option<String> {
        self.lock().active.clone()
    }

    pub fn calls(&self) -> Vec<ServiceCall> {
        self.lock().calls.clone()
    }

    pub fn count(&self, op: Op) -> usize {
        self.lock().calls.iter().filter(|c| c.op() == op).count()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Record `call` and return the guarded state, or the injected failure.
    fn enter(&self, call: ServiceCall) -> Result<MutexGuard<'_, State>> {
        let mut state = self.lock();
        let op = call.op();
        state.calls.push(call);
        if let Some((message, code)) = state.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            return Err(ClientError::Remote { message, code });
        }
        Ok(state)
    }
}

fn remote(message: &str, code: i32) -> ClientError {
    ClientError::Remote {
        message: message.to_string(),
        code,
    }
}

#[async_trait]
impl EmulatorService for ScriptedService {
    async fn bind_active_program(&self, name: &str) -> Result<()> {
        let mut state = self.enter(ServiceCall::Bind(name.to_string()))?;
        if !state.known.contains(name) {
            return Err(remote(&format!("Program '{}' not found", name), 404));
        }
        state.active = Some(name.to_string());
        Ok(())
    }

    async fn check_runnable(&self, expansion_level: u32, architecture: Architecture) -> Result<()> {
        let state = self.enter(ServiceCall::CheckRunnable {
            expansion_level,
            architecture,
        })?;
        if state.active.is_none() {
            return Err(remote("No program is currently loaded", 400));
        }
        match &state.runnability {
            Some((reason, code)) => Err(remote(reason, *code)),
            None => Ok(()),
        }
    }

    async fn execute(
        &self,
        expansion_level: u32,
        architecture: Architecture,
        input: &[i64],
    ) -> Result<ExecutionOutcome> {
        let mut state = self.enter(ServiceCall::Execute {
            expansion_level,
            architecture,
            input: input.to_vec(),
        })?;
        Ok(state.executions.pop_front().unwrap_or_default())
    }

    async fn debug_start(
        &self,
        expansion_level: u32,
        architecture: Architecture,
        input: &[i64],
        breakpoints: &[u32],
    ) -> Result<ExecutionOutcome> {
        let mut state = self.enter(ServiceCall::DebugStart {
            expansion_level,
            architecture,
            input: input.to_vec(),
            breakpoints: breakpoints.to_vec(),
        })?;
        Ok(state.debug_replies.pop_front().unwrap_or(ExecutionOutcome {
            is_debug: true,
            ..ExecutionOutcome::default()
        }))
    }

    async fn debug_step(&self) -> Result<ExecutionOutcome> {
        let mut state = self.enter(ServiceCall::DebugStep)?;
        Ok(state.debug_replies.pop_front().unwrap_or(ExecutionOutcome {
            is_debug: true,
            ..ExecutionOutcome::default()
        }))
    }

    async fn debug_step_back(&self) -> Result<ExecutionOutcome> {
        let mut state = self.enter(ServiceCall::DebugStepBack)?;
        Ok(state.debug_replies.pop_front().unwrap_or(ExecutionOutcome {
            is_debug: true,
            ..ExecutionOutcome::default()
        }))
    }

    async fn debug_continue(&self) -> Result<ExecutionOutcome> {
        let mut state = self.enter(ServiceCall::DebugContinue)?;
        Ok(state.debug_replies.pop_front().unwrap_or_default())
    }

    async fn debug_stop(&self) -> Result<i64> {
        let state = self.enter(ServiceCall::DebugStop)?;
        Ok(state.stop_cost)
    }

    async fn debug_add_breakpoint(&self, index: u32) -> Result<()> {
        self.enter(ServiceCall::AddBreakpoint(index)).map(|_| ())
    }

    async fn debug_remove_breakpoint(&self, index: u32) -> Result<()> {
        self.enter(ServiceCall::RemoveBreakpoint(index)).map(|_| ())
    }

    async fn program_commands(&self, expansion_level: u32) -> Result<ProgramCommands> {
        let state = self.enter(ServiceCall::ProgramCommands(expansion_level))?;
        if state.active.is_none() {
            return Err(remote("No program is currently loaded", 400));
        }
        Ok(ProgramCommands {
            commands: state
                .commands
                .get(&expansion_level)
                .cloned()
                .unwrap_or_default(),
        })
    }

    async fn program_summary(&self, expansion_level: u32) -> Result<ProgramSummary> {
        let state = self.enter(ServiceCall::ProgramSummary(expansion_level))?;
        if state.active.is_none() {
            return Err(remote("No program is currently loaded", 400));
        }
        Ok(ProgramSummary {
            architecture_commands_count: state
                .summaries
                .get(&expansion_level)
                .cloned()
                .unwrap_or_else(|| vec![0; 4]),
        })
    }

    async fn command_history(&self, expansion_level: u32, index: u32) -> Result<Vec<String>> {
        let state = self.enter(ServiceCall::CommandHistory {
            expansion_level,
            index,
        })?;
        Ok(state.lineage.get(&index).cloned().unwrap_or_default())
    }

    async fn upload_program(&self, file_name: &str, contents: Vec<u8>) -> Result<String> {
        let mut state = self.enter(ServiceCall::Upload(file_name.to_string()))?;
        if contents.is_empty() {
            return Err(remote("Failed to load program: empty file", 400));
        }
        let name = Path::new(file_name)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_name.to_string());
        state.known.insert(name);
        Ok("Program uploaded successfully".to_string())
    }

    async fn dependency_chain(&self, name: &str) -> Result<Vec<String>> {
        let state = self.enter(ServiceCall::DependencyChain(name.to_string()))?;
        Ok(state.dependencies.get(name).cloned().unwrap_or_default())
    }

    async fn programs_using(&self, function: &str) -> Result<Vec<String>> {
        let state = self.enter(ServiceCall::ProgramsUsing(function.to_string()))?;
        Ok(state.used_by.get(function).cloned().unwrap_or_default())
    }

    async fn list_users(&self) -> Result<Vec<UserInfo>> {
        Ok(self.enter(ServiceCall::ListUsers)?.users.clone())
    }

    async fn list_programs(&self) -> Result<Vec<ProgramInfo>> {
        Ok(self.enter(ServiceCall::ListPrograms)?.programs.clone())
    }

    async fn list_functions(&self) -> Result<Vec<ProgramInfo>> {
        Ok(self.enter(ServiceCall::ListFunctions)?.functions.clone())
    }

    async fn user_statistics(&self, user: &str) -> Result<Vec<HistoricalRun>> {
        let state = self.enter(ServiceCall::UserStatistics(user.to_string()))?;
        Ok(state.statistics.get(user).cloned().unwrap_or_default())
    }

    async fn user_credits(&self) -> Result<i64> {
        Ok(self.enter(ServiceCall::UserCredits)?.credits)
    }

    async fn add_credits(&self, amount: i64) -> Result<()> {
        let mut state = self.enter(ServiceCall::AddCredits(amount))?;
        if amount <= 0 {
            return Err(remote("Credits amount must be positive", 400));
        }
        state.credits += amount;
        Ok(())
    }

    async fn max_expansion_level(&self) -> Result<u32> {
        Ok(self.enter(ServiceCall::MaxLevel)?.max_level)
    }

    async fn input_variables(&self) -> Result<Vec<String>> {
        Ok(self.enter(ServiceCall::InputVariables)?.inputs.clone())
    }
}

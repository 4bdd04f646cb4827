//! Client-side debug session state machine.
//!
//! ```text
//! Idle --start--> Started --step--> Stepping --continue--> Continuing
//!                    \________________\_____________________\--stop--> Idle
//! ```
//!
//! `step_back` undoes one instruction and lands in `Stepping`; the server
//! refunds its cycles through a negative `sessionCycles`.
//!
//! A step or continue whose outcome reports `isDebug = false` means the
//! program ended inside the session; the session moves to `Finished` and
//! only `stop` (or `abandon`) is accepted.
//!
//! Transitions take `&mut self`, so a transition cannot be issued while a
//! previous one on the same session is still awaiting its remote call.

use crate::dashboard::ledger::CreditLedger;
use crate::debugger::breakpoint::BreakpointSet;
use crate::protocol::ExecutionOutcome;
use crate::runtime::cost::Architecture;
use crate::runtime::result::{classify_halt, Advisory};
use crate::runtime::run_config::{ProgramTarget, RunConfiguration};
use crate::service::EmulatorService;
use crate::{ClientError, Result};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DebugState {
    Idle,
    Started,
    Stepping,
    Continuing,
    Finished,
}

impl DebugState {
    /// Started, stepping or continuing.
    pub fn is_live(self) -> bool {
        matches!(
            self,
            DebugState::Started | DebugState::Stepping | DebugState::Continuing
        )
    }
}

impl fmt::Display for DebugState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DebugState::Idle => "idle",
            DebugState::Started => "started",
            DebugState::Stepping => "stepping",
            DebugState::Continuing => "continuing",
            DebugState::Finished => "finished",
        };
        write!(f, "{}", s)
    }
}

/// Active-session details, present whenever the state is not `Idle`.
#[derive(Debug, Clone)]
struct ActiveSession {
    target: ProgramTarget,
    architecture: Architecture,
    last_outcome: ExecutionOutcome,
}

pub struct DebugSession {
    service: Arc<dyn EmulatorService>,
    state: DebugState,
    breakpoints: BreakpointSet,
    active: Option<ActiveSession>,
    last_total_cost: Option<i64>,
}

impl DebugSession {
    pub fn new(service: Arc<dyn EmulatorService>) -> Self {
        Self {
            service,
            state: DebugState::Idle,
            breakpoints: BreakpointSet::new(),
            active: None,
            last_total_cost: None,
        }
    }

    pub fn state(&self) -> DebugState {
        self.state
    }

    pub fn breakpoints(&self) -> &BreakpointSet {
        &self.breakpoints
    }

    pub fn target(&self) -> Option<&ProgramTarget> {
        self.active.as_ref().map(|a| &a.target)
    }

    pub fn last_outcome(&self) -> Option<&ExecutionOutcome> {
        self.active.as_ref().map(|a| &a.last_outcome)
    }

    /// Total cost reported by the most recent successful `stop`.
    pub fn last_total_cost(&self) -> Option<i64> {
        self.last_total_cost
    }

    /// Advisory for a session whose program has ended.
    pub fn advisory(&self) -> Option<Advisory> {
        match (self.state, &self.active) {
            (DebugState::Finished, Some(active)) => classify_halt(&active.last_outcome),
            _ => None,
        }
    }

    /// Bind, verify and start a debug session.
    ///
    /// Charges the start's session cycles plus the tier surcharge. Any
    /// failure leaves the session `Idle`.
    #[tracing::instrument(skip_all, fields(target = %target.name))]
    pub async fn start(
        &mut self,
        target: &ProgramTarget,
        config: &RunConfiguration,
        ledger: &mut CreditLedger,
    ) -> Result<ExecutionOutcome> {
        if self.state != DebugState::Idle {
            return Err(ClientError::SessionAlreadyActive);
        }

        self.service
            .bind_active_program(&target.name)
            .await
            .map_err(|e| e.into_binding_failure(&target.name))?;

        self.service
            .check_runnable(config.expansion_level(), config.architecture())
            .await
            .map_err(|e| e.into_not_runnable())?;

        let input = config.input().into_vec();
        let breakpoints = self.breakpoints.list();
        let outcome = self
            .service
            .debug_start(
                config.expansion_level(),
                config.architecture(),
                &input,
                &breakpoints,
            )
            .await
            .map_err(|e| e.into_debug_start_failure())?;

        ledger.apply_optimistic(-outcome.session_cycles);
        ledger.charge(config.architecture().surcharge());

        self.state = if outcome.is_debug {
            DebugState::Started
        } else {
            DebugState::Finished
        };
        info!(
            state = %self.state,
            index = outcome.debug_index,
            breakpoints = self.breakpoints.count(),
            "Debug session started"
        );
        self.active = Some(ActiveSession {
            target: target.clone(),
            architecture: config.architecture(),
            last_outcome: outcome.clone(),
        });
        if self.state == DebugState::Finished {
            classify_halt(&outcome);
        }
        Ok(outcome)
    }

    /// Execute a single instruction.
    #[tracing::instrument(skip_all)]
    pub async fn step(&mut self, ledger: &mut CreditLedger) -> Result<ExecutionOutcome> {
        self.ensure_live()?;
        let outcome = self.service.debug_step().await?;
        Ok(self.advance(outcome, DebugState::Stepping, ledger))
    }

    /// Undo the most recent instruction.
    ///
    /// Rejected before the first instruction has run. The refund reported by
    /// the server is credited back to the ledger.
    #[tracing::instrument(skip_all)]
    pub async fn step_back(&mut self, ledger: &mut CreditLedger) -> Result<ExecutionOutcome> {
        self.ensure_live()?;
        if self.last_outcome().map_or(true, |o| o.cycles == 0) {
            return Err(ClientError::NothingToStepBack);
        }
        let outcome = self.service.debug_step_back().await?;
        Ok(self.advance(outcome, DebugState::Stepping, ledger))
    }

    /// Run until the next breakpoint or the end of the program.
    #[tracing::instrument(skip_all)]
    pub async fn resume(&mut self, ledger: &mut CreditLedger) -> Result<ExecutionOutcome> {
        self.ensure_live()?;
        let outcome = self.service.debug_continue().await?;
        Ok(self.advance(outcome, DebugState::Continuing, ledger))
    }

    /// End the session and return its total cost.
    ///
    /// Stopping an idle session is a usage error. A failed stop call leaves
    /// the session as it was; [`abandon`](Self::abandon) tears it down locally.
    #[tracing::instrument(skip_all)]
    pub async fn stop(&mut self) -> Result<i64> {
        if self.state == DebugState::Idle {
            return Err(ClientError::NoActiveSession);
        }
        let cost = self.service.debug_stop().await?;
        info!(cost, "Debug session stopped");
        self.last_total_cost = Some(cost);
        self.teardown();
        Ok(cost)
    }

    /// Local teardown without a remote call, e.g. when leaving the view.
    pub fn abandon(&mut self) {
        if self.state != DebugState::Idle {
            warn!(state = %self.state, "Abandoning debug session");
        }
        self.teardown();
    }

    /// Set or clear the breakpoint at `index`, mirroring the change on the
    /// server while a session is live. Returns whether the breakpoint is now
    /// set. A failed remote call rolls the local change back.
    pub async fn toggle_breakpoint(&mut self, index: u32) -> Result<bool> {
        if self.breakpoints.contains(index) {
            self.remove_breakpoint(index).await?;
            Ok(false)
        } else {
            self.add_breakpoint(index).await?;
            Ok(true)
        }
    }

    pub async fn add_breakpoint(&mut self, index: u32) -> Result<()> {
        if !self.breakpoints.add(index) {
            return Ok(());
        }
        if self.state.is_live() {
            if let Err(e) = self.service.debug_add_breakpoint(index).await {
                self.breakpoints.remove(index);
                return Err(e);
            }
        }
        Ok(())
    }

    pub async fn remove_breakpoint(&mut self, index: u32) -> Result<()> {
        if !self.breakpoints.remove(index) {
            return Ok(());
        }
        if self.state.is_live() {
            if let Err(e) = self.service.debug_remove_breakpoint(index).await {
                self.breakpoints.add(index);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Drop every breakpoint. While live each removal is mirrored on the
    /// server; the first failure stops the sweep and keeps what is left.
    pub async fn clear_breakpoints(&mut self) -> Result<()> {
        if !self.state.is_live() {
            self.breakpoints.clear();
            return Ok(());
        }
        for index in self.breakpoints.list() {
            self.remove_breakpoint(index).await?;
        }
        Ok(())
    }

    fn ensure_live(&self) -> Result<()> {
        match self.state {
            DebugState::Idle => Err(ClientError::NoActiveSession),
            DebugState::Finished => Err(ClientError::SessionFinished),
            _ => Ok(()),
        }
    }

    fn advance(
        &mut self,
        outcome: ExecutionOutcome,
        next: DebugState,
        ledger: &mut CreditLedger,
    ) -> ExecutionOutcome {
        ledger.apply_optimistic(-outcome.session_cycles);
        self.state = if outcome.is_debug {
            next
        } else {
            classify_halt(&outcome);
            DebugState::Finished
        };
        if let Some(active) = self.active.as_mut() {
            active.last_outcome = outcome.clone();
            tracing::debug!(
                target_name = %active.target.name,
                architecture = %active.architecture,
                index = outcome.debug_index,
                state = %self.state,
                "Debug transition"
            );
        }
        outcome
    }

    fn teardown(&mut self) {
        self.state = DebugState::Idle;
        self.active = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::HaltReason;
    use crate::runtime::variables::VariableSet;
    use crate::service::scripted::{Op, ServiceCall};
    use crate::service::ScriptedService;

    fn setup() -> (Arc<ScriptedService>, DebugSession) {
        let service = Arc::new(
            ScriptedService::new()
                .with_program("loop")
                .with_stop_cost(42),
        );
        let session = DebugSession::new(service.clone());
        (service, session)
    }

    fn config() -> RunConfiguration {
        let mut vars = VariableSet::new();
        vars.add(None).unwrap();
        vars.set_value("x1", 4).unwrap();
        RunConfiguration::new(1, Architecture::II, vars)
    }

    fn live(index: i64, session_cycles: i64) -> ExecutionOutcome {
        ExecutionOutcome {
            is_debug: true,
            debug_index: index,
            session_cycles,
            ..ExecutionOutcome::default()
        }
    }

    #[tokio::test]
    async fn start_twice_is_rejected() {
        let (_service, mut session) = setup();
        let mut ledger = CreditLedger::with_balance(1000);
        let target = ProgramTarget::program("loop");
        session.start(&target, &config(), &mut ledger).await.unwrap();
        assert!(matches!(
            session.start(&target, &config(), &mut ledger).await,
            Err(ClientError::SessionAlreadyActive)
        ));
        assert_eq!(session.state(), DebugState::Started);
    }

    #[tokio::test]
    async fn stop_from_idle_is_usage_error() {
        let (service, mut session) = setup();
        assert!(matches!(session.stop().await, Err(ClientError::NoActiveSession)));
        assert_eq!(service.count(Op::DebugStop), 0);
    }

    #[tokio::test]
    async fn full_sequence_ends_idle_with_cost() {
        let (service, mut session) = setup();
        let mut ledger = CreditLedger::with_balance(1000);
        service.push_debug(live(0, 1));
        service.push_debug(live(1, 1));
        service.push_debug(live(2, 1));
        service.push_debug(live(5, 3));

        let target = ProgramTarget::program("loop");
        session.start(&target, &config(), &mut ledger).await.unwrap();
        assert_eq!(session.state(), DebugState::Started);
        session.step(&mut ledger).await.unwrap();
        assert_eq!(session.state(), DebugState::Stepping);
        session.step(&mut ledger).await.unwrap();
        session.resume(&mut ledger).await.unwrap();
        assert_eq!(session.state(), DebugState::Continuing);

        let cost = session.stop().await.unwrap();
        assert_eq!(cost, 42);
        assert!(cost >= 0);
        assert_eq!(session.state(), DebugState::Idle);
        assert_eq!(session.last_total_cost(), Some(42));
        // start: 1 + 100 surcharge, then 1 + 1 + 3.
        assert_eq!(ledger.balance(), 1000 - 106);
    }

    #[tokio::test]
    async fn start_sends_materialized_input_and_breakpoints() {
        let (service, mut session) = setup();
        session.add_breakpoint(7).await.unwrap();
        session.add_breakpoint(3).await.unwrap();
        let mut ledger = CreditLedger::new();
        session
            .start(&ProgramTarget::program("loop"), &config(), &mut ledger)
            .await
            .unwrap();
        assert!(service.calls().contains(&ServiceCall::DebugStart {
            expansion_level: 1,
            architecture: Architecture::II,
            input: vec![4],
            breakpoints: vec![3, 7],
        }));
        // Breakpoints set before the session are not sent individually.
        assert_eq!(service.count(Op::AddBreakpoint), 0);
    }

    #[tokio::test]
    async fn binding_failure_unwinds_to_idle() {
        let (service, mut session) = setup();
        let mut ledger = CreditLedger::with_balance(10);
        let err = session
            .start(&ProgramTarget::program("missing"), &config(), &mut ledger)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::ProgramBindingFailed { .. }));
        assert_eq!(session.state(), DebugState::Idle);
        assert_eq!(service.count(Op::CheckRunnable), 0);
        assert_eq!(ledger.balance(), 10);
    }

    #[tokio::test]
    async fn debug_start_rejection_is_typed() {
        let (service, mut session) = setup();
        service.fail_next(Op::DebugStart, "Failed to start debugging program", 400);
        let mut ledger = CreditLedger::new();
        let err = session
            .start(&ProgramTarget::program("loop"), &config(), &mut ledger)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::DebugStartFailed { code: 400, .. }));
        assert_eq!(session.state(), DebugState::Idle);
    }

    #[tokio::test]
    async fn failed_step_keeps_prior_state() {
        let (service, mut session) = setup();
        let mut ledger = CreditLedger::new();
        service.push_debug(live(0, 0));
        service.push_debug(live(1, 0));
        session
            .start(&ProgramTarget::program("loop"), &config(), &mut ledger)
            .await
            .unwrap();
        session.step(&mut ledger).await.unwrap();
        service.fail_next(Op::DebugContinue, "connection reset", 500);
        assert!(session.resume(&mut ledger).await.is_err());
        assert_eq!(session.state(), DebugState::Stepping);
    }

    #[tokio::test]
    async fn program_end_finishes_session() {
        let (service, mut session) = setup();
        let mut ledger = CreditLedger::new();
        service.push_debug(live(0, 0));
        service.push_debug(ExecutionOutcome {
            is_debug: false,
            halt_reason: HaltReason::InsufficientCredits,
            ..ExecutionOutcome::default()
        });
        session
            .start(&ProgramTarget::program("loop"), &config(), &mut ledger)
            .await
            .unwrap();
        session.resume(&mut ledger).await.unwrap();
        assert_eq!(session.state(), DebugState::Finished);
        assert_eq!(session.advisory(), Some(Advisory::InsufficientCredits));
        assert!(matches!(
            session.step(&mut ledger).await,
            Err(ClientError::SessionFinished)
        ));
        session.stop().await.unwrap();
        assert_eq!(session.state(), DebugState::Idle);
    }

    #[tokio::test]
    async fn step_without_session_is_usage_error() {
        let (_service, mut session) = setup();
        let mut ledger = CreditLedger::new();
        assert!(matches!(
            session.step(&mut ledger).await,
            Err(ClientError::NoActiveSession)
        ));
    }

    #[tokio::test]
    async fn breakpoint_edit_during_session_rolls_back_on_failure() {
        let (service, mut session) = setup();
        let mut ledger = CreditLedger::new();
        session
            .start(&ProgramTarget::program("loop"), &config(), &mut ledger)
            .await
            .unwrap();

        assert!(session.toggle_breakpoint(2).await.unwrap());
        assert_eq!(service.count(Op::AddBreakpoint), 1);

        service.fail_next(Op::RemoveBreakpoint, "Failed to remove breakpoint", 400);
        assert!(session.toggle_breakpoint(2).await.is_err());
        assert!(session.breakpoints().contains(2));
    }

    fn stepped(index: i64, cycles: u64, session_cycles: i64) -> ExecutionOutcome {
        ExecutionOutcome {
            cycles,
            ..live(index, session_cycles)
        }
    }

    #[tokio::test]
    async fn step_back_refunds_cycles_and_keeps_stepping() {
        let (service, mut session) = setup();
        let mut ledger = CreditLedger::with_balance(1000);
        service.push_debug(live(0, 0));
        service.push_debug(stepped(1, 2, 2));
        service.push_debug(stepped(0, 0, -2));
        session
            .start(&ProgramTarget::program("loop"), &config(), &mut ledger)
            .await
            .unwrap();
        session.step(&mut ledger).await.unwrap();
        assert_eq!(ledger.balance(), 1000 - 100 - 2);

        let outcome = session.step_back(&mut ledger).await.unwrap();
        assert_eq!(outcome.debug_index, 0);
        assert_eq!(session.state(), DebugState::Stepping);
        assert_eq!(ledger.balance(), 1000 - 100);
        assert_eq!(service.count(Op::DebugStepBack), 1);
    }

    #[tokio::test]
    async fn step_back_at_first_instruction_is_rejected_locally() {
        let (service, mut session) = setup();
        let mut ledger = CreditLedger::new();
        session
            .start(&ProgramTarget::program("loop"), &config(), &mut ledger)
            .await
            .unwrap();
        let err = session.step_back(&mut ledger).await.unwrap_err();
        assert!(matches!(err, ClientError::NothingToStepBack));
        assert_eq!(service.count(Op::DebugStepBack), 0);
        assert_eq!(session.state(), DebugState::Started);
    }

    #[tokio::test]
    async fn clearing_breakpoints_mirrors_each_removal_while_live() {
        let (service, mut session) = setup();
        let mut ledger = CreditLedger::new();
        session.add_breakpoint(4).await.unwrap();
        session.add_breakpoint(9).await.unwrap();
        session
            .start(&ProgramTarget::program("loop"), &config(), &mut ledger)
            .await
            .unwrap();

        session.clear_breakpoints().await.unwrap();
        assert!(session.breakpoints().is_empty());
        assert_eq!(service.count(Op::RemoveBreakpoint), 2);

        session.stop().await.unwrap();
        session.add_breakpoint(1).await.unwrap();
        session.clear_breakpoints().await.unwrap();
        assert_eq!(service.count(Op::RemoveBreakpoint), 2);
    }

    #[tokio::test]
    async fn abandon_returns_to_idle_without_remote_call() {
        let (service, mut session) = setup();
        let mut ledger = CreditLedger::new();
        session
            .start(&ProgramTarget::program("loop"), &config(), &mut ledger)
            .await
            .unwrap();
        session.abandon();
        assert_eq!(session.state(), DebugState::Idle);
        assert_eq!(service.count(Op::DebugStop), 0);
    }
}

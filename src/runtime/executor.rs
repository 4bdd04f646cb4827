use crate::dashboard::ledger::CreditLedger;
use crate::protocol::HistoricalRun;
use crate::runtime::cost::{Architecture, CostModel};
use crate::runtime::result::{classify_halt, ExecutionReport};
use crate::runtime::run_config::{ProgramTarget, RunConfiguration};
use crate::runtime::variables::VariableSet;
use crate::service::EmulatorService;
use crate::{ClientError, Result};
use std::sync::Arc;
use tracing::{info, warn};

/// Sequences the remote calls for one execution.
///
/// Each [`execute`](Self::execute) performs exactly one program binding, one
/// runnability check and one execution call, in that order, and stops at the
/// first failure. Nothing is retried.
pub struct ExecutionOrchestrator {
    service: Arc<dyn EmulatorService>,
    cost_model: CostModel,
    last_execution: Option<ExecutionReport>,
}

impl ExecutionOrchestrator {
    pub fn new(service: Arc<dyn EmulatorService>) -> Self {
        Self {
            service,
            cost_model: CostModel::new(),
            last_execution: None,
        }
    }

    /// Build a fresh configuration for `target`: binds it, validates the
    /// level against the server maximum and seeds the required inputs.
    #[tracing::instrument(skip_all, fields(target = %target.name))]
    pub async fn prepare(
        &self,
        target: &ProgramTarget,
        expansion_level: u32,
        architecture: Architecture,
    ) -> Result<RunConfiguration> {
        self.service
            .bind_active_program(&target.name)
            .await
            .map_err(|e| e.into_binding_failure(&target.name))?;

        let max_level = self.service.max_expansion_level().await?;
        let required = self.service.input_variables().await?;
        let config = RunConfiguration::new(
            expansion_level,
            architecture,
            VariableSet::with_required(required),
        );
        config.validate(max_level)?;
        Ok(config)
    }

    /// Run `config` against `target` and charge `ledger` optimistically.
    ///
    /// The ledger is marked stale; call [`reconcile`](Self::reconcile) to
    /// replace the estimate with the server's balance.
    #[tracing::instrument(
        skip_all,
        fields(
            target = %target.name,
            level = config.expansion_level(),
            architecture = %config.architecture()
        )
    )]
    pub async fn execute(
        &mut self,
        target: &ProgramTarget,
        config: &RunConfiguration,
        ledger: &mut CreditLedger,
    ) -> Result<ExecutionReport> {
        info!("Executing {}", target);

        self.service
            .bind_active_program(&target.name)
            .await
            .map_err(|e| e.into_binding_failure(&target.name))?;

        self.service
            .check_runnable(config.expansion_level(), config.architecture())
            .await
            .map_err(|e| e.into_not_runnable())?;

        let input = config.input().into_vec();
        let outcome = self
            .service
            .execute(config.expansion_level(), config.architecture(), &input)
            .await?;

        let advisory = classify_halt(&outcome);
        let charged = self
            .cost_model
            .run_charge(config.architecture(), outcome.cycles);
        ledger.charge(charged);

        let report = ExecutionReport {
            target: target.clone(),
            expansion_level: config.expansion_level(),
            architecture: config.architecture(),
            input,
            outcome,
            advisory,
            charged,
        };
        self.last_execution = Some(report.clone());
        Ok(report)
    }

    /// [`execute`](Self::execute) followed by a best-effort
    /// [`reconcile`](Self::reconcile). A failed balance read leaves the
    /// optimistic estimate in place and does not fail the run.
    pub async fn execute_and_reconcile(
        &mut self,
        target: &ProgramTarget,
        config: &RunConfiguration,
        ledger: &mut CreditLedger,
    ) -> Result<ExecutionReport> {
        let report = self.execute(target, config, ledger).await?;
        self.reconcile(ledger).await;
        Ok(report)
    }

    /// Re-execute a historical run with its recorded tier, level and inputs,
    /// then reconcile the balance.
    ///
    /// `program` names the target when the record does not carry a name.
    pub async fn rerun(
        &mut self,
        run: &HistoricalRun,
        program: Option<&str>,
        ledger: &mut CreditLedger,
    ) -> Result<ExecutionReport> {
        let mut target = ProgramTarget::from_historical_run(run);
        if target.name.is_empty() {
            target.name = program
                .ok_or(ClientError::UnnamedRun(run.index))?
                .to_string();
        }
        let config = RunConfiguration::from_historical_run(run)?;
        self.execute_and_reconcile(&target, &config, ledger).await
    }

    /// Best-effort authoritative balance read after an execution. Failures
    /// are logged and leave the optimistic balance in place.
    pub async fn reconcile(&self, ledger: &mut CreditLedger) -> Option<i64> {
        match ledger.refresh(self.service.as_ref()).await {
            Ok(balance) => Some(balance),
            Err(e) => {
                warn!("Failed to refresh credit balance: {}", e);
                None
            }
        }
    }

    pub fn last_execution(&self) -> Option<&ExecutionReport> {
        self.last_execution.as_ref()
    }

    pub fn cost_model(&self) -> &CostModel {
        &self.cost_model
    }
}

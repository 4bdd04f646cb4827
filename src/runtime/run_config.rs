//! Execution requests: what to run and how.

use crate::protocol::{HistoricalRun, RunType};
use crate::runtime::cost::Architecture;
use crate::runtime::variables::{PositionalInput, VariableSet};
use crate::{ClientError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of uploaded entity a name refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Program,
    Function,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Program => write!(f, "program"),
            EntityKind::Function => write!(f, "function"),
        }
    }
}

/// The program or function an execution is bound to. Passed explicitly to
/// every operation that selects the server's active program.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProgramTarget {
    pub name: String,
    pub kind: EntityKind,
}

impl ProgramTarget {
    pub fn program(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntityKind::Program,
        }
    }

    pub fn function(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntityKind::Function,
        }
    }

    pub fn from_historical_run(run: &HistoricalRun) -> Self {
        match run.run_type {
            RunType::Program => Self::program(run.program_name.clone()),
            RunType::HelperFunction => Self::function(run.program_name.clone()),
        }
    }
}

impl fmt::Display for ProgramTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.kind, self.name)
    }
}

/// Expansion level, architecture tier and inputs for one execution attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunConfiguration {
    expansion_level: u32,
    architecture: Architecture,
    variables: VariableSet,
}

impl RunConfiguration {
    pub fn new(expansion_level: u32, architecture: Architecture, variables: VariableSet) -> Self {
        Self {
            expansion_level,
            architecture,
            variables,
        }
    }

    /// Re-derive a configuration from a recorded run: same level and tier,
    /// variables seeded from the recorded bindings.
    pub fn from_historical_run(run: &HistoricalRun) -> Result<Self> {
        let architecture: Architecture = run.architecture.parse()?;
        Ok(Self::new(
            run.expansion_level,
            architecture,
            VariableSet::from_historical_run(run),
        ))
    }

    pub fn expansion_level(&self) -> u32 {
        self.expansion_level
    }

    pub fn architecture(&self) -> Architecture {
        self.architecture
    }

    pub fn variables(&self) -> &VariableSet {
        &self.variables
    }

    pub fn variables_mut(&mut self) -> &mut VariableSet {
        &mut self.variables
    }

    pub fn input(&self) -> PositionalInput {
        self.variables.materialize()
    }

    /// Reject an expansion level above the server-reported maximum.
    pub fn validate(&self, max_level: u32) -> Result<()> {
        if self.expansion_level > max_level {
            return Err(ClientError::ExpansionLevelOutOfRange {
                level: self.expansion_level,
                max: max_level,
            });
        }
        Ok(())
    }
}

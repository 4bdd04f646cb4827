//! Dependency highlighting for the program and function listings.
//!
//! Selecting an entity fetches its dependency chain and replaces the
//! highlight set wholesale. Highlights sourced from the other kind of entity
//! are cleared; highlighting is best-effort and never blocks other work.

use crate::runtime::run_config::{EntityKind, ProgramTarget};
use crate::service::EmulatorService;
use crate::Result;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

pub type DependencySet = BTreeSet<String>;

pub struct DependencyHighlighter {
    service: Arc<dyn EmulatorService>,
    selection: Option<ProgramTarget>,
    program_sourced: DependencySet,
    function_sourced: DependencySet,
    /// Programs calling the selected function.
    using_programs: DependencySet,
}

impl DependencyHighlighter {
    pub fn new(service: Arc<dyn EmulatorService>) -> Self {
        Self {
            service,
            selection: None,
            program_sourced: DependencySet::new(),
            function_sourced: DependencySet::new(),
            using_programs: DependencySet::new(),
        }
    }

    /// Select `name` and highlight its dependency chain.
    ///
    /// On failure the previous highlights are left untouched.
    #[tracing::instrument(skip(self))]
    pub async fn highlight(&mut self, name: &str, kind: EntityKind) -> Result<&DependencySet> {
        let chain: DependencySet = self
            .service
            .dependency_chain(name)
            .await
            .inspect_err(|e| warn!("Dependency query for '{}' failed: {}", name, e))?
            .into_iter()
            .collect();

        match kind {
            EntityKind::Program => {
                self.program_sourced = chain;
                self.function_sourced.clear();
                self.using_programs.clear();
            }
            EntityKind::Function => {
                let using = match self.service.programs_using(name).await {
                    Ok(programs) => programs.into_iter().collect(),
                    Err(e) => {
                        warn!("Failed to load programs using '{}': {}", name, e);
                        DependencySet::new()
                    }
                };
                self.function_sourced = chain;
                self.using_programs = using;
                self.program_sourced.clear();
            }
        }
        self.selection = Some(ProgramTarget {
            name: name.to_string(),
            kind,
        });
        debug!(count = self.highlighted().len(), "Highlight set replaced");

        Ok(match kind {
            EntityKind::Program => &self.program_sourced,
            EntityKind::Function => &self.function_sourced,
        })
    }

    pub fn selection(&self) -> Option<&ProgramTarget> {
        self.selection.as_ref()
    }

    /// Highlights sourced from a program selection.
    pub fn program_highlights(&self) -> &DependencySet {
        &self.program_sourced
    }

    /// Highlights sourced from a function selection.
    pub fn function_highlights(&self) -> &DependencySet {
        &self.function_sourced
    }

    pub fn using_programs(&self) -> &DependencySet {
        &self.using_programs
    }

    /// Every highlighted entity name.
    pub fn highlighted(&self) -> DependencySet {
        self.program_sourced
            .iter()
            .chain(&self.function_sourced)
            .chain(&self.using_programs)
            .cloned()
            .collect()
    }

    pub fn is_highlighted(&self, name: &str) -> bool {
        self.program_sourced.contains(name)
            || self.function_sourced.contains(name)
            || self.using_programs.contains(name)
    }

    pub fn clear(&mut self) {
        self.selection = None;
        self.program_sourced.clear();
        self.function_sourced.clear();
        self.using_programs.clear();
    }
}

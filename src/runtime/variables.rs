//! Sparse named input variables and their dense positional form.
//!
//! Inputs are named `x1`, `x2`, ... and may be bound in any order with gaps.
//! [`VariableSet::materialize`] turns them into the positional array the
//! server expects: element `i - 1` holds `x{i}`, missing indices are zero.

use crate::protocol::{HistoricalRun, VariableBinding};
use crate::{ClientError, Result};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Largest index accepted as an input name. Larger indices would make the
/// positional array unreasonably large and are treated as non-input names.
pub const MAX_VARIABLE_INDEX: u32 = 65_535;

fn input_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^x([1-9][0-9]*)$").expect("valid input name pattern"))
}

/// Index `N` of an input name `x{N}`, or `None` for any other name.
pub fn input_index(name: &str) -> Option<u32> {
    let caps = input_name_pattern().captures(name)?;
    caps[1]
        .parse::<u32>()
        .ok()
        .filter(|idx| *idx <= MAX_VARIABLE_INDEX)
}

pub fn input_name(index: u32) -> String {
    format!("x{}", index)
}

/// Which partition of a [`VariableSet`] a binding lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    /// Declared by the server as an input of the current program.
    Required,
    /// Added by the user.
    Custom,
    /// Copied from a historical run.
    Seeded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    value: i64,
    partition: Partition,
}

/// Dense input array; index 0 corresponds to `x1`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PositionalInput(Vec<i64>);

impl PositionalInput {
    pub fn as_slice(&self) -> &[i64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<i64> {
        self.0
    }
}

/// Named bindings with unique names across the required and custom
/// partitions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableSet {
    slots: BTreeMap<String, Slot>,
}

impl VariableSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the required partition with server-declared input names, all
    /// bound to zero. Duplicate names are collapsed.
    pub fn with_required<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = Self::new();
        for name in names {
            set.slots.entry(name.into()).or_insert(Slot {
                value: 0,
                partition: Partition::Required,
            });
        }
        set
    }

    /// Copy every recorded binding of `run` verbatim. Names that are not
    /// inputs are kept for display and skipped by [`materialize`](Self::materialize).
    /// Seed from a past run's named bindings, or from its positional input
    /// when the record carries no names.
    pub fn from_historical_run(run: &HistoricalRun) -> Self {
        if run.recorded_input.is_empty() {
            let bindings: Vec<_> = run
                .input
                .iter()
                .enumerate()
                .map(|(i, value)| VariableBinding::new(format!("x{}", i + 1), *value))
                .collect();
            return Self::from_bindings(&bindings);
        }
        Self::from_bindings(&run.recorded_input)
    }

    pub fn from_bindings(bindings: &[VariableBinding]) -> Self {
        let mut set = Self::new();
        for binding in bindings {
            set.slots.insert(
                binding.name.clone(),
                Slot {
                    value: binding.value,
                    partition: Partition::Seeded,
                },
            );
        }
        set
    }

    /// Add a custom variable. With no name, the next free `x{N}` is used,
    /// where `N` is one more than the largest index present.
    pub fn add(&mut self, name: Option<&str>) -> Result<String> {
        let name = match name {
            Some(name) => {
                if self.slots.contains_key(name) {
                    return Err(ClientError::DuplicateVariable(name.to_string()));
                }
                if input_index(name).is_none() {
                    return Err(ClientError::InvalidVariableName(name.to_string()));
                }
                name.to_string()
            }
            None => {
                let next = self.max_index() + 1;
                if next > MAX_VARIABLE_INDEX {
                    return Err(ClientError::InvalidVariableName(input_name(next)));
                }
                input_name(next)
            }
        };
        self.slots.insert(
            name.clone(),
            Slot {
                value: 0,
                partition: Partition::Custom,
            },
        );
        Ok(name)
    }

    /// Remove a variable from whichever partition holds it. Absent names are
    /// ignored.
    pub fn remove(&mut self, name: &str) {
        self.slots.remove(name);
    }

    pub fn set_value(&mut self, name: &str, value: i64) -> Result<()> {
        let slot = self
            .slots
            .get_mut(name)
            .ok_or_else(|| ClientError::UnknownVariable(name.to_string()))?;
        slot.value = value;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<i64> {
        self.slots.get(name).map(|slot| slot.value)
    }

    pub fn partition_of(&self, name: &str) -> Option<Partition> {
        self.slots.get(name).map(|slot| slot.partition)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Largest input index present, 0 when there is none.
    pub fn max_index(&self) -> u32 {
        self.slots
            .keys()
            .filter_map(|name| input_index(name))
            .max()
            .unwrap_or(0)
    }

    /// Dense positional input; total over every set.
    pub fn materialize(&self) -> PositionalInput {
        let mut values = vec![0i64; self.max_index() as usize];
        for (name, slot) in &self.slots {
            if let Some(idx) = input_index(name) {
                values[idx as usize - 1] = slot.value;
            }
        }
        PositionalInput(values)
    }

    /// Bindings in display order: inputs by index, then other names.
    pub fn bindings(&self) -> Vec<VariableBinding> {
        let mut entries: Vec<(&String, &Slot)> = self.slots.iter().collect();
        entries.sort_by_key(|(name, _)| (input_index(name).unwrap_or(u32::MAX), (*name).clone()));
        entries
            .into_iter()
            .map(|(name, slot)| VariableBinding::new(name.clone(), slot.value))
            .collect()
    }
}

//! Architecture tiers and their per-run surcharge.

use crate::{ClientError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Cost/capability tier a program is executed on.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Architecture {
    #[default]
    I,
    II,
    III,
    IV,
}

impl Architecture {
    pub const ALL: [Architecture; 4] = [
        Architecture::I,
        Architecture::II,
        Architecture::III,
        Architecture::IV,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Architecture::I => "I",
            Architecture::II => "II",
            Architecture::III => "III",
            Architecture::IV => "IV",
        }
    }

    /// Numeric UI selector (1..=4).
    pub fn selector(self) -> u8 {
        match self {
            Architecture::I => 1,
            Architecture::II => 2,
            Architecture::III => 3,
            Architecture::IV => 4,
        }
    }

    /// Fixed per-run surcharge in credits.
    pub fn surcharge(self) -> u64 {
        match self {
            Architecture::I => 5,
            Architecture::II => 100,
            Architecture::III => 500,
            Architecture::IV => 1000,
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Strict parse: accepts the canonical label or its numeric selector.
impl FromStr for Architecture {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "I" | "1" => Ok(Architecture::I),
            "II" | "2" => Ok(Architecture::II),
            "III" | "3" => Ok(Architecture::III),
            "IV" | "4" => Ok(Architecture::IV),
            other => Err(ClientError::UnknownArchitecture(other.to_string())),
        }
    }
}

/// Maps architecture labels to surcharges and normalizes UI selectors.
#[derive(Debug, Clone, Copy, Default)]
pub struct CostModel;

impl CostModel {
    pub fn new() -> Self {
        Self
    }

    /// Surcharge for a tier given by its canonical label.
    pub fn surcharge(&self, label: &str) -> Result<u64> {
        match label.trim() {
            "I" => Ok(Architecture::I.surcharge()),
            "II" => Ok(Architecture::II.surcharge()),
            "III" => Ok(Architecture::III.surcharge()),
            "IV" => Ok(Architecture::IV.surcharge()),
            other => Err(ClientError::UnknownArchitecture(other.to_string())),
        }
    }

    /// Normalize a UI selector (`"1"`..`"4"` or a label) to a tier.
    ///
    /// Unrecognized input falls back to [`Architecture::I`].
    pub fn parse_selector(&self, selector: &str) -> Architecture {
        selector.parse().unwrap_or_else(|_| {
            warn!(
                "Unrecognized architecture selector '{}', defaulting to {}",
                selector,
                Architecture::I
            );
            Architecture::I
        })
    }

    /// Total optimistic charge for a run that consumed `cycles`.
    pub fn run_charge(&self, architecture: Architecture, cycles: u64) -> u64 {
        cycles.saturating_add(architecture.surcharge())
    }
}

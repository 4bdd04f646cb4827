use std::collections::BTreeSet;

/// Command indices the debugger should pause at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BreakpointSet {
    indices: BTreeSet<u32>,
}

impl BreakpointSet {
    /// Create an empty breakpoint set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a breakpoint; returns false if it was already set
    pub fn add(&mut self, index: u32) -> bool {
        self.indices.insert(index)
    }

    /// Remove a breakpoint; returns false if it was not set
    pub fn remove(&mut self, index: u32) -> bool {
        self.indices.remove(&index)
    }

    pub fn contains(&self, index: u32) -> bool {
        self.indices.contains(&index)
    }

    /// Breakpoints in ascending order
    pub fn list(&self) -> Vec<u32> {
        self.indices.iter().copied().collect()
    }

    pub fn clear(&mut self) {
        self.indices.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn count(&self) -> usize {
        self.indices.len()
    }

    /// Parse a comma separated list such as `"3, 7,12"`
    pub fn parse_list(s: &str) -> Result<Self, String> {
        let mut set = Self::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let index = part
                .parse::<u32>()
                .map_err(|_| format!("Invalid breakpoint index '{}'", part))?;
            set.add(index);
        }
        Ok(set)
    }
}

impl FromIterator<u32> for BreakpointSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        Self {
            indices: iter.into_iter().collect(),
        }
    }
}

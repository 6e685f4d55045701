use std::collections::BTreeMap;

use super::system::System;

/// Suffixes of the four states forming a closed thermodynamic square: two
/// independent perturbations (A/M and S/D) in the fixed order consumed by the
/// double-difference combination.
pub const CYCLE_SUFFIXES: [&str; 4] = ["AS", "AD", "MS", "MD"];

/// A closed thermodynamic cycle of four related systems.
///
/// Members are named `<cycle>_AS`, `<cycle>_AD`, `<cycle>_MS` and `<cycle>_MD`;
/// the double free-energy difference is `(AS - AD) - (MS - MD)` over the
/// per-system free-energy terms. Other topologies are not supported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cycle {
    name: String,
}

impl Cycle {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Member system names in `[AS, AD, MS, MD]` order.
    pub fn members(&self) -> [String; 4] {
        CYCLE_SUFFIXES.map(|suffix| format!("{}_{}", self.name, suffix))
    }
}

/// Top-level container owning every [`System`] of a refinement run, keyed by
/// system name, plus the thermodynamic cycles relating them.
///
/// Systems are read-only once inserted; refinement produces separate result
/// records and never writes back into the dataset.
#[derive(Debug, Clone, Default)]
pub struct DataSet {
    systems: BTreeMap<String, System>,
    cycles: Vec<Cycle>,
}

impl DataSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a system, returning the previously stored one on name collision.
    pub fn insert_system(&mut self, system: System) -> Option<System> {
        self.systems.insert(system.name().to_string(), system)
    }

    pub fn add_cycle(&mut self, cycle: Cycle) {
        self.cycles.push(cycle);
    }

    pub fn system(&self, name: &str) -> Option<&System> {
        self.systems.get(name)
    }

    /// Systems in deterministic (lexicographic) name order.
    pub fn systems(&self) -> impl Iterator<Item = (&String, &System)> {
        self.systems.iter()
    }

    pub fn cycles(&self) -> &[Cycle] {
        &self.cycles
    }

    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }
}

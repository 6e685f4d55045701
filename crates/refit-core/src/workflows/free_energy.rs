use std::collections::BTreeMap;

use tracing::{info, instrument};

use crate::core::models::dataset::DataSet;
use crate::engine::error::EngineError;
use crate::engine::report::FreeEnergyReport;

/// Combines per-system log-normalization constants into free-energy terms and
/// double free-energy differences over the dataset's thermodynamic cycles.
///
/// Each system named in `log_z` contributes `-temperature * log_z`; for every
/// cycle the double difference is `(AS - AD) - (MS - MD)` over those terms,
/// and the report's mean averages the cycles. For a synthetic cycle whose four
/// contributions are equal the double difference is exactly zero.
///
/// # Errors
///
/// Returns [`EngineError::UnknownSystem`] if `log_z` names a system absent
/// from the dataset, and [`EngineError::MissingCycleMember`] if any cycle
/// member has no `log_z` entry; partial cycles are never silently evaluated.
#[instrument(skip_all, name = "free_energy_workflow")]
pub fn run(
    dataset: &DataSet,
    log_z: &BTreeMap<String, f64>,
) -> Result<FreeEnergyReport, EngineError> {
    let mut terms = BTreeMap::new();
    for (name, value) in log_z {
        let system = dataset
            .system(name)
            .ok_or_else(|| EngineError::UnknownSystem { name: name.clone() })?;
        terms.insert(name.clone(), -system.temperature() * value);
    }

    let mut cycles = BTreeMap::new();
    for cycle in dataset.cycles() {
        let [a_s, a_d, m_s, m_d] = cycle.members().map(|member| {
            terms
                .get(&member)
                .copied()
                .ok_or(EngineError::MissingCycleMember {
                    cycle: cycle.name().to_string(),
                    member,
                })
        });
        let delta = (a_s? - a_d?) - (m_s? - m_d?);
        cycles.insert(cycle.name().to_string(), delta);
    }

    let mean = if cycles.is_empty() {
        None
    } else {
        Some(cycles.values().sum::<f64>() / cycles.len() as f64)
    };

    info!(
        systems = terms.len(),
        cycles = cycles.len(),
        "Aggregated free-energy terms."
    );

    Ok(FreeEnergyReport {
        terms,
        cycles,
        mean,
    })
}

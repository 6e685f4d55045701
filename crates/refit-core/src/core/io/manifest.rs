use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use nalgebra::DVector;
use serde::Deserialize;
use tracing::info;

use super::LoadError;
use super::tables::{read_experiment, read_matrix, read_vector};
use crate::core::models::dataset::{Cycle, DataSet};
use crate::core::models::observable::{BoundKind, ObservableGroup};
use crate::core::models::system::{DeviationMode, System};

/// On-disk description of a refinement dataset.
///
/// All paths are interpreted relative to the manifest file. Weights are
/// optional (uniform when absent), as are per-system temperatures (falling
/// back to the manifest-wide default, then 1.0).
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub systems: Vec<SystemEntry>,
    #[serde(default)]
    pub cycles: Vec<CycleEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SystemEntry {
    pub name: String,
    #[serde(default)]
    pub weights: Option<PathBuf>,
    #[serde(default)]
    pub deviation: Option<DeviationMode>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub ff_terms: Option<PathBuf>,
    pub observables: Vec<ObservableEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObservableEntry {
    pub name: String,
    pub table: PathBuf,
    pub experiment: PathBuf,
    /// `equality` (default), `lower` or `upper`; the original `=`/`>`/`<`
    /// spellings are also accepted.
    #[serde(default)]
    pub bound: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CycleEntry {
    pub name: String,
}

/// Loads a complete dataset from a TOML manifest plus its CSV tables.
///
/// # Errors
///
/// Fails on unreadable or malformed files and propagates every data-model
/// validation error (mismatched frame counts, non-normalized weights,
/// non-positive uncertainties, unknown bound tags).
pub fn load_dataset(manifest_path: &Path) -> Result<DataSet, LoadError> {
    let text = std::fs::read_to_string(manifest_path).map_err(|source| LoadError::Io {
        path: manifest_path.to_path_buf(),
        source,
    })?;
    let manifest: Manifest = toml::from_str(&text).map_err(|source| LoadError::Manifest {
        path: manifest_path.to_path_buf(),
        source: Box::new(source),
    })?;
    let base = manifest_path.parent().unwrap_or_else(|| Path::new("."));

    let mut dataset = DataSet::new();
    for entry in &manifest.systems {
        let system = load_system(base, &manifest, entry)?;
        dataset.insert_system(system);
    }
    for cycle in &manifest.cycles {
        dataset.add_cycle(Cycle::new(cycle.name.clone()));
    }

    info!(
        manifest = %manifest_path.display(),
        systems = dataset.len(),
        cycles = dataset.cycles().len(),
        "Loaded dataset."
    );
    Ok(dataset)
}

fn load_system(
    base: &Path,
    manifest: &Manifest,
    entry: &SystemEntry,
) -> Result<System, LoadError> {
    let mut tables = BTreeMap::new();
    let mut groups = BTreeMap::new();
    for observable in &entry.observables {
        let table = read_matrix(&base.join(&observable.table))?;
        let (values, uncertainties) = read_experiment(&base.join(&observable.experiment))?;
        let bound = match &observable.bound {
            Some(tag) => BoundKind::from_tag(tag)?,
            None => BoundKind::Equality,
        };
        tables.insert(observable.name.clone(), table);
        groups.insert(
            observable.name.clone(),
            ObservableGroup::new(values, uncertainties, bound),
        );
    }

    let frames = tables.values().next().map_or(0, |table| table.nrows());
    let weights = match &entry.weights {
        Some(path) => read_vector(&base.join(path))?,
        None => DVector::from_element(frames, 1.0 / frames as f64),
    };

    let mut system = System::new(entry.name.clone(), weights, tables, groups)?;
    if let Some(mode) = entry.deviation {
        system = system.with_mode(mode);
    }
    let temperature = entry.temperature.or(manifest.temperature);
    if let Some(temperature) = temperature {
        system = system.with_temperature(temperature)?;
    }
    if let Some(path) = &entry.ff_terms {
        system = system.with_ff_terms(read_matrix(&base.join(path))?)?;
    }
    Ok(system)
}

//! # Dataset I/O Module
//!
//! Assembly of validated datasets from on-disk numeric tables.
//!
//! A refinement dataset is described by a TOML manifest listing, per system,
//! the prior-weight vector, the per-group predicted tables, the experimental
//! values with uncertainties and bound kinds, and optional force-field term
//! tables, all stored as headerless CSV relative to the manifest. The loader
//! reads the manifest ([`manifest`]), parses the tables ([`tables`]), and
//! funnels everything through the data model's constructors so that a loaded
//! [`DataSet`](crate::core::models::dataset::DataSet) carries the same
//! validation guarantees as one built in memory.
//!
//! Raw simulation output is out of scope here: tables are expected to be
//! already tabulated per frame, typically by a forward model applied upstream.

pub mod manifest;
pub mod tables;

use std::path::PathBuf;

use thiserror::Error;

use crate::core::models::DataError;

pub use manifest::load_dataset;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse manifest '{path}': {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: Box<toml::de::Error>,
    },

    #[error("Failed to read table '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: Box<csv::Error>,
    },

    #[error("Invalid number '{value}' in '{path}'")]
    Number { path: PathBuf, value: String },

    #[error("Rows of '{path}' have inconsistent widths")]
    Ragged { path: PathBuf },

    #[error("Table '{path}' is empty")]
    EmptyTable { path: PathBuf },

    #[error("Experiment table '{path}' must have exactly two columns (value, uncertainty)")]
    ExperimentShape { path: PathBuf },

    #[error("Weight table '{path}' must be a single column")]
    WeightShape { path: PathBuf },

    #[error(transparent)]
    Data(#[from] DataError),
}

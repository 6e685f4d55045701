use thiserror::Error;

use crate::core::models::DataError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid input data: {source}")]
    Data {
        #[from]
        source: DataError,
    },

    #[error("Dataset contains no systems")]
    EmptyDataSet,

    #[error("Cycle '{cycle}' is missing member system '{member}'")]
    MissingCycleMember { cycle: String, member: String },

    #[error("Unknown system '{name}' referenced by free-energy input")]
    UnknownSystem { name: String },

    #[error("Internal logic error: {0}")]
    Internal(String),
}

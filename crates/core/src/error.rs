//! Error types for Lisa

use thiserror::Error;

use crate::values::EntityId;

/// Main error type for Lisa operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(
        "analysis requires {num_obs} entities but the weights store only holds {store_obs}"
    )]
    IncompleteWeights { num_obs: usize, store_obs: usize },

    #[error("corrupt weights store: {0}")]
    CorruptStore(String),

    #[error("every entity in the analysis has zero neighbors")]
    AllIsolated,

    #[error("value vector has zero or undefined variance; local statistics are undefined")]
    DegenerateVariance,

    #[error("not enough degrees of freedom for the requested distribution: {dof}")]
    InsufficientDegreesOfFreedom { dof: u64 },

    #[error("duplicate entity id: {0}")]
    DuplicateId(EntityId),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Algorithm error: {0}")]
    Algorithm(String),
}

/// Result type alias for Lisa operations
pub type Result<T> = std::result::Result<T, Error>;

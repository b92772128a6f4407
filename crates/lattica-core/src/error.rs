//! Error types for lattica-core

use crate::Coordinate;
use thiserror::Error;

/// Core error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Cannot parse {kind} state from {input:?}")]
    StateParse { kind: &'static str, input: String },

    #[error("Unknown rule: {0}")]
    UnknownRule(String),

    #[error("Unknown topology: {0}")]
    UnknownTopology(String),

    #[error("Invalid parameter {name} for rule {rule}: {reason}")]
    InvalidRuleParameter {
        rule: String,
        name: String,
        reason: String,
    },

    #[error("Rule fault at {coordinate}: {message}")]
    RuleFault {
        coordinate: Coordinate,
        message: String,
    },

    #[error("Invalid lattice dimensions: {rows}x{columns}")]
    InvalidDimensions { rows: usize, columns: usize },

    #[error("Insufficient memory for a lattice of {cells} cells")]
    InsufficientMemory { cells: usize },
}

impl Error {
    /// Create a rule fault for the cell at `coordinate`
    pub fn rule_fault(coordinate: Coordinate, message: impl Into<String>) -> Self {
        Error::RuleFault {
            coordinate,
            message: message.into(),
        }
    }

    /// Create an invalid-parameter error
    pub fn invalid_parameter(
        rule: impl Into<String>,
        name: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Error::InvalidRuleParameter {
            rule: rule.into(),
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

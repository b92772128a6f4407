//! Error types for lattica-hub

use crate::controller::RunState;
use thiserror::Error;

/// Result type for lattica-hub operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while setting up or running a simulation
#[derive(Debug, Error)]
pub enum Error {
    /// Core error (rule faults, unknown rule or topology, bad dimensions)
    #[error("core error: {0}")]
    Core(#[from] lattica_core::Error),

    /// A shard worker panicked inside a rule
    #[error("worker for shard {shard} panicked: {message}")]
    WorkerPanicked { shard: usize, message: String },

    /// The requested lattice does not fit the memory limit
    #[error("insufficient memory for {requested_cells} cells ({estimated_bytes} bytes estimated, limit {limit_bytes})")]
    InsufficientMemory {
        requested_cells: usize,
        estimated_bytes: u128,
        limit_bytes: u64,
    },

    /// Every tier of the lattice build ladder failed
    #[error("could not build a lattice after {attempts} attempts: {last}")]
    LatticeBuildFailed { attempts: usize, last: String },

    /// Rewind was requested in a state that does not allow it
    #[error("rewind not permitted: {0}")]
    RewindNotPermitted(String),

    /// A lifecycle action that does not apply to the current state
    #[error("cannot {action} while {from}")]
    InvalidTransition { from: RunState, action: &'static str },

    /// Invalid configuration value
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),

    /// The worker thread pool could not be created
    #[error("thread pool error: {0}")]
    ThreadPool(String),
}

impl Error {
    /// Check whether this error came from a rule during an update
    pub fn is_rule_fault(&self) -> bool {
        matches!(
            self,
            Error::Core(lattica_core::Error::RuleFault { .. }) | Error::WorkerPanicked { .. }
        )
    }
}

// Compile-time check that Error is Send + Sync so faults can cross the
// controller thread boundary.
fn _assert_error_send_sync<T: Send + Sync>() {}
fn _error_is_send_sync() {
    _assert_error_send_sync::<Error>();
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattica_core::Coordinate;

    #[test]
    fn test_is_rule_fault() {
        let fault: Error = lattica_core::Error::rule_fault(Coordinate::new(1, 2), "boom").into();
        assert!(fault.is_rule_fault());
        assert!(Error::WorkerPanicked {
            shard: 0,
            message: "boom".into()
        }
        .is_rule_fault());
        assert!(!Error::Config("x".into()).is_rule_fault());
    }

    #[test]
    fn test_display() {
        let err = Error::InvalidTransition {
            from: RunState::Stopped,
            action: "pause",
        };
        assert_eq!(err.to_string(), "cannot pause while stopped");
    }
}

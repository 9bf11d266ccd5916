//! Engine errors
//!
//! Faults inside the engine itself. Problems in user code never surface here;
//! they are classified into test results instead.

use thiserror::Error;

/// Engine-internal errors
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Work item for {name} has already been executed")]
    AlreadyExecuted { name: String },

    #[error("Failed to start timeout worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    #[error("Timeout worker for {name} terminated without reporting a result")]
    WorkerLost { name: String },

    #[error("Execution context restored without a saved prior context")]
    ContextUnderflow,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = EngineError::AlreadyExecuted {
            name: "Suite.test".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Work item for Suite.test has already been executed"
        );

        let err = EngineError::WorkerSpawn(std::io::Error::other("no threads"));
        assert!(err.to_string().contains("no threads"));
    }
}

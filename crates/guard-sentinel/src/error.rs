//! Error types for the sentinel

use hookguard_core_resilience::ResilienceError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SentinelError>;

#[derive(Error, Debug, Clone)]
pub enum SentinelError {
    /// The external program could not be started
    #[error("Failed to spawn {}: {message}", .program.display())]
    Spawn { program: PathBuf, message: String },

    /// The external program ran and reported failure
    #[error("{} exited with {status}: {stderr}", .program.display())]
    NonZeroExit {
        program: PathBuf,
        status: String,
        stderr: String,
    },

    /// Rejected or cut short by a circuit breaker (open circuit, timeout)
    #[error(transparent)]
    Resilience(#[from] ResilienceError),

    /// A recovery strategy failed for a reason of its own
    #[error("Recovery action '{strategy}' failed: {message}")]
    Strategy { strategy: String, message: String },

    #[error("Invalid policy: {0}")]
    Policy(String),
}

impl SentinelError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, SentinelError::Resilience(e) if e.is_timeout())
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self, SentinelError::Resilience(e) if e.is_rejection())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_classification() {
        let timeout: SentinelError = ResilienceError::Timeout {
            name: "refresh".into(),
            after: Duration::from_secs(5),
        }
        .into();
        assert!(timeout.is_timeout());
        assert!(!timeout.is_circuit_open());

        let open: SentinelError = ResilienceError::CircuitOpen {
            name: "recovery".into(),
        }
        .into();
        assert!(open.is_circuit_open());
        assert_eq!(open.to_string(), "circuit 'recovery' is open");
    }

    #[test]
    fn test_exit_message() {
        let err = SentinelError::NonZeroExit {
            program: PathBuf::from("bin/update-evidence.sh"),
            status: "exit status: 2".into(),
            stderr: "no platforms".into(),
        };
        assert_eq!(
            err.to_string(),
            "bin/update-evidence.sh exited with exit status: 2: no platforms"
        );
    }
}

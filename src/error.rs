use crate::domain::event::StopReason;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors raised by the conversation engine and its collaborators.
///
/// The taxonomy matters more than the payloads: `Transport` failures are
/// logged and the conversation continues where possible, `Persistence`
/// failures roll back the enclosing ledger attempt, `Validation` re-prompts
/// in place, and `Stopped`/`SessionExpired` drive the cooperative wind-down.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("transport call failed: {0}")]
    Transport(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("session expired after inactivity")]
    SessionExpired,
    #[error("payment confirmation mismatch: {0}")]
    PaymentMismatch(String),
    #[error("insufficient credit, short by {shortfall}")]
    InsufficientCredit { shortfall: i64 },
    #[error("conversation stopped ({0})")]
    Stopped(StopReason),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// True when the error should end the conversation rather than re-prompt.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::Stopped(_) | EngineError::SessionExpired | EngineError::Persistence(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_errors_end_the_conversation() {
        assert!(EngineError::SessionExpired.is_fatal());
        assert!(EngineError::Stopped(StopReason::Shutdown).is_fatal());
        assert!(EngineError::Persistence("lost".into()).is_fatal());

        assert!(!EngineError::Validation("bad token".into()).is_fatal());
        assert!(!EngineError::Transport("flaky".into()).is_fatal());
        assert!(!EngineError::PaymentMismatch("stale invoice".into()).is_fatal());
    }
}

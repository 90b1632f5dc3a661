//! Error types for the event-sourcing engine
//!
//! Every operation resolves with a value or fails with one of:
//! - `ConcurrencyConflict`: another writer already stored an event at the offset
//! - `Cancelled`: the caller's cancellation token fired at a suspension point
//! - `InvalidArgument`: rejected before any I/O
//! - adapter failures (`Adapter`, `Io`, `Json`): propagated unchanged, never retried

use tokio_util::sync::CancellationToken;

use crate::types::StreamAddress;

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("concurrency conflict on stream {address} at offset {offset}")]
    ConcurrencyConflict { address: StreamAddress, offset: i64 },

    #[error("operation cancelled")]
    Cancelled,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("adapter error: {0}")]
    Adapter(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, EngineError::ConcurrencyConflict { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, EngineError::Cancelled)
    }

    /// Anything raised by a storage adapter other than a conflict
    pub fn is_adapter_failure(&self) -> bool {
        matches!(
            self,
            EngineError::Adapter(_) | EngineError::Io(_) | EngineError::Json(_)
        )
    }
}

/// Fail with `Cancelled` if the token has fired
pub fn ensure_not_cancelled(cancel: &CancellationToken) -> EngineResult<()> {
    if cancel.is_cancelled() {
        Err(EngineError::Cancelled)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let conflict = EngineError::ConcurrencyConflict {
            address: StreamAddress::new("ledger", "1"),
            offset: 3,
        };
        assert!(conflict.is_conflict());
        assert!(!conflict.is_adapter_failure());
        assert_eq!(
            conflict.to_string(),
            "concurrency conflict on stream ledger/1 at offset 3"
        );

        assert!(EngineError::Cancelled.is_cancelled());
        assert!(EngineError::Adapter("down".into()).is_adapter_failure());
        let io = EngineError::from(std::io::Error::new(std::io::ErrorKind::Other, "disk"));
        assert!(io.is_adapter_failure());
        assert!(!EngineError::InvalidArgument("x".into()).is_adapter_failure());
    }

    #[test]
    fn test_ensure_not_cancelled() {
        let token = CancellationToken::new();
        assert!(ensure_not_cancelled(&token).is_ok());
        token.cancel();
        assert!(ensure_not_cancelled(&token).unwrap_err().is_cancelled());
    }
}

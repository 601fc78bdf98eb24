use thiserror::Error;

use crate::node::NodeNum;

/// Errors reported by the mesh transport.
///
/// The runtime never inspects these beyond passing them to the caller.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("transport is not connected")]
    NotConnected,

    #[error("transport is closed")]
    Closed,

    #[error("transport rejected the request: {0}")]
    Rejected(String),

    #[error("transport I/O error: {0}")]
    Io(String),
}

/// Errors from the blocking-call worker pool.
#[derive(Debug, Clone, Error)]
pub enum BridgeError {
    #[error("blocking call panicked: {0}")]
    Panicked(String),

    #[error("worker pool is closed")]
    PoolClosed,
}

/// Errors from sending a message.
#[derive(Debug, Clone, Error)]
pub enum SendError {
    #[error("no public key available for node {0}; refusing to send unencrypted")]
    EncryptionKeyUnavailable(NodeNum),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

/// Errors from the bot runtime lifecycle.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("bot scheduler has not started")]
    SchedulerNotReady,

    #[error("bot is already running")]
    AlreadyRunning,

    #[error("bot is closed")]
    Closed,

    #[error("failed to start bot scheduler: {0}")]
    Scheduler(#[from] std::io::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encryption_key_unavailable_display() {
        let err = SendError::EncryptionKeyUnavailable(NodeNum(7));
        assert_eq!(
            err.to_string(),
            "no public key available for node !00000007; refusing to send unencrypted"
        );
    }

    #[test]
    fn test_transport_error_passes_through() {
        let err: SendError = TransportError::Rejected("queue full".into()).into();
        assert_eq!(err.to_string(), "transport rejected the request: queue full");
        assert!(matches!(err, SendError::Transport(_)));
    }

    #[test]
    fn test_runtime_error_display() {
        assert_eq!(
            RuntimeError::SchedulerNotReady.to_string(),
            "bot scheduler has not started"
        );
    }
}

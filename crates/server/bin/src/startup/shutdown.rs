//! Process signal handling.

use tokio::signal;
use tracing::error;

/// Reason for shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// SIGTERM signal received
    SigTerm,
    /// SIGINT signal received (Ctrl+C)
    SigInt,
}

impl std::fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownReason::SigTerm => write!(f, "SIGTERM"),
            ShutdownReason::SigInt => write!(f, "SIGINT (Ctrl+C)"),
        }
    }
}

/// Wait for SIGINT or SIGTERM.
pub async fn wait_for_signal() -> ShutdownReason {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => ShutdownReason::SigInt,
            Err(e) => {
                error!("Failed to register ctrl-c handler: {}", e);
                std::future::pending::<ShutdownReason>().await
            }
        }
    };

    #[cfg(unix)]
    let term = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                ShutdownReason::SigTerm
            }
            Err(e) => {
                error!("Failed to register SIGTERM handler: {}", e);
                std::future::pending::<ShutdownReason>().await
            }
        }
    };

    #[cfg(not(unix))]
    let term = std::future::pending::<ShutdownReason>();

    tokio::select! {
        reason = ctrl_c => reason,
        reason = term => reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_reason_display() {
        assert_eq!(ShutdownReason::SigTerm.to_string(), "SIGTERM");
        assert_eq!(ShutdownReason::SigInt.to_string(), "SIGINT (Ctrl+C)");
    }
}

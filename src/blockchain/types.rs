//! Chain-specific types and error definitions.

use std::time::Duration;
use thiserror::Error;

use crate::transport::TransportError;

/// Chain ID type for strong typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainId(pub u64);

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<ChainId> for u64 {
    fn from(id: ChainId) -> Self {
        id.0
    }
}

impl std::fmt::Display for ChainId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors that can occur during wallet and chain operations.
///
/// Every variant names the operation and the entity it was aimed at, so the
/// rendered message can be logged as-is.
#[derive(Debug, Error)]
pub enum BlockchainError {
    /// Connectivity or I/O failure talking to the node.
    #[error("Transport error during {operation} ({target}): {message}")]
    Transport {
        operation: &'static str,
        target: String,
        message: String,
    },

    /// The node answered with data that does not have the expected shape.
    #[error("Malformed response to {operation} ({target}): {message}")]
    MalformedResponse {
        operation: &'static str,
        target: String,
        message: String,
    },

    /// Wrong password or corrupted key file. The two are indistinguishable.
    #[error("Authentication failed for {target}: wrong password or corrupted key file")]
    AuthenticationFailure { target: String },

    /// Signature is malformed or does not recover to a public key.
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    /// The node refused the request (nonce too low, insufficient funds, ...).
    #[error("{operation} rejected by node ({target}): {reason}")]
    RejectedByNode {
        operation: &'static str,
        target: String,
        reason: String,
    },

    /// Entity absent, e.g. the receipt of an unconfirmed transaction.
    #[error("{entity} not found: {target}")]
    NotFound {
        entity: &'static str,
        target: String,
    },

    /// A bounded wait elapsed.
    #[error("{operation} timed out after {elapsed:?} ({target})")]
    Timeout {
        operation: &'static str,
        target: String,
        elapsed: Duration,
    },

    /// Transaction parameters failed validation before signing.
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    /// Gas price exceeded maximum allowed.
    #[error("Gas price {current_gwei} gwei exceeds maximum {max_gwei} gwei")]
    GasPriceTooHigh { current_gwei: u64, max_gwei: u64 },

    /// Chain configuration mismatch.
    #[error("Chain ID mismatch: expected {expected}, got {actual}")]
    ChainMismatch { expected: u64, actual: u64 },

    /// Key directory I/O or file format problem.
    #[error("Keystore error for {target}: {message}")]
    Keystore { target: String, message: String },

    /// The OS randomness source failed.
    #[error("Entropy source failure: {0}")]
    Entropy(String),
}

impl BlockchainError {
    /// Whether repeating the same call unchanged can succeed.
    ///
    /// Only connectivity failures and elapsed deadlines qualify. A wrong
    /// password or a node rejection reproduces on every attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Timeout { .. })
    }

    /// Lift a transport failure into the taxonomy, attaching context.
    ///
    /// JSON-RPC error objects become `RejectedByNode`, everything else is a
    /// `Transport` error.
    pub fn from_transport(
        operation: &'static str,
        target: impl Into<String>,
        err: TransportError,
    ) -> Self {
        match err {
            TransportError::Rpc { code, message } => Self::RejectedByNode {
                operation,
                target: target.into(),
                reason: format!("{} (code {})", message, code),
            },
            TransportError::Connection(message) => Self::Transport {
                operation,
                target: target.into(),
                message,
            },
        }
    }

    pub(crate) fn keystore(target: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Keystore {
            target: target.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn malformed(
        operation: &'static str,
        target: impl Into<String>,
        message: impl std::fmt::Display,
    ) -> Self {
        Self::MalformedResponse {
            operation,
            target: target.into(),
            message: message.to_string(),
        }
    }
}

/// Result type for blockchain operations.
pub type BlockchainResult<T> = Result<T, BlockchainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_id_conversion() {
        let chain_id = ChainId::from(1u64);
        assert_eq!(chain_id.0, 1);
        assert_eq!(u64::from(chain_id), 1);
        assert_eq!(chain_id.to_string(), "1");
    }

    #[test]
    fn test_error_display() {
        let err = BlockchainError::Timeout {
            operation: "eth_getTransactionReceipt",
            target: "0xabc".to_string(),
            elapsed: Duration::from_secs(10),
        };
        assert_eq!(
            err.to_string(),
            "eth_getTransactionReceipt timed out after 10s (0xabc)"
        );

        let err = BlockchainError::GasPriceTooHigh {
            current_gwei: 600,
            max_gwei: 500,
        };
        assert!(err.to_string().contains("600"));
    }

    #[test]
    fn test_from_transport() {
        let err = BlockchainError::from_transport(
            "eth_sendRawTransaction",
            "0x01",
            TransportError::Rpc {
                code: -32000,
                message: "nonce too low".to_string(),
            },
        );
        assert!(matches!(err, BlockchainError::RejectedByNode { .. }));
        assert_eq!(
            err.to_string(),
            "eth_sendRawTransaction rejected by node (0x01): nonce too low (code -32000)"
        );
        assert!(!err.is_retryable());

        let err = BlockchainError::from_transport(
            "eth_chainId",
            "node",
            TransportError::Connection("connection refused".to_string()),
        );
        assert!(err.is_retryable());
        assert!(err.to_string().contains("eth_chainId"));
    }
}

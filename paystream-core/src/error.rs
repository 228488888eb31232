//! Error types for PayStream.
//!
//! A single error hierarchy built with `thiserror`. The variants mirror how a
//! caller is expected to react: fix the input, retry, shrink the range, or ask
//! the user again.

use thiserror::Error;

/// Result type alias using `PaystreamError`.
pub type Result<T> = std::result::Result<T, PaystreamError>;

/// Main error type for all PayStream operations.
#[derive(Debug, Error)]
pub enum PaystreamError {
    // ═══════════════════════════════════════════════════════════════════════════
    // CRYPTOGRAPHIC ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Malformed point or scalar: identity, off-curve, zero, or not below the curve order.
    #[error("Invalid key material: {0}")]
    InvalidKeyMaterial(String),

    /// Malformed signing input for key derivation.
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // STEALTH ADDRESS ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Invalid meta-address format or content.
    #[error("Invalid meta-address: {0}")]
    InvalidMetaAddress(String),

    /// Invalid announcement (bad metadata, unsupported encoding).
    #[error("Invalid announcement: {0}")]
    InvalidAnnouncement(String),

    /// Invalid 20-byte account address.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // LEDGER ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Ledger endpoint unreachable or returned a transient failure.
    #[error("Transport error: {0}")]
    TransportError(String),

    /// The ledger refused a log query because the block range is too wide.
    #[error("Block range {from_block}..={to_block} exceeds the ledger's log-range limit")]
    RangeTooLarge {
        /// First block of the rejected range
        from_block: u64,
        /// Last block of the rejected range
        to_block: u64,
    },

    /// JSON-RPC error object returned by the node.
    #[error("RPC error {code}: {message}")]
    RpcError {
        /// JSON-RPC error code
        code: i64,
        /// Error message
        message: String,
    },

    /// Contract ABI encoding or decoding failed.
    #[error("ABI error: {0}")]
    AbiError(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // WALLET & SWEEP ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// The user declined the signature request.
    #[error("Signing request declined by the user")]
    SigningDeclined,

    /// Stealth address cannot pay for the gas of its own sweep.
    #[error("Insufficient gas: need {required} wei, stealth address holds {available} wei")]
    InsufficientGas {
        /// Native-coin cost of the sweep transaction
        required: u128,
        /// Native-coin balance at the stealth address
        available: u128,
    },

    /// Nothing to move out of the stealth address.
    #[error("Nothing to sweep from {0}")]
    NothingToSweep(String),

    /// Another sweep for the same stealth address is still in flight.
    #[error("Sweep already in progress for {0}")]
    SweepInProgress(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // SERIALIZATION ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Invalid hex encoding.
    #[error("Invalid hex encoding: {0}")]
    HexError(#[from] hex::FromHexError),

    // ═══════════════════════════════════════════════════════════════════════════
    // VALIDATION ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Input validation failed.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // INTERNAL ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Internal invariant violation (should never happen).
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl PaystreamError {
    /// Returns true if the caller may retry the same operation (possibly with a smaller range).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PaystreamError::TransportError(_) | PaystreamError::RangeTooLarge { .. }
        )
    }

    /// Returns true if this is a cryptographic error.
    pub fn is_crypto_error(&self) -> bool {
        matches!(
            self,
            PaystreamError::InvalidKeyMaterial(_) | PaystreamError::InvalidSignature(_)
        )
    }

    /// Returns true if this is a validation error.
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            PaystreamError::ValidationError(_)
                | PaystreamError::InvalidMetaAddress(_)
                | PaystreamError::InvalidAnnouncement(_)
                | PaystreamError::InvalidAddress(_)
        )
    }

    /// Returns true if the user refused to sign.
    pub fn is_declined(&self) -> bool {
        matches!(self, PaystreamError::SigningDeclined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PaystreamError::RangeTooLarge {
            from_block: 100,
            to_block: 20_100,
        };
        assert!(err.to_string().contains("100..=20100"));

        let err = PaystreamError::InsufficientGas {
            required: 21_000,
            available: 5,
        };
        assert!(err.to_string().contains("21000"));
    }

    #[test]
    fn test_error_classification() {
        assert!(PaystreamError::TransportError("timeout".into()).is_recoverable());
        assert!(PaystreamError::RangeTooLarge { from_block: 0, to_block: 1 }.is_recoverable());
        assert!(!PaystreamError::SigningDeclined.is_recoverable());
        assert!(!PaystreamError::InvalidKeyMaterial("zero".into()).is_recoverable());

        assert!(PaystreamError::InvalidKeyMaterial("identity".into()).is_crypto_error());
        assert!(PaystreamError::InvalidSignature("short".into()).is_crypto_error());
        assert!(!PaystreamError::TransportError("x".into()).is_crypto_error());

        assert!(PaystreamError::SigningDeclined.is_declined());
        assert!(PaystreamError::InvalidMetaAddress("x".into()).is_validation_error());
    }

    #[test]
    fn test_json_error_conversion() {
        let json_result: std::result::Result<serde_json::Value, _> = serde_json::from_str("invalid");
        let result: Result<serde_json::Value> = json_result.map_err(PaystreamError::from);
        assert!(matches!(result, Err(PaystreamError::JsonError(_))));
    }
}

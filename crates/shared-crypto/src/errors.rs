//! Crypto error types.

use thiserror::Error;

/// Cryptographic operation errors.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Signature verification failed
    #[error("Signature verification failed")]
    SignatureVerificationFailed,

    /// Invalid public key
    #[error("Invalid public key")]
    InvalidPublicKey,

    /// Invalid private key
    #[error("Invalid private key")]
    InvalidPrivateKey,

    /// Invalid signature
    #[error("Invalid signature")]
    InvalidSignature,

    /// Recovery id outside `{0, 1, 2, 3}`
    #[error("Invalid recovery id: {0}")]
    InvalidRecoveryId(u8),

    /// Signing failed
    #[error("Signing failed: {0}")]
    SigningFailed(String),

    /// Key generation failed
    #[error("Key generation failed: {0}")]
    KeyGenerationFailed(String),

    /// BLS aggregation failed
    #[error("BLS aggregation failed")]
    AggregationFailed,

    /// Every multiplicity was zero, so there is no key to verify against
    #[error("Aggregate has no signers")]
    EmptyAggregate,

    /// Public key list and multiplicity vector differ in length
    #[error("Length mismatch: {keys} keys, {weights} multiplicities")]
    LengthMismatch {
        /// Number of public keys
        keys: usize,
        /// Number of multiplicities
        weights: usize,
    },
}

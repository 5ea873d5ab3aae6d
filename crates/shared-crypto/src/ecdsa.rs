//! # Recoverable ECDSA Signatures (secp256k1)
//!
//! Block proposers and validators sign with secp256k1. Signatures carry a
//! recovery id so the signer address can be recovered from the signature and
//! compared with the claimed proposer or voter, Ethereum style.
//!
//! ## Security Properties
//!
//! - RFC 6979 deterministic nonces (no RNG dependency for signing)
//! - Low-S normalization (EIP-2), enforced by `k256`
//! - Messages are Keccak-256 prehashed before signing

use crate::hashing::keccak256;
use crate::CryptoError;
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};
use std::fmt;

/// 20-byte account address (last 20 bytes of the Keccak-256 of the public key).
pub type Address = [u8; 20];

/// 65-byte recoverable signature: `r || s || v` with `v` in `{0, 1}`.
#[serde_as]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecoverableSignature(#[serde_as(as = "Bytes")] [u8; 65]);

impl RecoverableSignature {
    /// Wrap raw bytes.
    pub fn from_bytes(bytes: [u8; 65]) -> Self {
        Self(bytes)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 65] {
        &self.0
    }

    /// Recover the signer address of `message`.
    pub fn recover_address(&self, message: &[u8]) -> Result<Address, CryptoError> {
        recover_address(&keccak256(message), self)
    }

    /// Check that `message` was signed by `address`.
    pub fn verify(&self, message: &[u8], address: &Address) -> bool {
        matches!(self.recover_address(message), Ok(recovered) if &recovered == address)
    }
}

impl fmt::Debug for RecoverableSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecoverableSignature(0x{}..)", hex::encode(&self.0[..8]))
    }
}

/// secp256k1 keypair identifying a node.
pub struct Secp256k1KeyPair {
    signing_key: SigningKey,
    address: Address,
}

impl Secp256k1KeyPair {
    /// Generate random keypair.
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::random(&mut rand::thread_rng()))
    }

    /// Create from secret key bytes (32 bytes).
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, CryptoError> {
        let signing_key =
            SigningKey::from_bytes((&bytes).into()).map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(Self::from_signing_key(signing_key))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let address = address_of(signing_key.verifying_key());
        Self {
            signing_key,
            address,
        }
    }

    /// Address derived from the public key.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Sign the Keccak-256 digest of `message`.
    pub fn sign(&self, message: &[u8]) -> Result<RecoverableSignature, CryptoError> {
        let digest = keccak256(message);
        let (sig, recid) = self
            .signing_key
            .sign_prehash_recoverable(&digest)
            .map_err(|e| CryptoError::SigningFailed(e.to_string()))?;

        let mut bytes = [0u8; 65];
        bytes[..64].copy_from_slice(&sig.to_bytes());
        bytes[64] = recid.to_byte();
        Ok(RecoverableSignature(bytes))
    }

    /// Get secret key bytes (for serialization).
    pub fn to_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes().into()
    }
}

// `SigningKey` zeroizes its scalar on drop.
impl Clone for Secp256k1KeyPair {
    fn clone(&self) -> Self {
        Self {
            signing_key: self.signing_key.clone(),
            address: self.address,
        }
    }
}

impl fmt::Debug for Secp256k1KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secp256k1KeyPair")
            .field("address", &hex::encode(self.address))
            .finish_non_exhaustive()
    }
}

/// Recover the signer address from a prehashed message.
pub fn recover_address(
    message_hash: &[u8; 32],
    signature: &RecoverableSignature,
) -> Result<Address, CryptoError> {
    let bytes = signature.as_bytes();
    let recovery_id = RecoveryId::from_byte(bytes[64])
        .ok_or(CryptoError::InvalidRecoveryId(bytes[64]))?;
    let sig = Signature::from_slice(&bytes[..64]).map_err(|_| CryptoError::InvalidSignature)?;

    let recovered = VerifyingKey::recover_from_prehash(message_hash, &sig, recovery_id)
        .map_err(|_| CryptoError::SignatureVerificationFailed)?;

    Ok(address_of(&recovered))
}

fn address_of(key: &VerifyingKey) -> Address {
    // Uncompressed point is 0x04 || x || y; the prefix is not hashed.
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..]);
    address
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_recover() {
        let keypair = Secp256k1KeyPair::generate();
        let signature = keypair.sign(b"block header").unwrap();

        let recovered = signature.recover_address(b"block header").unwrap();
        assert_eq!(recovered, keypair.address());
        assert!(signature.verify(b"block header", &keypair.address()));
    }

    #[test]
    fn test_wrong_message_recovers_other_address() {
        let keypair = Secp256k1KeyPair::generate();
        let signature = keypair.sign(b"message1").unwrap();

        assert!(!signature.verify(b"message2", &keypair.address()));
    }

    #[test]
    fn test_deterministic_signatures() {
        let keypair = Secp256k1KeyPair::from_bytes([0xABu8; 32]).unwrap();

        let sig1 = keypair.sign(b"deterministic").unwrap();
        let sig2 = keypair.sign(b"deterministic").unwrap();

        assert_eq!(sig1, sig2);
    }

    #[test]
    fn test_invalid_recovery_id_rejected() {
        let keypair = Secp256k1KeyPair::generate();
        let mut bytes = *keypair.sign(b"vote").unwrap().as_bytes();
        bytes[64] = 9;

        let result = RecoverableSignature::from_bytes(bytes).recover_address(b"vote");
        assert!(matches!(result, Err(CryptoError::InvalidRecoveryId(9))));
    }

    #[test]
    fn test_restored_keypair_keeps_address() {
        let original = Secp256k1KeyPair::generate();
        let restored = Secp256k1KeyPair::from_bytes(original.to_bytes()).unwrap();

        assert_eq!(original.address(), restored.address());
    }

    #[test]
    fn test_signature_serde_bincode() {
        let keypair = Secp256k1KeyPair::generate();
        let signature = keypair.sign(b"encoded").unwrap();

        let encoded = bincode::serialize(&signature).unwrap();
        let decoded: RecoverableSignature = bincode::deserialize(&encoded).unwrap();
        assert!(decoded.verify(b"encoded", &keypair.address()));
    }
}

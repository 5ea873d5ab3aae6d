//! # Shared Crypto - Consensus Cryptographic Primitives
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `hashing` | Keccak-256 | Block/vote hashes, pool hashes, PRNG seeds |
//! | `ecdsa` | secp256k1 (recoverable) | Proposer and validator vote signatures |
//! | `bls` | BLS12-381 `min_pk` | Guardian / elite-edge-node committee aggregates |
//!
//! ## Security Properties
//!
//! - **secp256k1**: RFC 6979 deterministic, low-S normalization (EIP-2)
//! - **BLS**: proof-of-possession DST, subgroup checks on every parsed key and
//!   signature

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bls;
pub mod ecdsa;
pub mod errors;
pub mod hashing;

// Re-exports
pub use bls::{BlsKeyPair, BlsPublicKeyBytes, BlsSignatureBytes};
pub use ecdsa::{Address, RecoverableSignature, Secp256k1KeyPair};
pub use errors::CryptoError;
pub use hashing::{keccak256, keccak256_concat, Hash};

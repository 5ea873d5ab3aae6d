//! # Canonical Encoding
//!
//! bincode 1.3 with default options is the canonical encoding: it is what
//! block hashes, sign-bytes and pool hashes are computed over, and what the
//! block tree and consensus state persist.

use crate::errors::CodecError;
use crate::primitives::Hash;
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared_crypto::keccak256;

/// Encode a value for storage.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CodecError> {
    bincode::serialize(value).map_err(|e| CodecError::Encode(e.to_string()))
}

/// Decode a stored value.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    bincode::deserialize(bytes).map_err(|e| CodecError::Decode(e.to_string()))
}

/// Canonical bytes of a value that is hashed or signed.
///
/// Only used with plain data types (fixed arrays, integers, strings, `Vec`s and
/// enums of those), for which bincode serialization cannot fail.
pub fn canonical_bytes<T: Serialize + ?Sized>(value: &T) -> Vec<u8> {
    bincode::serialize(value).expect("bincode serialization of plain data is infallible")
}

/// Keccak-256 of the canonical encoding.
pub fn canonical_hash<T: Serialize + ?Sized>(value: &T) -> Hash {
    keccak256(&canonical_bytes(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_garbage_fails() {
        let result: Result<(u64, String), _> = decode(&[0xFF]);
        assert!(matches!(result, Err(CodecError::Decode(_))));
    }

    #[test]
    fn test_canonical_hash_is_stable() {
        let a = canonical_hash(&("chain", 7u64));
        let b = canonical_hash(&("chain", 7u64));
        let c = canonical_hash(&("chain", 8u64));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}

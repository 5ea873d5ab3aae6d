//! # Keccak-256 Hashing
//!
//! Every digest in the consensus core (block hashes, transaction roots, pool
//! hashes, vote bookkeeping keys, PRNG seeds) is Keccak-256.

use sha3::{Digest, Keccak256};

/// 256-bit digest.
pub type Hash = [u8; 32];

/// Hash data with Keccak-256 (one-shot).
pub fn keccak256(data: &[u8]) -> Hash {
    Keccak256::digest(data).into()
}

/// Hash the concatenation of several inputs without allocating the joined buffer.
pub fn keccak256_concat(inputs: &[&[u8]]) -> Hash {
    let mut hasher = Keccak256::new();
    for input in inputs {
        hasher.update(input);
    }
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak_empty_vector() {
        let hash = keccak256(b"");
        assert_eq!(
            hex::encode(hash),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_concat_matches_joined_input() {
        let joined = keccak256(b"address:block");
        let parts = keccak256_concat(&[b"address", b":", b"block"]);
        assert_eq!(joined, parts);
    }
}

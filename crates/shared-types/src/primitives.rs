//! # Primitives
//!
//! Fixed-size identifiers used everywhere in the consensus core.

pub use shared_crypto::{Address, Hash};

// Re-export U256 for stake arithmetic that must not overflow.
pub use primitive_types::U256;

/// The all-zero hash, used as "no block".
pub const ZERO_HASH: Hash = [0u8; 32];

/// The all-zero address, used as "no proposer / no voter".
pub const ZERO_ADDRESS: Address = [0u8; 20];

/// Returns true for the all-zero hash.
pub fn is_empty_hash(hash: &Hash) -> bool {
    hash == &ZERO_HASH
}

/// Returns true for the all-zero address.
pub fn is_empty_address(address: &Address) -> bool {
    address == &ZERO_ADDRESS
}

/// First four bytes of a hash in hex, for log fields.
pub fn short_hash(hash: &Hash) -> String {
    hex::encode(&hash[..4])
}

/// Full `0x`-prefixed hex form of an address.
pub fn address_hex(address: &Address) -> String {
    format!("0x{}", hex::encode(address))
}

//! Key layout of the block tree in the shared key-value store.

use shared_types::Hash;

/// Key prefixes, each followed by a hash or a big-endian height.
pub struct KeyPrefix;

impl KeyPrefix {
    pub const EXTENDED_BLOCK: &'static [u8] = b"eb/";
    pub const BLOCKS_BY_HEIGHT: &'static [u8] = b"bh/";
    pub const TX_LOCATION: &'static [u8] = b"tx/";
    pub const VOTES_BY_BLOCK: &'static [u8] = b"vt/";

    fn join(prefix: &[u8], suffix: &[u8]) -> Vec<u8> {
        let mut key = Vec::with_capacity(prefix.len() + suffix.len());
        key.extend_from_slice(prefix);
        key.extend_from_slice(suffix);
        key
    }

    pub fn block_key(hash: &Hash) -> Vec<u8> {
        Self::join(Self::EXTENDED_BLOCK, hash)
    }

    /// Big-endian so heights sort numerically.
    pub fn height_key(height: u64) -> Vec<u8> {
        Self::join(Self::BLOCKS_BY_HEIGHT, &height.to_be_bytes())
    }

    pub fn tx_key(tx_hash: &Hash) -> Vec<u8> {
        Self::join(Self::TX_LOCATION, tx_hash)
    }

    pub fn votes_key(block: &Hash) -> Vec<u8> {
        Self::join(Self::VOTES_BY_BLOCK, block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_do_not_collide() {
        let h = [9u8; 32];
        let keys = [
            KeyPrefix::block_key(&h),
            KeyPrefix::tx_key(&h),
            KeyPrefix::votes_key(&h),
        ];
        assert_ne!(keys[0], keys[1]);
        assert_ne!(keys[1], keys[2]);
        assert_eq!(keys[0].len(), 35);
    }

    #[test]
    fn test_height_keys_sort_numerically() {
        assert!(KeyPrefix::height_key(255) < KeyPrefix::height_key(256));
    }
}

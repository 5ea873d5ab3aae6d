//! Stake-weighted sampling of elite edge nodes.
//!
//! Only a random, stake-weighted subset of the pool may vote on a checkpoint.
//! Every node derives the same subset from the block hash alone:
//!
//! ```text
//! stakes   [ 30 ][   50   ][ 20 ]      total = 100
//! samples      ^7     ^41 ^52           (Keccak(b || i) seeded draws)
//! eligible  {0, 1}
//! ```

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared_crypto::keccak256_concat;
use shared_types::Hash;
use std::collections::BTreeSet;

/// Memoizes the eligible set of the current checkpoint block.
#[derive(Debug)]
pub struct SamplingGate {
    sample_size: usize,
    memo: Option<(Hash, BTreeSet<usize>)>,
}

impl SamplingGate {
    pub fn new(sample_size: usize) -> Self {
        Self {
            sample_size,
            memo: None,
        }
    }

    /// Whether member `index` of a pool with `stakes` may vote on `block`.
    pub fn is_eligible(&mut self, block: &Hash, stakes: &[u128], index: usize) -> bool {
        match &self.memo {
            Some((memo_block, eligible)) if memo_block == block => eligible.contains(&index),
            _ => {
                let eligible = eligible_members(block, stakes, self.sample_size);
                let result = eligible.contains(&index);
                self.memo = Some((*block, eligible));
                result
            }
        }
    }
}

/// Indices of members hit by at least one of `sample_size` draws.
pub fn eligible_members(block: &Hash, stakes: &[u128], sample_size: usize) -> BTreeSet<usize> {
    let total = stakes.iter().fold(0u128, |acc, s| acc.saturating_add(*s));
    if total == 0 {
        return BTreeSet::new();
    }

    let mut samples: Vec<u128> = (0..sample_size as u64)
        .map(|i| {
            let seed = keccak256_concat(&[block, &i.to_be_bytes()]);
            StdRng::from_seed(seed).gen_range(0..total)
        })
        .collect();
    samples.sort_unstable();

    let mut eligible = BTreeSet::new();
    let mut next = 0usize;
    let mut lower = 0u128;
    for (index, stake) in stakes.iter().enumerate() {
        let upper = lower.saturating_add(*stake);
        while next < samples.len() && samples[next] < upper {
            eligible.insert(index);
            next += 1;
        }
        lower = upper;
    }
    eligible
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_stake_admits_no_one() {
        assert!(eligible_members(&[1; 32], &[0, 0], 400).is_empty());
        assert!(eligible_members(&[1; 32], &[], 400).is_empty());
    }

    #[test]
    fn test_sampling_is_deterministic() {
        let stakes = [10, 500, 3, 77, 1_000];
        let a = eligible_members(&[7; 32], &stakes, 5);
        let b = eligible_members(&[7; 32], &stakes, 5);
        assert_eq!(a, b);
        assert!(!a.is_empty() && a.len() <= 5);
    }

    #[test]
    fn test_zero_stake_member_never_sampled() {
        let stakes = [100, 0, 100];
        for seed in 0..20u8 {
            assert!(!eligible_members(&[seed; 32], &stakes, 50).contains(&1));
        }
    }

    #[test]
    fn test_large_sample_covers_everyone() {
        let stakes = [100, 100, 100, 100];
        let eligible = eligible_members(&[3; 32], &stakes, 400);
        assert_eq!(eligible.len(), 4);
    }

    #[test]
    fn test_gate_memoizes_per_block() {
        let stakes = [1, 1_000_000];
        let mut gate = SamplingGate::new(1);
        let expected = eligible_members(&[1; 32], &stakes, 1);
        for index in 0..2 {
            assert_eq!(gate.is_eligible(&[1; 32], &stakes, index), expected.contains(&index));
        }
        // Switching blocks recomputes.
        let other = eligible_members(&[2; 32], &stakes, 1);
        assert_eq!(gate.is_eligible(&[2; 32], &stakes, 1), other.contains(&1));
    }
}

//! # Validators
//!
//! A validator set is kept sorted by address so that every node iterates it in
//! the same order (stake-weighted proposer selection depends on that order).

use crate::primitives::{address_hex, Address, U256};
use crate::vote::VoteSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A staked block validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    pub address: Address,
    pub stake: u128,
}

impl Validator {
    pub fn new(address: Address, stake: u128) -> Self {
        Self { address, stake }
    }
}

impl fmt::Display for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}, stake: {}}}", address_hex(&self.address), self.stake)
    }
}

/// Validators sorted by address, at most one entry per address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorSet {
    validators: Vec<Validator>,
}

impl ValidatorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_validators(validators: impl IntoIterator<Item = Validator>) -> Self {
        let mut set = Self::new();
        for validator in validators {
            set.add_validator(validator);
        }
        set
    }

    /// Insert in address order; an existing entry for the address is replaced.
    pub fn add_validator(&mut self, validator: Validator) {
        match self
            .validators
            .binary_search_by(|v| v.address.cmp(&validator.address))
        {
            Ok(i) => self.validators[i] = validator,
            Err(i) => self.validators.insert(i, validator),
        }
    }

    pub fn get_validator(&self, address: &Address) -> Option<&Validator> {
        self.validators
            .binary_search_by(|v| v.address.cmp(address))
            .ok()
            .map(|i| &self.validators[i])
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.get_validator(address).is_some()
    }

    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    pub fn size(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    pub fn total_stake(&self) -> U256 {
        self.validators
            .iter()
            .fold(U256::zero(), |acc, v| acc + U256::from(v.stake))
    }

    /// Stake of the distinct voters in `votes` that belong to this set.
    pub fn voted_stake<'a>(&self, voters: impl IntoIterator<Item = &'a Address>) -> U256 {
        let distinct: BTreeSet<&Address> = voters.into_iter().collect();
        distinct
            .into_iter()
            .filter_map(|address| self.get_validator(address))
            .fold(U256::zero(), |acc, v| acc + U256::from(v.stake))
    }

    /// Strictly more than two thirds of the total stake: `3 * voted > 2 * total`.
    pub fn has_majority_stake(&self, voted: U256) -> bool {
        let total = self.total_stake();
        !total.is_zero() && voted * U256::from(3u8) > total * U256::from(2u8)
    }

    /// Whether the voters of `votes` hold a two-thirds majority of this set.
    pub fn has_majority(&self, votes: &VoteSet) -> bool {
        self.has_majority_stake(self.voted_stake(votes.iter().map(|v| &v.id)))
    }
}

impl fmt::Display for ValidatorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValidatorSet[")?;
        for (i, v) in self.validators.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{v}")?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vote::Vote;

    fn set(stakes: &[u128]) -> ValidatorSet {
        ValidatorSet::from_validators(
            stakes
                .iter()
                .enumerate()
                .map(|(i, s)| Validator::new([i as u8 + 1; 20], *s)),
        )
    }

    fn votes_from(ids: &[u8]) -> VoteSet {
        let mut votes = VoteSet::new();
        for id in ids {
            votes.add_vote(Vote::new([9u8; 32], 1, 1, [*id; 20]));
        }
        votes
    }

    #[test]
    fn test_validators_sorted_and_replaced() {
        let mut vs = ValidatorSet::new();
        vs.add_validator(Validator::new([3u8; 20], 10));
        vs.add_validator(Validator::new([1u8; 20], 10));
        vs.add_validator(Validator::new([2u8; 20], 10));
        vs.add_validator(Validator::new([1u8; 20], 50));

        let addrs: Vec<_> = vs.validators().iter().map(|v| v.address[0]).collect();
        assert_eq!(addrs, vec![1, 2, 3]);
        assert_eq!(vs.get_validator(&[1u8; 20]).map(|v| v.stake), Some(50));
        assert_eq!(vs.total_stake(), U256::from(70));
    }

    #[test]
    fn test_majority_requires_strictly_more_than_two_thirds() {
        let vs = set(&[1, 1, 1]);
        assert!(!vs.has_majority(&votes_from(&[1, 2])));
        assert!(vs.has_majority(&votes_from(&[1, 2, 3])));

        let vs = set(&[1, 1, 1, 1]);
        assert!(!vs.has_majority(&votes_from(&[1, 2])));
        assert!(vs.has_majority(&votes_from(&[1, 2, 3])));
    }

    #[test]
    fn test_majority_is_stake_weighted() {
        let vs = set(&[100, 10, 10]);
        assert!(vs.has_majority(&votes_from(&[1])));
        assert!(!vs.has_majority(&votes_from(&[2, 3])));
    }

    #[test]
    fn test_empty_votes_and_outsiders_never_reach_majority() {
        let vs = set(&[5, 5]);
        assert!(!vs.has_majority(&VoteSet::new()));
        assert!(!vs.has_majority(&votes_from(&[40, 41, 42])));
        assert!(!ValidatorSet::new().has_majority(&votes_from(&[1])));
    }

    #[test]
    fn test_voter_counted_once_across_epochs() {
        let vs = set(&[1, 1, 1]);
        let mut votes = VoteSet::new();
        votes.add_vote(Vote::new([9u8; 32], 1, 1, [1u8; 20]));
        votes.add_vote(Vote::new([9u8; 32], 1, 2, [1u8; 20]));
        votes.add_vote(Vote::new([9u8; 32], 1, 3, [1u8; 20]));
        votes.add_vote(Vote::new([9u8; 32], 1, 1, [2u8; 20]));
        assert!(!vs.has_majority(&votes));
    }

    #[test]
    fn test_large_stakes_do_not_overflow() {
        let vs = set(&[u128::MAX, u128::MAX, u128::MAX]);
        assert!(vs.has_majority(&votes_from(&[1, 2, 3])));
        assert!(!vs.has_majority(&votes_from(&[1, 2])));
    }
}

//! Proposer and committee selection.
//!
//! Both managers are pure functions of the validator set and the epoch, so
//! every node picks the same proposer for an epoch without communicating.

use super::error::{ConsensusError, ConsensusResult};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared_types::{Validator, ValidatorSet};

pub trait ValidatorSelector: Send + Sync {
    fn proposer_for_epoch(&self, epoch: u64) -> ConsensusResult<Validator>;

    fn validator_set_for_epoch(&self, epoch: u64) -> ValidatorSet;
}

/// Always proposes with the first validator.
#[derive(Clone, Debug)]
pub struct FixedValidatorManager {
    validators: ValidatorSet,
}

impl FixedValidatorManager {
    pub fn new(validators: ValidatorSet) -> Self {
        Self { validators }
    }
}

impl ValidatorSelector for FixedValidatorManager {
    fn proposer_for_epoch(&self, _epoch: u64) -> ConsensusResult<Validator> {
        self.validators
            .validators()
            .first()
            .copied()
            .ok_or(ConsensusError::NoValidators)
    }

    fn validator_set_for_epoch(&self, _epoch: u64) -> ValidatorSet {
        self.validators.clone()
    }
}

/// Stake-weighted proposer draw seeded by the epoch.
///
/// The draw is replayable by anyone who knows the epoch, which also means it
/// is predictable: it offers no resistance to an adversary that can grind
/// epochs. A VRF-based draw would be needed for that.
#[derive(Clone, Debug)]
pub struct RotatingValidatorManager {
    validators: ValidatorSet,
}

impl RotatingValidatorManager {
    pub fn new(validators: ValidatorSet) -> Self {
        Self { validators }
    }
}

impl ValidatorSelector for RotatingValidatorManager {
    fn proposer_for_epoch(&self, epoch: u64) -> ConsensusResult<Validator> {
        let validators = self.validators.validators();
        if validators.is_empty() {
            return Err(ConsensusError::NoValidators);
        }
        let total = validators
            .iter()
            .fold(0u128, |acc, v| acc.saturating_add(v.stake));
        if total == 0 {
            return Err(ConsensusError::ZeroStake);
        }

        let mut rng = StdRng::seed_from_u64(epoch);
        let target = rng.gen_range(0..total);

        let mut cumulative = 0u128;
        for validator in validators {
            cumulative = cumulative.saturating_add(validator.stake);
            if target < cumulative {
                return Ok(*validator);
            }
        }
        // Only reachable if the stake sum saturated.
        validators.last().copied().ok_or(ConsensusError::NoValidators)
    }

    fn validator_set_for_epoch(&self, _epoch: u64) -> ValidatorSet {
        self.validators.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn set(stakes: &[u128]) -> ValidatorSet {
        ValidatorSet::from_validators(
            stakes
                .iter()
                .enumerate()
                .map(|(i, s)| Validator::new([i as u8 + 1; 20], *s)),
        )
    }

    #[test]
    fn test_fixed_manager_picks_first() {
        let manager = FixedValidatorManager::new(set(&[10, 20, 30]));
        for epoch in 0..5 {
            assert_eq!(manager.proposer_for_epoch(epoch).unwrap().address, [1; 20]);
        }
        assert_eq!(manager.validator_set_for_epoch(3).size(), 3);
    }

    #[test]
    fn test_fixed_manager_empty_set() {
        let manager = FixedValidatorManager::new(ValidatorSet::new());
        assert!(matches!(
            manager.proposer_for_epoch(0),
            Err(ConsensusError::NoValidators)
        ));
    }

    #[test]
    fn test_rotating_manager_is_deterministic() {
        let a = RotatingValidatorManager::new(set(&[100, 100, 100, 100]));
        let b = RotatingValidatorManager::new(set(&[100, 100, 100, 100]));
        for epoch in 0..50 {
            assert_eq!(
                a.proposer_for_epoch(epoch).unwrap(),
                b.proposer_for_epoch(epoch).unwrap()
            );
        }
    }

    #[test]
    fn test_rotating_manager_weights_by_stake() {
        let manager = RotatingValidatorManager::new(set(&[1, 1, 98]));
        let mut counts: HashMap<[u8; 20], usize> = HashMap::new();
        for epoch in 0..1_000 {
            *counts
                .entry(manager.proposer_for_epoch(epoch).unwrap().address)
                .or_default() += 1;
        }
        assert!(counts[&[3; 20]] > 900);
    }

    #[test]
    fn test_rotating_manager_rotates() {
        let manager = RotatingValidatorManager::new(set(&[100, 100, 100, 100]));
        let distinct: std::collections::HashSet<_> = (0..100)
            .map(|e| manager.proposer_for_epoch(e).unwrap().address)
            .collect();
        assert_eq!(distinct.len(), 4);
    }

    #[test]
    fn test_rotating_manager_zero_stake() {
        let manager = RotatingValidatorManager::new(set(&[0, 0]));
        assert!(matches!(
            manager.proposer_for_epoch(1),
            Err(ConsensusError::ZeroStake)
        ));
        let empty = RotatingValidatorManager::new(ValidatorSet::new());
        assert!(matches!(
            empty.proposer_for_epoch(1),
            Err(ConsensusError::NoValidators)
        ));
    }
}

//! # Stakes
//!
//! Guardians and elite edge nodes are backed by stakes deposited from one or
//! more source accounts. Withdrawing a stake starts a locking period; only when
//! it has elapsed can the stake be returned to its source.

use crate::errors::StakeError;
use crate::primitives::Address;
use serde::{Deserialize, Serialize};

/// Blocks a withdrawn stake stays locked before it can be returned.
pub const RETURN_LOCKING_PERIOD: u64 = 28_800;

/// Return height of a stake that has not been withdrawn.
pub const INVALID_RETURN_HEIGHT: u64 = u64::MAX;

/// 10^18 base units per token.
pub const WEI_PER_TOKEN: u128 = 1_000_000_000_000_000_000;

/// A single deposit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stake {
    pub source: Address,
    pub amount: u128,
    pub withdrawn: bool,
    pub return_height: u64,
}

impl Stake {
    pub fn new(source: Address, amount: u128) -> Self {
        Self {
            source,
            amount,
            withdrawn: false,
            return_height: INVALID_RETURN_HEIGHT,
        }
    }
}

/// An account backed by stakes from several sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeHolder {
    pub holder: Address,
    pub stakes: Vec<Stake>,
}

impl StakeHolder {
    pub fn new(holder: Address, stakes: Vec<Stake>) -> Self {
        Self { holder, stakes }
    }

    /// Sum of stakes that are not withdrawn.
    pub fn total_stake(&self) -> u128 {
        self.stakes
            .iter()
            .filter(|s| !s.withdrawn)
            .fold(0u128, |acc, s| acc.saturating_add(s.amount))
    }

    pub fn has_active_stake(&self) -> bool {
        self.stakes.iter().any(|s| !s.withdrawn)
    }

    /// Add to the source's stake, or open a new one.
    pub fn deposit_stake(&mut self, source: Address, amount: u128) -> Result<(), StakeError> {
        match self.stakes.iter_mut().find(|s| s.source == source) {
            Some(stake) if stake.withdrawn => Err(StakeError::SourceWithdrawn(source)),
            Some(stake) => {
                stake.amount = stake
                    .amount
                    .checked_add(amount)
                    .ok_or(StakeError::Overflow)?;
                Ok(())
            }
            None => {
                self.stakes.push(Stake::new(source, amount));
                Ok(())
            }
        }
    }

    /// Start the locking period for the source's stake.
    pub fn withdraw_stake(
        &mut self,
        source: Address,
        current_height: u64,
    ) -> Result<&Stake, StakeError> {
        let stake = self
            .stakes
            .iter_mut()
            .find(|s| s.source == source)
            .ok_or(StakeError::NoMatchingSource(source))?;
        if stake.withdrawn {
            return Err(StakeError::AlreadyWithdrawn(source));
        }
        stake.withdrawn = true;
        stake.return_height = current_height.saturating_add(RETURN_LOCKING_PERIOD);
        Ok(stake)
    }

    /// Remove and return the source's stake once its locking period is over.
    pub fn return_stake(
        &mut self,
        source: Address,
        current_height: u64,
    ) -> Result<Stake, StakeError> {
        let index = self
            .stakes
            .iter()
            .position(|s| s.source == source)
            .ok_or(StakeError::NoMatchingSource(source))?;
        let stake = &self.stakes[index];
        if !stake.withdrawn {
            return Err(StakeError::NotWithdrawn(source));
        }
        if stake.return_height > current_height {
            return Err(StakeError::NotYetReturnable {
                return_height: stake.return_height,
                height: current_height,
            });
        }
        Ok(self.stakes.remove(index))
    }

    /// Remove and return every stake whose locking period is over.
    pub fn return_stakes(&mut self, current_height: u64) -> Vec<Stake> {
        let (returned, kept): (Vec<Stake>, Vec<Stake>) = self
            .stakes
            .drain(..)
            .partition(|s| s.withdrawn && s.return_height <= current_height);
        self.stakes = kept;
        returned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRC_A: Address = [0xA; 20];
    const SRC_B: Address = [0xB; 20];

    fn holder() -> StakeHolder {
        StakeHolder::new([1u8; 20], vec![Stake::new(SRC_A, 100)])
    }

    #[test]
    fn test_deposit_adds_to_existing_source() {
        let mut h = holder();
        h.deposit_stake(SRC_A, 50).unwrap();
        h.deposit_stake(SRC_B, 25).unwrap();

        assert_eq!(h.stakes.len(), 2);
        assert_eq!(h.total_stake(), 175);
    }

    #[test]
    fn test_deposit_rejected_while_locked() {
        let mut h = holder();
        h.withdraw_stake(SRC_A, 10).unwrap();

        assert_eq!(h.deposit_stake(SRC_A, 1), Err(StakeError::SourceWithdrawn(SRC_A)));
        assert_eq!(h.total_stake(), 0);
    }

    #[test]
    fn test_withdraw_sets_return_height() {
        let mut h = holder();
        let stake = h.withdraw_stake(SRC_A, 1_000).unwrap();
        assert!(stake.withdrawn);
        assert_eq!(stake.return_height, 1_000 + RETURN_LOCKING_PERIOD);

        assert_eq!(
            h.withdraw_stake(SRC_A, 1_001).unwrap_err(),
            StakeError::AlreadyWithdrawn(SRC_A)
        );
        assert_eq!(
            h.withdraw_stake(SRC_B, 1_001).unwrap_err(),
            StakeError::NoMatchingSource(SRC_B)
        );
    }

    #[test]
    fn test_return_only_after_locking_period() {
        let mut h = holder();
        assert_eq!(h.return_stake(SRC_A, 5).unwrap_err(), StakeError::NotWithdrawn(SRC_A));

        h.withdraw_stake(SRC_A, 0).unwrap();
        assert!(matches!(
            h.return_stake(SRC_A, RETURN_LOCKING_PERIOD - 1),
            Err(StakeError::NotYetReturnable { .. })
        ));

        let returned = h.return_stake(SRC_A, RETURN_LOCKING_PERIOD).unwrap();
        assert_eq!(returned.amount, 100);
        assert!(h.stakes.is_empty());
    }

    #[test]
    fn test_return_stakes_partitions() {
        let mut h = holder();
        h.deposit_stake(SRC_B, 30).unwrap();
        h.withdraw_stake(SRC_A, 0).unwrap();

        assert!(h.return_stakes(RETURN_LOCKING_PERIOD - 1).is_empty());
        let returned = h.return_stakes(RETURN_LOCKING_PERIOD);
        assert_eq!(returned.len(), 1);
        assert_eq!(returned[0].source, SRC_A);
        assert_eq!(h.stakes.len(), 1);
        assert_eq!(h.total_stake(), 30);
    }
}

//! # Committee Candidate Pools
//!
//! Guardians and elite edge nodes are registered in candidate pools: stake
//! holders with a BLS public key, sorted by holder address. Only members with
//! an active (non-withdrawn) stake take part in a committee vote, and the
//! multiplicity vector of an aggregated vote is indexed by position in
//! `with_stake()`.
//!
//! The two pools share one implementation; `CommitteeKind` supplies the
//! deposit rules that differ.

use crate::block::ForkSchedule;
use crate::codec::canonical_hash;
use crate::errors::StakeError;
use crate::primitives::{Address, Hash};
use crate::stake::{Stake, StakeHolder, WEI_PER_TOKEN};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};
use shared_crypto::BlsPublicKeyBytes;
use std::fmt::Debug;
use std::marker::PhantomData;

/// Minimum guardian deposit.
pub const MIN_GUARDIAN_STAKE_DEPOSIT: u128 = 10_000 * WEI_PER_TOKEN;

/// Minimum guardian deposit from `ForkSchedule::lower_guardian_stake` on.
pub const MIN_GUARDIAN_STAKE_DEPOSIT_LOWERED: u128 = 1_000 * WEI_PER_TOKEN;

/// Minimum elite-edge-node deposit.
pub const MIN_ELITE_EDGE_NODE_STAKE_DEPOSIT: u128 = 10_000 * WEI_PER_TOKEN;

/// Maximum elite-edge-node stake, per deposit and cumulative.
pub const MAX_ELITE_EDGE_NODE_STAKE_DEPOSIT: u128 = 500_000 * WEI_PER_TOKEN;

/// Deposit rules of a committee.
pub trait CommitteeKind:
    Debug + Clone + Copy + PartialEq + Eq + Default + Send + Sync + 'static
{
    const NAME: &'static str;

    /// `(minimum per deposit, maximum cumulative stake)` at `height`.
    fn deposit_bounds(height: u64, forks: &ForkSchedule) -> (u128, Option<u128>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GuardianCommittee;

impl CommitteeKind for GuardianCommittee {
    const NAME: &'static str = "guardian";

    fn deposit_bounds(height: u64, forks: &ForkSchedule) -> (u128, Option<u128>) {
        if height >= forks.lower_guardian_stake {
            (MIN_GUARDIAN_STAKE_DEPOSIT_LOWERED, None)
        } else {
            (MIN_GUARDIAN_STAKE_DEPOSIT, None)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EliteEdgeNodeCommittee;

impl CommitteeKind for EliteEdgeNodeCommittee {
    const NAME: &'static str = "elite-edge-node";

    fn deposit_bounds(_height: u64, _forks: &ForkSchedule) -> (u128, Option<u128>) {
        (
            MIN_ELITE_EDGE_NODE_STAKE_DEPOSIT,
            Some(MAX_ELITE_EDGE_NODE_STAKE_DEPOSIT),
        )
    }
}

/// A registered candidate.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitteeMember {
    pub holder: StakeHolder,
    #[serde_as(as = "Bytes")]
    pub pubkey: BlsPublicKeyBytes,
}

impl CommitteeMember {
    pub fn address(&self) -> Address {
        self.holder.holder
    }
}

/// Candidates sorted by holder address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct CandidatePool<K: CommitteeKind> {
    members: Vec<CommitteeMember>,
    #[serde(skip)]
    _kind: PhantomData<K>,
}

pub type GuardianCandidatePool = CandidatePool<GuardianCommittee>;
pub type EliteEdgeNodePool = CandidatePool<EliteEdgeNodeCommittee>;

impl<K: CommitteeKind> Default for CandidatePool<K> {
    fn default() -> Self {
        Self {
            members: Vec::new(),
            _kind: PhantomData,
        }
    }
}

impl<K: CommitteeKind> CandidatePool<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_members(members: impl IntoIterator<Item = CommitteeMember>) -> Self {
        let mut pool = Self::new();
        for member in members {
            pool.add(member);
        }
        pool
    }

    fn search(&self, holder: &Address) -> Result<usize, usize> {
        self.members.binary_search_by(|m| m.holder.holder.cmp(holder))
    }

    /// Insert in holder order. Returns false if the holder is already present.
    pub fn add(&mut self, member: CommitteeMember) -> bool {
        match self.search(&member.holder.holder) {
            Ok(_) => false,
            Err(i) => {
                self.members.insert(i, member);
                true
            }
        }
    }

    pub fn remove(&mut self, holder: &Address) -> Option<CommitteeMember> {
        self.search(holder).ok().map(|i| self.members.remove(i))
    }

    pub fn contains(&self, holder: &Address) -> bool {
        self.search(holder).is_ok()
    }

    pub fn get(&self, holder: &Address) -> Option<&CommitteeMember> {
        self.search(holder).ok().map(|i| &self.members[i])
    }

    pub fn members(&self) -> &[CommitteeMember] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Members with at least one active stake, in holder order.
    pub fn with_stake(&self) -> Self {
        Self {
            members: self
                .members
                .iter()
                .filter(|m| m.holder.has_active_stake())
                .cloned()
                .collect(),
            _kind: PhantomData,
        }
    }

    /// Position of the member registered with `pubkey`.
    pub fn index(&self, pubkey: &BlsPublicKeyBytes) -> Option<usize> {
        self.members.iter().position(|m| &m.pubkey == pubkey)
    }

    /// Position of `holder`.
    pub fn index_of_holder(&self, holder: &Address) -> Option<usize> {
        self.search(holder).ok()
    }

    pub fn pubkeys(&self) -> Vec<BlsPublicKeyBytes> {
        self.members.iter().map(|m| m.pubkey).collect()
    }

    /// Active stake of each member, in pool order.
    pub fn stakes(&self) -> Vec<u128> {
        self.members.iter().map(|m| m.holder.total_stake()).collect()
    }

    /// Keccak-256 of the canonical encoding.
    pub fn hash(&self) -> Hash {
        canonical_hash(&self.members)
    }

    /// Deposit `amount` from `source` on behalf of `holder`, registering the
    /// holder with `pubkey` if it is new.
    pub fn deposit_stake(
        &mut self,
        source: Address,
        holder: Address,
        amount: u128,
        pubkey: BlsPublicKeyBytes,
        height: u64,
        forks: &ForkSchedule,
    ) -> Result<(), StakeError> {
        let (minimum, maximum) = K::deposit_bounds(height, forks);
        if amount < minimum {
            return Err(StakeError::InsufficientDeposit { amount, minimum });
        }

        match self.search(&holder) {
            Ok(i) => {
                let member = &mut self.members[i];
                if member.pubkey != pubkey {
                    return Err(StakeError::PubkeyMismatch(holder));
                }
                if let Some(maximum) = maximum {
                    let total = member
                        .holder
                        .total_stake()
                        .checked_add(amount)
                        .ok_or(StakeError::Overflow)?;
                    if total > maximum {
                        return Err(StakeError::ExcessiveDeposit { total, maximum });
                    }
                }
                member.holder.deposit_stake(source, amount)
            }
            Err(i) => {
                if let Some(maximum) = maximum {
                    if amount > maximum {
                        return Err(StakeError::ExcessiveDeposit {
                            total: amount,
                            maximum,
                        });
                    }
                }
                let member = CommitteeMember {
                    holder: StakeHolder::new(holder, vec![Stake::new(source, amount)]),
                    pubkey,
                };
                self.members.insert(i, member);
                Ok(())
            }
        }
    }

    /// Start the locking period of `source`'s stake in `holder`.
    pub fn withdraw_stake(
        &mut self,
        source: Address,
        holder: Address,
        current_height: u64,
    ) -> Result<(), StakeError> {
        let i = self
            .search(&holder)
            .map_err(|_| StakeError::UnknownHolder(holder))?;
        self.members[i]
            .holder
            .withdraw_stake(source, current_height)
            .map(|_| ())
    }

    /// Return every stake whose locking period is over. Members left without
    /// stakes are removed.
    pub fn return_stakes(&mut self, current_height: u64) -> Vec<(Address, Stake)> {
        let mut returned = Vec::new();
        for i in (0..self.members.len()).rev() {
            let holder = self.members[i].holder.holder;
            for stake in self.members[i].holder.return_stakes(current_height) {
                returned.push((holder, stake));
            }
            if self.members[i].holder.stakes.is_empty() {
                self.members.remove(i);
            }
        }
        returned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stake::RETURN_LOCKING_PERIOD;

    fn member(id: u8, amount: u128) -> CommitteeMember {
        CommitteeMember {
            holder: StakeHolder::new([id; 20], vec![Stake::new([0xAA; 20], amount)]),
            pubkey: [id; 48],
        }
    }

    #[test]
    fn test_pool_sorted_and_unique() {
        let mut pool = GuardianCandidatePool::new();
        assert!(pool.add(member(3, 1)));
        assert!(pool.add(member(1, 1)));
        assert!(pool.add(member(2, 1)));
        assert!(!pool.add(member(2, 5)));

        let order: Vec<u8> = pool.members().iter().map(|m| m.address()[0]).collect();
        assert_eq!(order, vec![1, 2, 3]);
        assert_eq!(pool.index_of_holder(&[2; 20]), Some(1));
        assert_eq!(pool.index(&[3; 48]), Some(2));

        assert!(pool.remove(&[2; 20]).is_some());
        assert!(!pool.contains(&[2; 20]));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_with_stake_skips_withdrawn_members() {
        let mut pool = GuardianCandidatePool::from_members([member(1, 5), member(2, 5)]);
        pool.withdraw_stake([0xAA; 20], [1; 20], 10).unwrap();

        let active = pool.with_stake();
        assert_eq!(active.len(), 1);
        assert_eq!(active.members()[0].address(), [2; 20]);
    }

    #[test]
    fn test_hash_changes_with_membership() {
        let a = GuardianCandidatePool::from_members([member(1, 5)]);
        let b = GuardianCandidatePool::from_members([member(1, 5), member(2, 5)]);
        assert_eq!(a.hash(), a.clone().hash());
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn test_guardian_minimum_deposit_lowers_at_fork() {
        let forks = ForkSchedule {
            lower_guardian_stake: 100,
            ..ForkSchedule::default()
        };
        let mut pool = GuardianCandidatePool::new();

        let small = MIN_GUARDIAN_STAKE_DEPOSIT_LOWERED;
        assert!(matches!(
            pool.deposit_stake([0xAA; 20], [1; 20], small, [1; 48], 99, &forks),
            Err(StakeError::InsufficientDeposit { .. })
        ));
        pool.deposit_stake([0xAA; 20], [1; 20], small, [1; 48], 100, &forks)
            .unwrap();
        assert!(pool.contains(&[1; 20]));
    }

    #[test]
    fn test_elite_edge_node_cumulative_cap() {
        let forks = ForkSchedule::default();
        let mut pool = EliteEdgeNodePool::new();

        pool.deposit_stake([0xAA; 20], [1; 20], 400_000 * WEI_PER_TOKEN, [1; 48], 1, &forks)
            .unwrap();
        assert!(matches!(
            pool.deposit_stake([0xAB; 20], [1; 20], 200_000 * WEI_PER_TOKEN, [1; 48], 1, &forks),
            Err(StakeError::ExcessiveDeposit { .. })
        ));
        pool.deposit_stake([0xAB; 20], [1; 20], 100_000 * WEI_PER_TOKEN, [1; 48], 1, &forks)
            .unwrap();
        assert_eq!(
            pool.get(&[1; 20]).map(|m| m.holder.total_stake()),
            Some(MAX_ELITE_EDGE_NODE_STAKE_DEPOSIT)
        );
    }

    #[test]
    fn test_deposit_with_other_pubkey_rejected() {
        let forks = ForkSchedule::default();
        let mut pool = GuardianCandidatePool::new();
        pool.deposit_stake([0xAA; 20], [1; 20], MIN_GUARDIAN_STAKE_DEPOSIT, [1; 48], 1, &forks)
            .unwrap();
        assert_eq!(
            pool.deposit_stake([0xAA; 20], [1; 20], MIN_GUARDIAN_STAKE_DEPOSIT, [2; 48], 1, &forks),
            Err(StakeError::PubkeyMismatch([1; 20]))
        );
    }

    #[test]
    fn test_return_stakes_removes_empty_members() {
        let mut pool = GuardianCandidatePool::from_members([member(1, 5), member(2, 5)]);
        pool.withdraw_stake([0xAA; 20], [1; 20], 0).unwrap();

        let returned = pool.return_stakes(RETURN_LOCKING_PERIOD);
        assert_eq!(returned.len(), 1);
        assert_eq!(returned[0].0, [1; 20]);
        assert!(!pool.contains(&[1; 20]));
        assert!(pool.contains(&[2; 20]));
    }
}

//! First-seen filter for single elite-edge-node votes.

use shared_crypto::keccak256;
use shared_types::{address_hex, Address, Hash};
use std::collections::{HashSet, VecDeque};
use tokio::time::{Duration, Instant};

/// FIFO of vote keys with their creation time. Entries expire after `ttl`,
/// and the oldest entry is evicted once `max_votes` are held.
#[derive(Debug)]
pub struct VoteBookkeeper {
    entries: VecDeque<(Hash, Instant)>,
    seen: HashSet<Hash>,
    max_votes: usize,
    ttl: Duration,
}

impl VoteBookkeeper {
    pub fn new(max_votes: usize, ttl: Duration) -> Self {
        Self {
            entries: VecDeque::new(),
            seen: HashSet::new(),
            max_votes: max_votes.max(1),
            ttl,
        }
    }

    /// Remember the vote of `address` for `block`; false if already seen.
    pub fn record(&mut self, address: &Address, block: &Hash) -> bool {
        let now = Instant::now();
        self.evict_outdated(now);

        let key = vote_key(address, block);
        if self.seen.contains(&key) {
            return false;
        }
        if self.entries.len() >= self.max_votes {
            if let Some((oldest, _)) = self.entries.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.entries.push_back((key, now));
        self.seen.insert(key);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_outdated(&mut self, now: Instant) {
        while let Some((key, created)) = self.entries.front() {
            if now.duration_since(*created) < self.ttl {
                break;
            }
            self.seen.remove(key);
            self.entries.pop_front();
        }
    }
}

fn vote_key(address: &Address, block: &Hash) -> Hash {
    keccak256(format!("{}:0x{}", address_hex(address), hex::encode(block)).as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_record_deduplicates() {
        let mut book = VoteBookkeeper::new(10, Duration::from_secs(60));
        assert!(book.record(&[1; 20], &[9; 32]));
        assert!(!book.record(&[1; 20], &[9; 32]));
        assert!(book.record(&[2; 20], &[9; 32]));
        assert!(book.record(&[1; 20], &[8; 32]));
        assert_eq!(book.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire() {
        let mut book = VoteBookkeeper::new(10, Duration::from_secs(300));
        assert!(book.record(&[1; 20], &[9; 32]));

        tokio::time::advance(Duration::from_secs(299)).await;
        assert!(!book.record(&[1; 20], &[9; 32]));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(book.record(&[1; 20], &[9; 32]));
        assert_eq!(book.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_evicts_oldest() {
        let mut book = VoteBookkeeper::new(2, Duration::from_secs(300));
        assert!(book.record(&[1; 20], &[9; 32]));
        assert!(book.record(&[2; 20], &[9; 32]));
        assert!(book.record(&[3; 20], &[9; 32]));
        assert_eq!(book.len(), 2);

        // The first vote was evicted and is accepted again.
        assert!(book.record(&[1; 20], &[9; 32]));
        assert!(!book.record(&[3; 20], &[9; 32]));
    }
}

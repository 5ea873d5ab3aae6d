//! # QC-08 Consensus Benchmarks
//!
//! Hot paths of vote handling:
//! - Weighted BLS key aggregation: double-and-add vs repeated addition
//! - Quorum check: O(n) over a vote set of n validators
//! - Proposer selection: one seeded draw per epoch

use criterion::{black_box, BenchmarkId, Criterion, Throughput};
use qc_08_consensus::{RotatingValidatorManager, ValidatorSelector};
use rand::Rng;
use shared_crypto::bls::{naive_weighted_aggregate_public_key, weighted_aggregate_public_key};
use shared_crypto::{BlsKeyPair, BlsPublicKeyBytes};
use shared_types::{max_multiply, Validator, ValidatorSet, Vote, VoteSet, MAX_ROUND};
use std::time::Duration;

fn committee_keys(n: usize) -> Vec<BlsPublicKeyBytes> {
    (0..n)
        .map(|_| {
            BlsKeyPair::generate()
                .unwrap_or_else(|e| panic!("bls keygen: {e}"))
                .public_key()
        })
        .collect()
}

fn validators(n: usize) -> ValidatorSet {
    ValidatorSet::from_validators((0..n).map(|i| {
        let mut address = [0u8; 20];
        address[..8].copy_from_slice(&(i as u64).to_be_bytes());
        Validator::new(address, 100)
    }))
}

/// Aggregated vote multiplicities grow with the gossip round; the weighted
/// aggregation must stay flat while the naive one grows linearly.
pub fn bench_weighted_aggregation(c: &mut Criterion) {
    let mut group = c.benchmark_group("qc-08/aggregation");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(20);

    let keys = committee_keys(32);
    let mut rng = rand::thread_rng();

    for round in [1u32, 3, 5] {
        let cap = max_multiply(round).min(1 << 10);
        let multiplies: Vec<u32> = keys.iter().map(|_| rng.gen_range(1..=cap)).collect();

        group.throughput(Throughput::Elements(keys.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("weighted", round),
            &multiplies,
            |b, multiplies| b.iter(|| black_box(weighted_aggregate_public_key(&keys, multiplies))),
        );
        group.bench_with_input(
            BenchmarkId::new("naive", round),
            &multiplies,
            |b, multiplies| {
                b.iter(|| black_box(naive_weighted_aggregate_public_key(&keys, multiplies)))
            },
        );
    }

    group.bench_function("weighted_max_round", |b| {
        let multiplies = vec![max_multiply(MAX_ROUND); keys.len()];
        b.iter(|| black_box(weighted_aggregate_public_key(&keys, &multiplies)))
    });

    group.finish();
}

pub fn bench_quorum_check(c: &mut Criterion) {
    let mut group = c.benchmark_group("qc-08/quorum");

    for count in [10usize, 100, 1000] {
        let set = validators(count);
        let mut votes = VoteSet::new();
        for validator in set.validators().iter().take(count * 2 / 3 + 1) {
            votes.add_vote(Vote::new([1; 32], 1, 1, validator.address));
        }

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(
            BenchmarkId::new("has_majority", count),
            &(set, votes),
            |b, (set, votes)| b.iter(|| black_box(set.has_majority(votes))),
        );
    }

    group.finish();
}

pub fn bench_proposer_selection(c: &mut Criterion) {
    let mut group = c.benchmark_group("qc-08/proposer");
    let selector = RotatingValidatorManager::new(validators(1000));

    group.bench_function("proposer_for_epoch_1000_validators", |b| {
        let mut epoch = 0u64;
        b.iter(|| {
            epoch += 1;
            black_box(selector.proposer_for_epoch(epoch))
        })
    });

    group.finish();
}

pub fn register_benchmarks(c: &mut Criterion) {
    bench_weighted_aggregation(c);
    bench_quorum_check(c);
    bench_proposer_selection(c);
}

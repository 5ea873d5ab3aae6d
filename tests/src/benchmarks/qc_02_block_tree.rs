//! # QC-02 Block Tree Benchmarks
//!
//! - Insert: one block under a known parent
//! - Tip search: deepest descendant of the root over long and forked chains
//! - Finalization: walking ancestors of a long unfinalized chain

use criterion::{black_box, BenchmarkId, Criterion, Throughput};
use qc_02_block_tree::test_utils::{extend_chain, genesis, new_tree, BlockBuilder};
use std::time::Duration;

pub fn bench_add_block(c: &mut Criterion) {
    let mut group = c.benchmark_group("qc-02/add_block");
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("child_of_root", |b| {
        let (_, tree) = new_tree();
        let root = genesis();
        let mut salt = 0u64;
        b.iter(|| {
            salt += 1;
            let mut state = [0u8; 32];
            state[..8].copy_from_slice(&salt.to_be_bytes());
            let block = BlockBuilder::child_of(&root).state_hash(state).build();
            black_box(tree.add_block(block))
        })
    });

    group.finish();
}

pub fn bench_deepest_descendant(c: &mut Criterion) {
    let mut group = c.benchmark_group("qc-02/deepest_descendant");

    for length in [10usize, 100, 1000] {
        let (_, tree) = new_tree();
        let root = genesis();
        extend_chain(&tree, &root, length, 1);
        extend_chain(&tree, &root, length / 2, 2);

        group.throughput(Throughput::Elements(length as u64));
        group.bench_with_input(BenchmarkId::new("two_forks", length), &length, |b, _| {
            b.iter(|| black_box(tree.deepest_descendant(&root.hash(), usize::MAX)))
        });
    }

    group.finish();
}

pub fn bench_finalize_ancestors(c: &mut Criterion) {
    let mut group = c.benchmark_group("qc-02/finalize");
    group.sample_size(20);

    for length in [10usize, 100] {
        group.throughput(Throughput::Elements(length as u64));
        group.bench_with_input(BenchmarkId::new("chain", length), &length, |b, &len| {
            b.iter_with_setup(
                || {
                    let (store, tree) = new_tree();
                    let chain = extend_chain(&tree, &genesis(), len, 1);
                    (store, tree, chain)
                },
                |(_store, tree, chain)| {
                    let last = chain.last().map(|b| b.hash()).unwrap_or_default();
                    black_box(tree.finalize_ancestors(&last))
                },
            )
        });
    }

    group.finish();
}

pub fn register_benchmarks(c: &mut Criterion) {
    bench_add_block(c);
    bench_deepest_descendant(c);
    bench_finalize_ancestors(c);
}

//! # Quantum-Chain Subsystem Benchmarks
//!
//! | Subsystem | Hot path |
//! |-----------|----------|
//! | qc-02 Block Tree | insert, tip search, ancestor finalization |
//! | qc-08 Consensus | weighted BLS aggregation, quorum check, proposer draw |

use criterion::{criterion_group, criterion_main, Criterion};
use qc_tests::benchmarks::{qc_02_block_tree, qc_08_consensus};

fn bench_block_tree(c: &mut Criterion) {
    qc_02_block_tree::register_benchmarks(c);
}

fn bench_consensus(c: &mut Criterion) {
    qc_08_consensus::register_benchmarks(c);
}

criterion_group!(benches, bench_block_tree, bench_consensus);

criterion_main!(benches);

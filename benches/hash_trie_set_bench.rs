//! Benchmark for HashTrieSet vs standard HashSet.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use hashtrie::HashTrieSet;
use std::collections::HashSet;
use std::hint::black_box;

const SIZES: [u32; 3] = [1_000, 10_000, 100_000];

// =============================================================================
// added Benchmark
// =============================================================================

fn benchmark_added(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("added");

    for size in SIZES {
        group.bench_with_input(BenchmarkId::new("HashTrieSet", size), &size, |bencher, &size| {
            bencher.iter(|| {
                let mut set = HashTrieSet::new();
                for element in 0..size {
                    set = set.added(black_box(element));
                }
                black_box(set)
            });
        });

        group.bench_with_input(BenchmarkId::new("HashSet", size), &size, |bencher, &size| {
            bencher.iter(|| {
                let mut set = HashSet::new();
                for element in 0..size {
                    set.insert(black_box(element));
                }
                black_box(set)
            });
        });
    }

    group.finish();
}

// =============================================================================
// contains Benchmark
// =============================================================================

fn benchmark_contains(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("contains");

    for size in SIZES {
        let set: HashTrieSet<u32> = (0..size).collect();
        group.bench_with_input(BenchmarkId::new("HashTrieSet", size), &size, |bencher, &size| {
            bencher.iter(|| {
                for element in 0..size * 2 {
                    black_box(set.contains(black_box(&element)));
                }
            });
        });
    }

    group.finish();
}

// =============================================================================
// Set Algebra Benchmark
// =============================================================================

fn benchmark_algebra(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("algebra");

    for size in SIZES {
        let left: HashTrieSet<u32> = (0..size).collect();
        let right: HashTrieSet<u32> = (size / 2..size + size / 2).collect();

        group.bench_with_input(BenchmarkId::new("union", size), &size, |bencher, _| {
            bencher.iter(|| black_box(left.union(&right)));
        });
        group.bench_with_input(BenchmarkId::new("intersection", size), &size, |bencher, _| {
            bencher.iter(|| black_box(left.intersection(&right)));
        });
        group.bench_with_input(BenchmarkId::new("difference", size), &size, |bencher, _| {
            bencher.iter(|| black_box(left.difference(&right)));
        });
    }

    group.finish();
}

// =============================================================================
// Criterion Group and Main
// =============================================================================

criterion_group!(benches, benchmark_added, benchmark_contains, benchmark_algebra);

criterion_main!(benches);

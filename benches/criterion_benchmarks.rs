use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use hdelta::{diff, diff_with_options, patch, DiffOptions};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::fs;
use std::path::Path;

fn gen_data(size: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = vec![0u8; size];
    rng.fill_bytes(&mut out);
    out
}

fn mutate(base: &[u8], stride: usize) -> Vec<u8> {
    let mut out = base.to_vec();
    for i in (0..out.len()).step_by(stride.max(1)) {
        out[i] = out[i].wrapping_add(1);
    }
    out
}

fn diff_at_level(old: &[u8], new: &[u8], level: u32) -> Vec<u8> {
    diff_with_options(
        old,
        new,
        &DiffOptions {
            level,
            ..Default::default()
        },
    )
    .unwrap()
}

fn write_ratio_snapshot() {
    let old = gen_data(2 * 1024 * 1024, 123);
    let new = mutate(&old, 4096);
    let mut csv = String::from("level,delta_bytes,new_bytes,ratio\n");
    for level in 1u32..=9 {
        let delta = diff_at_level(&old, &new, level);
        let ratio = delta.len() as f64 / new.len() as f64;
        csv.push_str(&format!("{level},{},{},{}\n", delta.len(), new.len(), ratio));
    }
    let out_dir = Path::new("target/criterion/custom_reports");
    let _ = fs::create_dir_all(out_dir);
    let _ = fs::write(out_dir.join("ratio_snapshot.csv"), csv);
}

fn bench_diff_speed(c: &mut Criterion) {
    let mut g = c.benchmark_group("diff_speed_mb_s");
    for size in [64 * 1024usize, 1024 * 1024, 8 * 1024 * 1024] {
        let old = gen_data(size, 1);
        let new = mutate(&old, 1024);
        g.throughput(Throughput::Bytes(size as u64));
        g.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let delta = diff(black_box(&old), black_box(&new)).unwrap();
                black_box(delta);
            });
        });
    }
    g.finish();
}

fn bench_patch_speed(c: &mut Criterion) {
    let mut g = c.benchmark_group("patch_speed_vs_delta");
    for size in [64 * 1024usize, 1024 * 1024, 8 * 1024 * 1024] {
        let old = gen_data(size, 2);
        let new = mutate(&old, 2048);
        let delta = diff(&old, &new).unwrap();
        g.throughput(Throughput::Bytes(delta.len() as u64));
        g.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let out = patch(black_box(&old), black_box(&delta)).unwrap();
                black_box(out);
            });
        });
    }
    g.finish();
}

fn bench_ratio_vs_level(c: &mut Criterion) {
    write_ratio_snapshot();
    let mut g = c.benchmark_group("delta_ratio_vs_level");
    let old = gen_data(2 * 1024 * 1024, 3);
    let new = mutate(&old, 4096);
    for level in [1u32, 3, 6, 9] {
        g.bench_with_input(BenchmarkId::from_parameter(level), &level, |b, level| {
            b.iter(|| {
                let delta = diff_at_level(&old, &new, *level);
                let ratio = delta.len() as f64 / new.len() as f64;
                black_box(ratio);
            });
        });
    }
    g.finish();
}

fn bench_identical_input(c: &mut Criterion) {
    let mut g = c.benchmark_group("diff_identical_input");
    for size in [1024 * 1024usize, 8 * 1024 * 1024] {
        let old = gen_data(size, 4);
        g.throughput(Throughput::Bytes(size as u64));
        g.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let delta = diff(black_box(&old), black_box(&old)).unwrap();
                black_box(delta);
            });
        });
    }
    g.finish();
}

fn bench_real_world_scenarios(c: &mut Criterion) {
    let mut g = c.benchmark_group("real_world_scenarios");
    let scenarios = [
        ("software_update", 4 * 1024 * 1024usize, 1024usize),
        ("document_versioning", 512 * 1024usize, 256usize),
        ("database_snapshot", 8 * 1024 * 1024usize, 4096usize),
    ];

    for (name, size, stride) in scenarios {
        let old = gen_data(size, size as u64);
        let new = mutate(&old, stride);
        g.throughput(Throughput::Bytes(size as u64));
        g.bench_function(name, |b| {
            b.iter(|| {
                let delta = diff(&old, &new).unwrap();
                let out = patch(&old, &delta).unwrap();
                black_box(out);
            });
        });
    }
    g.finish();
}

criterion_group!(
    benches,
    bench_diff_speed,
    bench_patch_speed,
    bench_ratio_vs_level,
    bench_identical_input,
    bench_real_world_scenarios
);
criterion_main!(benches);

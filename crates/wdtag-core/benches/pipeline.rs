//! Benchmarks for the tagging pipeline stages that run without a model.
//!
//! Run with: cargo bench -p wdtag-core

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{DynamicImage, Rgba, RgbaImage};
use wdtag_core::config::TaggerConfig;
use wdtag_core::math::mcut_threshold;
use wdtag_core::pipeline::Hasher;
use wdtag_core::tagging::{postprocess, prepare, LabelTable};

/// Roughly the size and category mix of a v3 label table.
const LABELS: usize = 10_861;

fn label_table() -> LabelTable {
    LabelTable::from_rows((0..LABELS).map(|i| {
        let category = match i {
            0..=3 => 9,
            i if i % 4 == 0 => 4,
            _ => 0,
        };
        (format!("tag_{i}"), category)
    }))
}

fn scores() -> Vec<f32> {
    (0..LABELS)
        .map(|i| ((i * 7919) % 1000) as f32 / 1000.0)
        .collect()
}

fn benchmark_prepare(c: &mut Criterion) {
    let photo = DynamicImage::new_rgb8(1920, 1080);
    let transparent = DynamicImage::ImageRgba8(RgbaImage::from_pixel(800, 1200, Rgba([10, 20, 30, 128])));

    c.bench_function("prepare_1080p_448", |b| {
        b.iter(|| prepare(black_box(&photo), 448, [255, 255, 255]))
    });
    c.bench_function("prepare_rgba_portrait_448", |b| {
        b.iter(|| prepare(black_box(&transparent), 448, [255, 255, 255]))
    });
}

fn benchmark_postprocess(c: &mut Criterion) {
    let labels = label_table();
    let scores = scores();
    let fixed = TaggerConfig::default();
    let mcut = TaggerConfig {
        general_mcut_enabled: true,
        character_mcut_enabled: true,
        apply_sigmoid: true,
        ..Default::default()
    };

    c.bench_function("postprocess_fixed_thresholds", |b| {
        b.iter(|| postprocess(black_box(&scores), &labels, &fixed, &[]))
    });
    c.bench_function("postprocess_mcut_sigmoid", |b| {
        b.iter(|| postprocess(black_box(&scores), &labels, &mcut, &[]))
    });
}

fn benchmark_mcut(c: &mut Criterion) {
    let scores = scores();
    c.bench_function("mcut_threshold_10k", |b| {
        b.iter(|| mcut_threshold(black_box(&scores)))
    });
}

fn benchmark_content_hash(c: &mut Criterion) {
    let data = vec![0xA5u8; 4 * 1024 * 1024];
    c.bench_function("content_hash_blake3_4mb", |b| {
        b.iter(|| Hasher::content_hash_from_bytes(black_box(&data)))
    });
}

criterion_group!(
    benches,
    benchmark_prepare,
    benchmark_postprocess,
    benchmark_mcut,
    benchmark_content_hash,
);
criterion_main!(benches);

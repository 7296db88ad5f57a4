use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ndarray::Array3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use vqema_core::{ema, QuantizerConfig, VectorQuantizer};

fn inputs(rng: &mut StdRng, b: usize, t: usize, d: usize) -> Array3<f32> {
    Array3::from_shape_fn((b, t, d), |_| rng.gen_range(-1.0..1.0))
}

fn bench_quantize_256x1_k123_d16(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(42);
    let vq = VectorQuantizer::new(QuantizerConfig::default(), &mut rng).unwrap();
    let z = inputs(&mut rng, 256, 1, 16);
    c.bench_function("quantize_256x1_k123_d16", |b| {
        b.iter(|| vq.forward(black_box(z.view())).unwrap())
    });
}

fn bench_quantize_64x64_k512_d64(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(7);
    let vq = VectorQuantizer::new(QuantizerConfig::new(512, 64), &mut rng).unwrap();
    let z = inputs(&mut rng, 64, 64, 64);
    c.bench_function("quantize_64x64_k512_d64", |b| {
        b.iter(|| vq.forward(black_box(z.view())).unwrap())
    });
}

fn bench_ema_update_256x1_k123_d16(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(9);
    let vq = VectorQuantizer::new(QuantizerConfig::default(), &mut rng).unwrap();
    let z = inputs(&mut rng, 256, 1, 16);
    let q = vq.forward(z.view()).unwrap();
    let mut state = vq.state().clone();
    c.bench_function("ema_update_256x1_k123_d16", |b| {
        b.iter(|| ema::update(&mut state, black_box(q.one_hot.view()), black_box(z.view()), 0.99).unwrap())
    });
}

criterion_group!(
    benches,
    bench_quantize_256x1_k123_d16,
    bench_quantize_64x64_k512_d64,
    bench_ema_update_256x1_k123_d16,
);
criterion_main!(benches);

use criterion::{criterion_group, criterion_main, Criterion};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use std::sync::Arc;

use bgv_rns::{
    encrypt_symmetric, Context, Encoder, EvaluationKeys, Evaluator, Operand, Parameters, SecretKey,
};

fn evaluate_benchmark(c: &mut Criterion) {
    let ctx = Context::new(Parameters::secure_128_n4096()).unwrap();
    let mut rng = ChaCha20Rng::seed_from_u64(0);
    let sk = SecretKey::generate(&ctx, &mut rng);
    let keys = EvaluationKeys::generate(&ctx, &sk, &[1], false, &mut rng).unwrap();
    let mut encoder = Encoder::new(ctx.clone());
    let mut evaluator = Evaluator::new(ctx.clone(), Arc::new(keys));

    let values: Vec<u64> = (0..ctx.params().ring_dim() as u64).collect();
    let mut pt = ctx.new_plaintext(ctx.params().max_level(), 1).unwrap();
    encoder.encode(&values, &mut pt).unwrap();
    let ct_a = encrypt_symmetric(&ctx, &sk, &pt, &mut rng).unwrap();
    let ct_b = encrypt_symmetric(&ctx, &sk, &pt, &mut rng).unwrap();

    let mut group = c.benchmark_group("evaluate");

    group.bench_function("encode", |b| {
        b.iter(|| encoder.encode(&values, &mut pt).unwrap());
    });

    group.bench_function("add", |b| {
        b.iter(|| evaluator.add_new(&ct_a, Operand::Ciphertext(&ct_b)).unwrap());
    });

    group.bench_function("mul_relin", |b| {
        b.iter(|| {
            let mut ct = ct_a.clone();
            evaluator.mul_relin(&mut ct, Operand::Ciphertext(&ct_b)).unwrap();
            ct
        });
    });

    group.bench_function("mul_relin_scale_invariant", |b| {
        b.iter(|| evaluator.mul_relin_scale_invariant(&ct_a, &ct_b).unwrap());
    });

    group.bench_function("rescale", |b| {
        b.iter(|| {
            let mut ct = ct_a.clone();
            evaluator.rescale(&mut ct).unwrap();
            ct
        });
    });

    group.bench_function("rotate_columns", |b| {
        b.iter(|| evaluator.rotate_columns(&ct_a, 1).unwrap());
    });

    group.finish();
}

criterion_group!(benches, evaluate_benchmark);
criterion_main!(benches);

//! End-to-end pipeline: encode → encrypt → evaluate → decrypt → decode.

use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use bgv_rns::{
    decrypt, encrypt_symmetric, Ciphertext, Context, Encoder, EvaluationKeys, Evaluator, Operand,
    Parameters, SecretKey,
};

const T: u64 = 65537;

struct Harness {
    ctx: Arc<Context>,
    sk: SecretKey,
    encoder: Encoder,
    evaluator: Evaluator,
    rng: ChaCha20Rng,
}

impl Harness {
    fn new(seed: u64, rotations: &[usize], rows: bool) -> Self {
        let ctx = Context::new(Parameters::insecure_toy()).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let sk = SecretKey::generate(&ctx, &mut rng);
        let keys = EvaluationKeys::generate(&ctx, &sk, rotations, rows, &mut rng).unwrap();
        let encoder = Encoder::new(ctx.clone());
        let evaluator = Evaluator::new(ctx.clone(), Arc::new(keys));
        Self { ctx, sk, encoder, evaluator, rng }
    }

    fn encrypt(&mut self, values: &[u64], scale: u64) -> Ciphertext {
        let level = self.ctx.params().max_level();
        let mut pt = self.ctx.new_plaintext(level, scale).unwrap();
        self.encoder.encode(values, &mut pt).unwrap();
        encrypt_symmetric(&self.ctx, &self.sk, &pt, &mut self.rng).unwrap()
    }

    fn decrypt_decode(&mut self, ct: &Ciphertext) -> Vec<u64> {
        let pt = decrypt(&self.ctx, &self.sk, ct).unwrap();
        self.encoder.decode(&pt).unwrap()
    }

    fn decrypt_decode_signed(&mut self, ct: &Ciphertext) -> Vec<i64> {
        let pt = decrypt(&self.ctx, &self.sk, ct).unwrap();
        self.encoder.decode_signed(&pt).unwrap()
    }
}

#[test]
fn test_encrypt_decrypt_pipeline() {
    let mut h = Harness::new(1, &[], false);
    let values: Vec<u64> = (0..16).map(|i| i * 4097 + 5).collect();
    let ct = h.encrypt(&values, 3);
    assert_eq!(h.decrypt_decode(&ct), values);
}

#[test]
fn test_add_same_scale() {
    let mut h = Harness::new(2, &[], false);
    let a: Vec<u64> = (0..16).map(|i| i * 100).collect();
    let b: Vec<u64> = (0..16).map(|i| 65000 + i).collect();
    let mut ca = h.encrypt(&a, 3);
    let cb = h.encrypt(&b, 3);
    h.evaluator.add(&mut ca, Operand::Ciphertext(&cb)).unwrap();
    let expect: Vec<u64> = a.iter().zip(&b).map(|(x, y)| (x + y) % T).collect();
    assert_eq!(h.decrypt_decode(&ca), expect);
}

#[test]
fn test_add_realigns_different_scales() {
    // one input at scale 3, the other at scale 7: the sum must still
    // decode to the plain value-wise sum
    let mut h = Harness::new(3, &[], false);
    let a: Vec<u64> = (0..16).map(|i| i * i).collect();
    let b: Vec<u64> = (0..16).map(|i| 3 * i + 1).collect();
    let mut ca = h.encrypt(&a, 3);
    let cb = h.encrypt(&b, 7);
    h.evaluator.add(&mut ca, Operand::Ciphertext(&cb)).unwrap();
    let expect: Vec<u64> = a.iter().zip(&b).map(|(x, y)| (x + y) % T).collect();
    assert_eq!(h.decrypt_decode(&ca), expect);
}

#[test]
fn test_sub_and_negate() {
    let mut h = Harness::new(4, &[], false);
    let a: Vec<u64> = (0..16).map(|i| 10 * i).collect();
    let b: Vec<u64> = (0..16).map(|i| 7 * i + 2).collect();
    let mut ca = h.encrypt(&a, 2);
    let cb = h.encrypt(&b, 5);
    h.evaluator.sub(&mut ca, Operand::Ciphertext(&cb)).unwrap();
    let diff: Vec<i64> = a.iter().zip(&b).map(|(&x, &y)| x as i64 - y as i64).collect();
    assert_eq!(h.decrypt_decode_signed(&ca), diff);

    h.evaluator.negate(&mut ca);
    let neg: Vec<i64> = diff.iter().map(|&d| -d).collect();
    assert_eq!(h.decrypt_decode_signed(&ca), neg);
}

#[test]
fn test_scalar_add_and_mul() {
    let mut h = Harness::new(5, &[], false);
    let a: Vec<u64> = (0..16).map(|i| 100 + i).collect();
    let mut ct = h.encrypt(&a, 3);
    h.evaluator.add(&mut ct, Operand::Scalar(41)).unwrap();
    let plus: Vec<u64> = a.iter().map(|&x| x + 41).collect();
    assert_eq!(h.decrypt_decode(&ct), plus);

    h.evaluator.mul(&mut ct, Operand::Scalar(-2)).unwrap();
    assert_eq!(ct.scale(), 3, "scalar multiplication keeps the scale");
    let doubled: Vec<i64> = plus.iter().map(|&x| -2 * x as i64).collect();
    assert_eq!(h.decrypt_decode_signed(&ct), doubled);
}

#[test]
fn test_vector_add_and_mul() {
    let mut h = Harness::new(6, &[], false);
    let a: Vec<u64> = (0..16).map(|i| i + 1).collect();
    let w: Vec<u64> = (0..16).map(|i| 2 * i + 3).collect();
    let mut ct = h.encrypt(&a, 4);
    h.evaluator.add(&mut ct, Operand::Vector(&w)).unwrap();
    let sum: Vec<u64> = a.iter().zip(&w).map(|(x, y)| x + y).collect();
    assert_eq!(h.decrypt_decode(&ct), sum);

    h.evaluator.mul(&mut ct, Operand::Vector(&w)).unwrap();
    assert_eq!(ct.scale(), 4, "vector multiplication keeps the scale");
    let prod: Vec<u64> = sum.iter().zip(&w).map(|(x, y)| x * y % T).collect();
    assert_eq!(h.decrypt_decode(&ct), prod);
}

#[test]
fn test_plaintext_operand() {
    let mut h = Harness::new(7, &[], false);
    let a: Vec<u64> = (0..16).map(|i| 500 + i).collect();
    let b: Vec<u64> = (0..16).map(|i| 3 * i).collect();
    let ct = h.encrypt(&a, 2);

    let level = h.ctx.params().max_level();
    let mut pt = h.ctx.new_plaintext(level, 5).unwrap();
    h.encoder.encode(&b, &mut pt).unwrap();

    let added = h.evaluator.add_new(&ct, Operand::Plaintext(&pt)).unwrap();
    let expect: Vec<u64> = a.iter().zip(&b).map(|(x, y)| x + y).collect();
    assert_eq!(h.decrypt_decode(&added), expect);

    let mulled = h.evaluator.mul_new(&ct, Operand::Plaintext(&pt)).unwrap();
    assert_eq!(mulled.scale(), 10);
    let expect: Vec<u64> = a.iter().zip(&b).map(|(x, y)| x * y % T).collect();
    assert_eq!(h.decrypt_decode(&mulled), expect);
}

#[test]
fn test_standard_mul_relin() {
    let mut h = Harness::new(8, &[], false);
    let a: Vec<u64> = (0..16).map(|i| i + 1).collect();
    let b: Vec<u64> = (0..16).map(|i| 16 - i).collect();
    let ca = h.encrypt(&a, 3);
    let cb = h.encrypt(&b, 7);

    let prod = h.evaluator.mul_new(&ca, Operand::Ciphertext(&cb)).unwrap();
    assert_eq!(prod.degree(), 2);
    assert_eq!(prod.scale(), 21);
    let expect: Vec<u64> = a.iter().zip(&b).map(|(x, y)| x * y % T).collect();
    assert_eq!(h.decrypt_decode(&prod), expect);

    let relin = h.evaluator.relinearize_new(&prod).unwrap();
    assert_eq!(relin.degree(), 1);
    assert_eq!(h.decrypt_decode(&relin), expect);
}

#[test]
fn test_square_one_through_eight_scale_invariant() {
    let mut h = Harness::new(9, &[], false);
    let mut values = vec![0u64; 16];
    for (i, v) in values.iter_mut().enumerate().take(8) {
        *v = i as u64 + 1;
    }
    let ct = h.encrypt(&values, 3);
    let sq = h.evaluator.mul_relin_scale_invariant(&ct, &ct).unwrap();
    assert_eq!(sq.degree(), 1);
    let expect: Vec<u64> = values.iter().map(|&v| v * v).collect();
    assert_eq!(h.decrypt_decode(&sq), expect);
}

#[test]
fn test_scale_invariant_mul_distinct_inputs() {
    let mut h = Harness::new(10, &[], false);
    let a: Vec<u64> = (0..16).map(|i| 200 + 13 * i).collect();
    let b: Vec<u64> = (0..16).map(|i| 911 * i + 1).collect();
    let ca = h.encrypt(&a, 1);
    let cb = h.encrypt(&b, 1);
    let prod = h.evaluator.mul_scale_invariant(&ca, &cb).unwrap();
    let expect: Vec<u64> = a.iter().zip(&b).map(|(x, y)| x * y % T).collect();
    assert_eq!(h.decrypt_decode(&prod), expect);
}

#[test]
fn test_rescale_after_mul() {
    let mut h = Harness::new(11, &[], false);
    let a: Vec<u64> = (0..16).map(|i| i + 10).collect();
    let b: Vec<u64> = (0..16).map(|i| i + 20).collect();
    let ca = h.encrypt(&a, 3);
    let cb = h.encrypt(&b, 3);

    let mut prod = h.evaluator.mul_new(&ca, Operand::Ciphertext(&cb)).unwrap();
    h.evaluator.relinearize(&mut prod).unwrap();

    // walk the whole chain down, decoding at every level
    let expect: Vec<u64> = a.iter().zip(&b).map(|(x, y)| x * y % T).collect();
    while prod.level() > 0 {
        let level_before = prod.level();
        h.evaluator.rescale(&mut prod).unwrap();
        assert_eq!(prod.level(), level_before - 1);
        assert_eq!(h.decrypt_decode(&prod), expect);
    }

    // chain is exhausted at level 0
    let err = h.evaluator.rescale(&mut prod);
    assert!(matches!(err, Err(bgv_rns::Error::LevelExhausted)));
}

#[test]
fn test_depth_two_small_plaintext() {
    let mut h = Harness::new(12, &[], false);
    let a: Vec<u64> = (0..16).map(|i| i + 1).collect();
    let b: Vec<u64> = (0..16).map(|i| i + 2).collect();
    let w: Vec<u64> = (0..16).map(|i| i % 3).collect();

    let ca = h.encrypt(&a, 1);
    let cb = h.encrypt(&b, 1);
    let mut ct = h.evaluator.mul_new(&ca, Operand::Ciphertext(&cb)).unwrap();
    h.evaluator.relinearize(&mut ct).unwrap();
    h.evaluator.mul(&mut ct, Operand::Vector(&w)).unwrap();
    h.evaluator.rescale(&mut ct).unwrap();

    let expect: Vec<u64> = a
        .iter()
        .zip(&b)
        .zip(&w)
        .map(|((x, y), z)| x * y * z % T)
        .collect();
    assert_eq!(h.decrypt_decode(&ct), expect);
}

#[test]
fn test_mul_then_add_accumulator() {
    let mut h = Harness::new(13, &[], false);
    let acc0: Vec<u64> = (0..16).map(|i| 1000 + i).collect();
    let a: Vec<u64> = (0..16).map(|i| i + 1).collect();
    let w: Vec<u64> = (0..16).map(|i| 2 * i).collect();

    let mut acc = h.encrypt(&acc0, 3);
    let ca = h.encrypt(&a, 7);
    h.evaluator.mul_then_add(&mut acc, &ca, Operand::Vector(&w)).unwrap();

    let expect: Vec<u64> = acc0
        .iter()
        .zip(a.iter().zip(&w))
        .map(|(&s, (&x, &y))| (s + x * y) % T)
        .collect();
    assert_eq!(h.decrypt_decode(&acc), expect);
}

#[test]
fn test_mul_relin_then_add_stays_degree_one() {
    let mut h = Harness::new(14, &[], false);
    let acc0: Vec<u64> = (0..16).map(|i| 5 * i).collect();
    let a: Vec<u64> = (0..16).map(|i| i + 1).collect();
    let b: Vec<u64> = (0..16).map(|i| i + 3).collect();

    let mut acc = h.encrypt(&acc0, 1);
    let ca = h.encrypt(&a, 1);
    let cb = h.encrypt(&b, 1);
    h.evaluator.mul_relin_then_add(&mut acc, &ca, Operand::Ciphertext(&cb)).unwrap();
    assert_eq!(acc.degree(), 1);

    let expect: Vec<u64> = acc0
        .iter()
        .zip(a.iter().zip(&b))
        .map(|(&s, (&x, &y))| (s + x * y) % T)
        .collect();
    assert_eq!(h.decrypt_decode(&acc), expect);
}

#[test]
fn test_rotate_columns() {
    let mut h = Harness::new(15, &[1, 3], false);
    let values: Vec<u64> = (0..16).map(|i| 77 * i + 2).collect();
    let ct = h.encrypt(&values, 3);

    for k in [1usize, 3] {
        let rotated = h.evaluator.rotate_columns(&ct, k).unwrap();
        let decoded = h.decrypt_decode(&rotated);
        for i in 0..8 {
            assert_eq!(decoded[i], values[(i + k) % 8], "rotation {} row 0 slot {}", k, i);
            assert_eq!(decoded[8 + i], values[8 + (i + k) % 8], "rotation {} row 1 slot {}", k, i);
        }
    }
}

#[test]
fn test_rotate_rows() {
    let mut h = Harness::new(16, &[], true);
    let values: Vec<u64> = (0..16).map(|i| i + 40000).collect();
    let ct = h.encrypt(&values, 1);
    let swapped = h.evaluator.rotate_rows(&ct).unwrap();
    let decoded = h.decrypt_decode(&swapped);
    assert_eq!(&decoded[..8], &values[8..]);
    assert_eq!(&decoded[8..], &values[..8]);
}

#[test]
fn test_serde_roundtrip() {
    let mut h = Harness::new(17, &[], false);
    let values: Vec<u64> = (0..16).map(|i| 123 * i).collect();
    let ct = h.encrypt(&values, 3);

    let bytes = bincode::serialize(&ct).unwrap();
    let restored: Ciphertext = bincode::deserialize(&bytes).unwrap();
    assert_eq!(restored, ct);
    assert_eq!(h.decrypt_decode(&restored), values);

    let key_bytes = bincode::serialize(h.evaluator.keys()).unwrap();
    let _restored_keys: EvaluationKeys = bincode::deserialize(&key_bytes).unwrap();
}

#[test]
fn test_scalar_extreme_values() {
    let mut h = Harness::new(19, &[], false);
    let values: Vec<u64> = (0..16).map(|i| 900 * i).collect();
    let mut ct = h.encrypt(&values, 3);

    h.evaluator.sub(&mut ct, Operand::Scalar(i128::MIN)).unwrap();
    let c = i128::MIN.rem_euclid(T as i128) as u64;
    let expect: Vec<u64> = values.iter().map(|&v| (v + T - c) % T).collect();
    assert_eq!(h.decrypt_decode(&ct), expect);

    h.evaluator.add(&mut ct, Operand::Scalar(i128::MIN)).unwrap();
    assert_eq!(h.decrypt_decode(&ct), values);
}

#[test]
fn test_standard_squaring_shared_operand() {
    let mut h = Harness::new(20, &[], false);
    let values: Vec<u64> = (0..16).map(|i| i + 1).collect();
    let ct = h.encrypt(&values, 3);
    let sq = h.evaluator.mul_new(&ct, Operand::Ciphertext(&ct)).unwrap();
    assert_eq!(sq.degree(), 2);
    assert_eq!(sq.scale(), 9);
    let expect: Vec<u64> = values.iter().map(|&v| v * v % T).collect();
    assert_eq!(h.decrypt_decode(&sq), expect);
}

#[test]
fn test_montgomery_plaintext_operand() {
    let mut h = Harness::new(21, &[], false);
    let a: Vec<u64> = (0..16).map(|i| 31 * i + 4).collect();
    let b: Vec<u64> = (0..16).map(|i| i + 2).collect();
    let ct = h.encrypt(&a, 3);

    let level = h.ctx.params().max_level();
    let rt = h.encoder.encode_ring_t(&b, 2).unwrap();
    let mut pt = h.ctx.new_plaintext(level, 2).unwrap();
    h.encoder.embed(&rt, level, true, &mut pt).unwrap();
    assert!(pt.poly.is_montgomery());

    let prod = h.evaluator.mul_new(&ct, Operand::Plaintext(&pt)).unwrap();
    assert_eq!(prod.scale(), 6);
    let expect: Vec<u64> = a.iter().zip(&b).map(|(x, y)| x * y % T).collect();
    assert_eq!(h.decrypt_decode(&prod), expect);

    let added = h.evaluator.add_new(&ct, Operand::Plaintext(&pt)).unwrap();
    let expect: Vec<u64> = a.iter().zip(&b).map(|(x, y)| (x + y) % T).collect();
    assert_eq!(h.decrypt_decode(&added), expect);
}

#[test]
fn test_evaluator_shallow_copy_shares_keys() {
    let mut h = Harness::new(18, &[], false);
    let values: Vec<u64> = (0..16).collect();
    let ct = h.encrypt(&values, 1);
    let mut copy = h.evaluator.shallow_copy();
    let doubled = copy.add_new(&ct, Operand::Ciphertext(&ct)).unwrap();
    let expect: Vec<u64> = values.iter().map(|&v| 2 * v).collect();
    assert_eq!(h.decrypt_decode(&doubled), expect);
}

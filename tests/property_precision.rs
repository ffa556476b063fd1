//! Property tests for the mixed-precision machinery
//!
//! Invariants checked:
//! - cast round-trips are idempotent on representable values
//! - unscaling is exact scalar division on the value list, dense or sparse
//! - the health check is pure and order-insensitive
//! - skipped steps never move parameters; healthy steps always track the
//!   cast-down master exactly
//! - the scale controller follows the grow/backoff policy

use mezcla::optim::{Grad, GradParam, Optimizer, Sgd};
use mezcla::precision::{
    check_grads, quantize, LossScaleConfig, LossScaler, MixedPrecisionOptimizer, Precision,
};
use mezcla::Tensor;
use ndarray::Array1;
use proptest::collection::vec;
use proptest::prelude::*;

fn finite_f32() -> impl Strategy<Value = f32> {
    -1.0e4f32..1.0e4f32
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    #[test]
    fn prop_fp16_round_trip_idempotent(v in finite_f32()) {
        let once = quantize(v, Precision::Fp16);
        prop_assert_eq!(quantize(once, Precision::Fp16), once);
    }

    #[test]
    fn prop_bf16_round_trip_idempotent(v in finite_f32()) {
        let once = quantize(v, Precision::Bf16);
        prop_assert_eq!(quantize(once, Precision::Bf16), once);
    }

    #[test]
    fn prop_unscale_divides_every_value(
        values in vec(finite_f32(), 1..32),
        scale in prop::sample::select(vec![2.0f32, 8.0, 64.0, 1024.0, 65536.0]),
    ) {
        let mut grad = Grad::Dense(Array1::from_vec(values.clone()));
        grad.scale_values(1.0 / scale);
        for (got, original) in grad.values().iter().zip(values.iter()) {
            prop_assert_eq!(*got, original / scale);
        }
    }

    #[test]
    fn prop_unscale_sparse_touches_only_values(
        values in vec(finite_f32(), 1..8),
        scale in 2.0f32..1024.0,
    ) {
        let n = values.len();
        let indices: Vec<usize> = (0..n).collect();
        let mut grad = Grad::Sparse {
            values: Array1::from_vec(values),
            indices: indices.clone(),
            dense_shape: n,
        };
        grad.scale_values(1.0 / scale);
        match grad {
            Grad::Sparse { indices: after, dense_shape, .. } => {
                prop_assert_eq!(after, indices);
                prop_assert_eq!(dense_shape, n);
            }
            Grad::Dense(_) => prop_assert!(false, "sparse gradient became dense"),
        }
    }

    #[test]
    fn prop_health_check_finite_batches(values in vec(finite_f32(), 1..64)) {
        let expected_max = values.iter().fold(0.0f32, |m, v| m.max(v.abs()));
        let pairs = [GradParam::dense(
            Array1::from_vec(values),
            Tensor::from_vec(vec![0.0], true),
        )];
        let (bad, amax) = check_grads(&pairs);
        prop_assert!(!bad);
        prop_assert_eq!(amax, expected_max);
    }

    #[test]
    fn prop_health_check_flags_any_nonfinite(
        values in vec(finite_f32(), 1..16),
        position in 0usize..16,
        nonfinite in prop::sample::select(vec![f32::NAN, f32::INFINITY, f32::NEG_INFINITY]),
    ) {
        let mut values = values;
        let position = position % values.len();
        values[position] = nonfinite;
        let pairs = [GradParam::dense(
            Array1::from_vec(values),
            Tensor::from_vec(vec![0.0], true),
        )];
        let (bad, amax) = check_grads(&pairs);
        prop_assert!(bad || amax.is_infinite());
        prop_assert!(bad);
    }

    #[test]
    fn prop_skipped_step_never_moves_parameters(initial in vec(finite_f32(), 1..8)) {
        let mut opt = MixedPrecisionOptimizer::new(
            Sgd::new(0.1, 0.0),
            Some(LossScaler::new(256.0)),
        );
        let w = Tensor::from_vec(initial.clone(), true).with_name("w");

        let mut grad = vec![0.5f32; initial.len()];
        grad[0] = f32::NAN;
        let pairs = [GradParam::dense(Array1::from_vec(grad), w.clone())];
        opt.apply_gradients(&pairs, None).unwrap();

        prop_assert_eq!(w.data().to_vec(), initial);
        prop_assert_eq!(opt.loss_scale(), 128.0);
    }

    #[test]
    fn prop_working_copy_tracks_cast_down_master(
        initial in vec(-8.0f32..8.0, 1..8),
        grads in vec(-0.5f32..0.5, 1..8),
    ) {
        // loss = sum(w * x) with x as the per-element gradient
        let n = initial.len().min(grads.len());
        let mut opt = MixedPrecisionOptimizer::new(Sgd::new(0.1, 0.0), None);
        let w = Tensor::from_vec(initial[..n].to_vec(), true)
            .with_name("w")
            .with_precision(Precision::Fp16);
        let x = Tensor::from_vec(grads[..n].to_vec(), false);

        let mut loss = mezcla::autograd::sum(&mezcla::autograd::mul(&w, &x));
        let promoted = opt.compute_gradients(&mut loss, &[w.clone()]).unwrap();
        opt.apply_gradients(&promoted, None).unwrap();

        let master = opt.master_of(&w).unwrap().data();
        let working = w.data();
        for i in 0..n {
            prop_assert_eq!(working[i], quantize(master[i], Precision::Fp16));
        }
    }

    #[test]
    fn prop_scale_growth_then_exact_backoff(
        interval in 1usize..16,
        initial in prop::sample::select(vec![8.0f32, 128.0, 1024.0]),
    ) {
        let mut scaler = LossScaler::from_config(&LossScaleConfig {
            initial_scale: initial,
            growth_interval: interval,
            ..LossScaleConfig::default()
        });

        for _ in 0..interval {
            scaler.update(false, 0.1);
        }
        prop_assert_eq!(scaler.scale(), initial * 2.0);

        scaler.update(true, 0.1);
        prop_assert_eq!(scaler.scale(), initial);
    }

    #[test]
    fn prop_scale_never_below_min(overflows in 1usize..64) {
        let mut scaler = LossScaler::new(4.0);
        for _ in 0..overflows {
            scaler.update(true, 0.0);
        }
        prop_assert!(scaler.scale() >= 1.0);
    }
}

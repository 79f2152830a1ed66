//! Integration tests for crossmodal fusion
//!
//! Covers:
//! - Fusion of fixed beliefs under both strategies
//! - Blackout override of a dropped camera frame
//! - Filter banks assembled from configuration, end to end
//! - Measurement-level fusion driving a single filter
//! - Failure propagation for missing observations

mod common;

use crossmodal_core::{
    constants::WEIGHT_SUM_TOLERANCE,
    fusion::{FusionRequest, FusionStrategy},
    matrix, BlackoutAwareFusion, CrossmodalConfig, CrossmodalMeasurementModel, CrossmodalWeightModel,
    FilterError, GaussianBatch, KalmanFilter, MeasurementModel, Modality, ModalitySet, ObservationBundle,
    Tensor, WeightTensor, WeightedFusion, WeightingPolicy,
};

use common::{
    generators::{isotropic, random_batch, simplex_weights, TestRng},
    push_bank,
    scenarios::PushStep,
    weight_encoders, ControlPush, FixedScores, ReadoutHead,
};

fn push_slots() -> Vec<ModalitySet> {
    vec![
        ModalitySet::single(Modality::Image),
        ModalitySet::new(&[Modality::Pos, Modality::Sensors]).unwrap(),
    ]
}

fn fuse<S: FusionStrategy<2>>(
    strategy: &S,
    estimates: &[GaussianBatch<2>],
    weights: WeightTensor<2>,
    observations: &ObservationBundle,
) -> crossmodal_core::FusedEstimate<2> {
    let slots = push_slots();
    strategy
        .fuse(FusionRequest {
            estimates,
            active: &[0, 1],
            slots: &slots,
            weights,
            observations,
        })
        .unwrap()
}

#[test]
fn test_equal_weights_blend_means() {
    let estimates = [isotropic([0.0, 0.0], 0.02, 4), isotropic([1.0, 1.0], 0.02, 4)];
    let obs = PushStep::steady(4).bundle();

    let fused = fuse(&WeightedFusion, &estimates, WeightTensor::uniform(2, 4), &obs);

    for (mean, cov) in fused.state.means().iter().zip(fused.state.covariances()) {
        assert_within_tolerance!(mean[0], 0.5, 1e-12);
        assert_within_tolerance!(mean[1], 0.5, 1e-12);
        assert_within_tolerance!(cov[0][0], 0.02, 1e-12);
    }
}

#[test]
fn test_blackout_element_follows_proprioception() {
    let estimates = [isotropic([0.0, 0.0], 0.02, 4), isotropic([1.0, 1.0], 0.02, 4)];
    let obs = PushStep::steady(4).with_blackout(0).bundle();

    let fused = fuse(&BlackoutAwareFusion::default(), &estimates, WeightTensor::uniform(2, 4), &obs);

    let blacked = fused.state.means()[0];
    assert_within_tolerance!(blacked[0], 1.0, 1e-6);
    assert_within_tolerance!(blacked[1], 1.0, 1e-6);
    for d in 0..2 {
        assert_within_tolerance!(fused.weights.get(0, 0)[d], 1e-9, 1e-15);
        assert_within_tolerance!(fused.weights.get(1, 0)[d], 1.0 - 1e-9, 1e-12);
    }

    for mean in &fused.state.means()[1..] {
        assert_within_tolerance!(mean[0], 0.5, 1e-12);
    }
}

#[test]
fn test_blackout_ignores_learned_weights() {
    // Learned weights favour the camera on the blacked-out element
    let estimates = [isotropic([0.0, 0.0], 0.02, 2), isotropic([1.0, 1.0], 0.02, 2)];
    let learned = WeightTensor::from_slots(vec![
        vec![[0.99, 0.9], [0.99, 0.9]],
        vec![[0.01, 0.1], [0.01, 0.1]],
    ])
    .unwrap();
    let obs = PushStep::steady(2).with_blackout(1).bundle();

    let fused = fuse(&BlackoutAwareFusion::default(), &estimates, learned, &obs);

    assert_within_tolerance!(fused.weights.get(0, 1)[0], 1e-9, 1e-15);
    assert_within_tolerance!(fused.weights.get(1, 1)[1], 1.0 - 1e-9, 1e-12);
    assert_within_tolerance!(fused.weights.get(0, 0)[0], 0.99, 1e-12);
    assert!(fused.weights.is_partition_of_unity(WEIGHT_SUM_TOLERANCE));
}

#[test]
fn test_absolute_policy_equal_scores() {
    let model = CrossmodalWeightModel::<2>::new(weight_encoders(), FixedScores(vec![2.0; 4]), 2)
        .unwrap()
        .with_policy(WeightingPolicy::Absolute);

    let weights = model.weights(&PushStep::steady(3).bundle()).unwrap();

    assert_eq!(weights.shape(), (2, 3, 2));
    for m in 0..2 {
        for i in 0..3 {
            for w in weights.get(m, i) {
                assert_within_tolerance!(*w, 0.5, 1e-9);
            }
        }
    }
}

#[test]
fn test_fallback_is_identical_without_blackout() {
    let mut rng = TestRng::new(7);
    let obs = PushStep::steady(16).bundle();

    for _ in 0..20 {
        let estimates = [random_batch(&mut rng, 16), random_batch(&mut rng, 16)];
        let weights = simplex_weights(&mut rng, 2, 16);

        let aware = fuse(&BlackoutAwareFusion::default(), &estimates, weights.clone(), &obs);
        let plain = fuse(&WeightedFusion, &estimates, weights, &obs);
        assert_eq!(aware, plain);
    }
}

#[test]
fn test_configured_partition_covers_every_modality() {
    let config = CrossmodalConfig::default().validate::<2>().unwrap();
    assert!(config.is_partition());

    let union = config.slots.iter().fold(config.slots[0], |acc, s| acc.union(s));
    assert_eq!(union, ModalitySet::all());
    assert_eq!(config.slots.iter().map(ModalitySet::len).sum::<usize>(), 3);

    let bank = push_bank(&config, vec![0.0; 4], -1.0).unwrap();
    assert!(bank.is_partition());
}

#[test]
fn test_bank_blackout_end_to_end() {
    let config = CrossmodalConfig::default()
        .with_blackout_awareness(true)
        .validate::<2>()
        .unwrap();
    let bank = push_bank(&config, vec![0.0; 4], -1.0).unwrap();
    assert_eq!(bank.strategy_name(), "blackout_aware");

    let prior = GaussianBatch::from_prior([0.5, 0.5], matrix::diagonal(&[0.02; 2]), 3);
    let controls = Tensor::zeros(3, 2);
    let obs = PushStep::steady(3).with_pos([1.0, 1.0]).with_blackout(2).bundle();

    let step = bank.step(&prior, &controls, &obs).unwrap();

    // The camera sees the object at the origin, the gripper at (1, 1)
    let camera = step.unimodal[0].means()[0];
    let gripper = step.unimodal[1].means()[0];
    assert!(camera[0] < 0.5 && gripper[0] > 0.5);

    let blended = step.fused.state.means()[0];
    assert_within_tolerance!(blended[0], 0.5 * (camera[0] + gripper[0]), 1e-6);

    let blacked = step.fused.state.means()[2];
    let proprio = step.unimodal[1].means()[2];
    assert_within_tolerance!(blacked[0], proprio[0], 1e-6);
    assert_within_tolerance!(blacked[1], proprio[1], 1e-6);
    assert!(step.fused.state.is_valid(1e-12));
}

#[test]
fn test_bank_without_awareness_blends_blackout() {
    let config = CrossmodalConfig::default().validate::<2>().unwrap();
    let bank = push_bank(&config, vec![0.0; 4], -1.0).unwrap();

    let prior = GaussianBatch::from_prior([0.5, 0.5], matrix::diagonal(&[0.02; 2]), 1);
    let obs = PushStep::steady(1).with_pos([1.0, 1.0]).with_blackout(0).bundle();
    let step = bank.step(&prior, &Tensor::zeros(1, 2), &obs).unwrap();

    let expected = 0.5 * (step.unimodal[0].means()[0][0] + step.unimodal[1].means()[0][0]);
    assert_within_tolerance!(step.fused.state.means()[0][0], expected, 1e-6);
}

#[test]
fn test_absolute_zero_scores_blend_evenly() {
    let config = CrossmodalConfig::default().with_weighting("absolute").validate::<2>().unwrap();
    let bank = push_bank(&config, vec![0.0; 4], -1.0).unwrap();

    let prior = GaussianBatch::from_prior([0.5, 0.5], matrix::diagonal(&[0.02; 2]), 2);
    let obs = PushStep::steady(2).with_pos([1.0, 1.0]).bundle();
    let step = bank.step(&prior, &Tensor::zeros(2, 2), &obs).unwrap();

    assert!(step.fused.weights.is_partition_of_unity(WEIGHT_SUM_TOLERANCE));
    for d in 0..2 {
        let expected = 0.5 * (step.unimodal[0].means()[0][d] + step.unimodal[1].means()[0][d]);
        assert_within_tolerance!(step.fused.state.means()[0][d], expected, 1e-6);
        assert!(step.fused.state.covariances()[0][d][d] > 0.0);
    }
}

#[test]
fn test_disabled_filter_from_configuration() {
    let config = CrossmodalConfig::default()
        .with_blackout_awareness(true)
        .with_enabled(vec![false, true])
        .validate::<2>()
        .unwrap();
    let bank = push_bank(&config, vec![0.0; 4], -1.0).unwrap();

    let prior = GaussianBatch::from_prior([0.0, 0.0], matrix::identity(), 2);
    let obs = PushStep::steady(2).with_pos([0.3, -0.3]).with_blackout(0).bundle();
    let step = bank.step(&prior, &Tensor::zeros(2, 2), &obs).unwrap();

    assert_eq!(step.active, vec![1]);
    assert_eq!(step.fused.weights.shape(), (1, 2, 2));
    let only = step.unimodal[0].means()[1];
    assert_within_tolerance!(step.fused.state.means()[1][0], only[0], 1e-6);
}

#[test]
fn test_forward_loop_tracks_moving_gripper() {
    let config = CrossmodalConfig::default().validate::<2>().unwrap();
    // Trust the gripper far more than the camera
    let bank = push_bank(&config, vec![-5.0, -5.0, 5.0, 5.0], -1.0).unwrap();

    let steps = 8;
    let controls: Vec<Tensor> = (0..steps).map(|_| Tensor::from_rows(&[[0.2, 0.1]]).unwrap()).collect();
    let observations: Vec<ObservationBundle> = (0..steps)
        .map(|t| {
            let x = 0.1 * (t + 1) as f64;
            PushStep::steady(1).with_pos([x, 0.5 * x]).bundle()
        })
        .collect();

    let initial = GaussianBatch::from_prior([0.0, 0.0], matrix::diagonal(&[0.1; 2]), 1);
    let trajectory = bank.forward_loop(&initial, &controls, &observations).unwrap();

    assert_eq!(trajectory.len(), steps);
    for belief in &trajectory {
        assert!(belief.is_valid(1e-9));
    }
    let last = trajectory[steps - 1].means()[0];
    assert_within_tolerance!(last[0], 0.8, 0.1);
    assert_within_tolerance!(last[1], 0.4, 0.1);
}

#[test]
fn test_measurement_fusion_drives_one_filter() {
    let config = CrossmodalConfig::default()
        .with_blackout_awareness(true)
        .validate::<2>()
        .unwrap();

    let models: Vec<Box<dyn MeasurementModel<2>>> = vec![
        Box::new(
            config
                .measurement(0, vec![common::image_encoder()], ReadoutHead { offset: -1.0, scale: 0.1 })
                .unwrap(),
        ),
        Box::new(
            config
                .measurement(
                    1,
                    vec![common::pos_encoder(), common::sensors_encoder()],
                    ReadoutHead { offset: 0.0, scale: 0.1 },
                )
                .unwrap(),
        ),
    ];
    let weights = config.weight_model(weight_encoders(), FixedScores(vec![0.0; 4])).unwrap();
    let measurement = CrossmodalMeasurementModel::new(models, weights)
        .unwrap()
        .with_strategy(config.fusion_strategy());
    assert_eq!(measurement.modalities(), ModalitySet::all());

    let filter = KalmanFilter::from_models(config.dynamics(ControlPush { gate_logit: 0.0 }).unwrap(), measurement);

    let obs = PushStep::steady(2).with_pos([1.0, 1.0]).with_blackout(1).bundle();
    let prior = GaussianBatch::from_prior([0.5, 0.5], matrix::diagonal(&[0.02; 2]), 2);
    let posterior = filter.step(&prior, &Tensor::zeros(2, 2), &obs).unwrap();

    // Element 0 measures the camera/gripper midpoint, element 1 only the gripper
    assert_within_tolerance!(posterior.means()[0][0], 0.5, 1e-6);
    assert!(posterior.means()[1][0] > 0.6);
    assert!(posterior.is_valid(1e-12));
}

#[test]
fn test_missing_modality_aborts_step() {
    let config = CrossmodalConfig::default().validate::<2>().unwrap();
    let bank = push_bank(&config, vec![0.0; 4], -1.0).unwrap();

    let full = PushStep::steady(1).bundle();
    let partial = full.restrict(&ModalitySet::new(&[Modality::Image, Modality::Pos]).unwrap()).unwrap();
    let prior = GaussianBatch::from_prior([0.0; 2], matrix::identity(), 1);

    let err = bank.step(&prior, &Tensor::zeros(1, 2), &partial).unwrap_err();
    assert_eq!(err, FilterError::MissingObservation { modality: Modality::Sensors });
}

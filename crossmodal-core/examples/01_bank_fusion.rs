//! Filter Bank Fusion Example
//!
//! Two Kalman filters track the planar pose of a pushed object: one reads
//! the camera, the other reads the gripper position and force. A weight
//! model decides per state dimension how far each filter is trusted.
//!
//! ## What You'll Learn
//!
//! - Building a bank from a validated configuration
//! - Plugging stub networks in where trained models would go
//! - Reading per-dimension weights from a fused step
//! - Running a short trajectory with `forward_loop`
//!
//! ## Running the Example
//!
//! ```bash
//! cargo run --example 01_bank_fusion
//! ```

use crossmodal_core::{
    matrix, matrix::Vector, CrossmodalConfig, CrossmodalKalmanFilter, DynamicsNetwork, FilterResult,
    GaussianBatch, KalmanFilter, LinearEncoder, MeasurementHead, Modality, ModalityEncoder, ObservationBundle,
    PooledImageEncoder, Tensor, WeightNetwork,
};

/// Moves the object by the commanded push
struct CommandedPush;

impl DynamicsNetwork<2> for CommandedPush {
    fn forward(&self, _state: &Vector<2>, control: &[f64]) -> (Vector<2>, f64) {
        ([control[0], control[1]], 2.0)
    }
}

/// Reads the pose from the first two features
struct PoseHead {
    bias: f64,
    variance: f64,
}

impl MeasurementHead<2> for PoseHead {
    fn forward(&self, features: &[f64]) -> (Vector<2>, Vector<2>) {
        ([features[0] + self.bias, features[1] + self.bias], [self.variance; 2])
    }
}

/// Trusts the gripper along x and the camera along y
struct AxisPreference;

impl WeightNetwork for AxisPreference {
    fn forward(&self, _features: &[f64]) -> Vec<f64> {
        // Slot-major: [image_x, image_y, proprio_x, proprio_y]
        vec![-1.0, 1.0, 1.0, -1.0]
    }
}

fn image_encoder() -> ModalityEncoder {
    let pooled = PooledImageEncoder::new(1, 2, LinearEncoder::identity(2)).expect("1x2 grid");
    ModalityEncoder::Image(Box::new(pooled))
}

fn build_bank() -> FilterResult<CrossmodalKalmanFilter<2>> {
    let config = CrossmodalConfig::default()
        .with_weighting("softmax")
        .with_process_noise(vec![0.01, 0.01])
        .validate::<2>()?;

    println!("Filters:   {:?}", config.slots);
    println!("Weighting: {:?}\n", config.weighting);

    let camera = KalmanFilter::from_models(
        config.dynamics(CommandedPush)?,
        config.measurement(0, vec![image_encoder()], PoseHead { bias: 0.0, variance: 0.05 })?,
    );
    let gripper = KalmanFilter::from_models(
        config.dynamics(CommandedPush)?,
        config.measurement(
            1,
            vec![
                ModalityEncoder::Pos(Box::new(LinearEncoder::identity(2))),
                ModalityEncoder::Sensors(Box::new(LinearEncoder::identity(1))),
            ],
            PoseHead { bias: 0.0, variance: 0.02 },
        )?,
    );
    let weights = config.weight_model(
        vec![
            image_encoder(),
            ModalityEncoder::Pos(Box::new(LinearEncoder::identity(2))),
            ModalityEncoder::Sensors(Box::new(LinearEncoder::identity(1))),
        ],
        AxisPreference,
    )?;

    config.bank(vec![camera, gripper], weights)
}

/// Camera frame whose left and right halves encode `pose`
fn observe(pose: [f64; 2], gripper: [f64; 2]) -> FilterResult<ObservationBundle> {
    let frame = vec![pose[0], pose[1], pose[0], pose[1]];
    ObservationBundle::new()
        .with(Modality::Image, Tensor::image(1, 2, 2, frame)?)?
        .with(Modality::Pos, Tensor::from_rows(&[gripper])?)?
        .with(Modality::Sensors, Tensor::from_rows(&[[0.4]])?)
}

fn main() -> FilterResult<()> {
    println!("Crossmodal Filter Bank Example");
    println!("==============================\n");

    let bank = build_bank()?;
    println!("{:?}\n", bank);

    // Single step
    let prior = GaussianBatch::from_prior([0.0, 0.0], matrix::diagonal(&[0.5, 0.5]), 1);
    let obs = observe([0.12, 0.08], [0.10, 0.11])?;
    let step = bank.step(&prior, &Tensor::from_rows(&[[0.1, 0.1]])?, &obs)?;

    for (m, belief) in step.active.iter().zip(&step.unimodal) {
        println!("Filter {} ({}): mean {:?}", m, bank.slots()[*m], belief.means()[0]);
    }
    println!("Weights image:   {:?}", step.fused.weights.get(0, 0));
    println!("Weights proprio: {:?}", step.fused.weights.get(1, 0));
    println!("Fused mean:      {:?}", step.fused.state.means()[0]);
    println!("Fused cov:       {:?}\n", step.fused.state.covariances()[0]);

    // Trajectory
    println!("Trajectory (push of 0.1 per step)");
    println!("---------------------------------");
    let steps = 5;
    let mut controls = Vec::with_capacity(steps);
    let mut observations = Vec::with_capacity(steps);
    for t in 1..=steps {
        let truth = 0.1 * t as f64;
        controls.push(Tensor::from_rows(&[[0.1, 0.1]])?);
        observations.push(observe([truth + 0.02, truth - 0.01], [truth - 0.01, truth + 0.03])?);
    }

    let start = bank.initialize_from_measurement(&observe([0.0, 0.0], [0.0, 0.0])?)?;
    let trajectory = bank.forward_loop(&start.state, &controls, &observations)?;
    for (t, belief) in trajectory.iter().enumerate() {
        let mean = belief.means()[0];
        let cov = belief.covariances()[0];
        println!(
            "t={}  truth={:.2}  x={:.3} (σ²={:.4})  y={:.3} (σ²={:.4})",
            t + 1,
            0.1 * (t + 1) as f64,
            mean[0],
            cov[0][0],
            mean[1],
            cov[1][1]
        );
    }

    Ok(())
}

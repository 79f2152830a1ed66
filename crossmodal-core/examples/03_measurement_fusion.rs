//! Measurement-Level Fusion Example
//!
//! Instead of running one filter per modality subset, the measurement
//! predictions of the subsets are fused first and drive a single Kalman
//! filter. Only one covariance is propagated.
//!
//! ## What You'll Learn
//!
//! - Composing `CrossmodalMeasurementModel` from per-subset models
//! - Inspecting the fused measurement and its weights
//! - Using the composed model inside a `KalmanFilter`
//!
//! ## Running the Example
//!
//! ```bash
//! cargo run --example 03_measurement_fusion
//! ```

use crossmodal_core::{
    matrix, matrix::Vector, CrossmodalConfig, CrossmodalMeasurementModel, DynamicsNetwork, FilterResult,
    GaussianBatch, KalmanFilter, LinearEncoder, MeasurementHead, MeasurementModel, Modality, ModalityEncoder,
    ObservationBundle, PooledImageEncoder, Tensor, WeightNetwork,
};

struct CommandedPush;

impl DynamicsNetwork<2> for CommandedPush {
    fn forward(&self, _state: &Vector<2>, control: &[f64]) -> (Vector<2>, f64) {
        ([control[0], control[1]], 0.0)
    }
}

struct PoseHead {
    variance: f64,
}

impl MeasurementHead<2> for PoseHead {
    fn forward(&self, features: &[f64]) -> (Vector<2>, Vector<2>) {
        ([features[0], features[1]], [self.variance; 2])
    }
}

struct EvenSplit;

impl WeightNetwork for EvenSplit {
    fn forward(&self, _features: &[f64]) -> Vec<f64> {
        vec![1.0; 4]
    }
}

fn image() -> ModalityEncoder {
    let pooled = PooledImageEncoder::new(1, 2, LinearEncoder::identity(2)).expect("1x2 grid");
    ModalityEncoder::Image(Box::new(pooled))
}

fn pos() -> ModalityEncoder {
    ModalityEncoder::Pos(Box::new(LinearEncoder::identity(2)))
}

fn sensors() -> ModalityEncoder {
    ModalityEncoder::Sensors(Box::new(LinearEncoder::identity(1)))
}

fn observe(camera: [f64; 2], gripper: [f64; 2]) -> FilterResult<ObservationBundle> {
    let frame = vec![camera[0], camera[1], camera[0], camera[1]];
    ObservationBundle::new()
        .with(Modality::Image, Tensor::image(1, 2, 2, frame)?)?
        .with(Modality::Pos, Tensor::from_rows(&[gripper])?)?
        .with(Modality::Sensors, Tensor::from_rows(&[[0.2]])?)
}

fn main() -> FilterResult<()> {
    println!("Measurement-Level Fusion Example");
    println!("================================\n");

    let config = CrossmodalConfig::default()
        .with_weighting("absolute")
        .with_blackout_awareness(true)
        .validate::<2>()?;

    let models: Vec<Box<dyn MeasurementModel<2>>> = vec![
        Box::new(config.measurement(0, vec![image()], PoseHead { variance: 0.08 })?),
        Box::new(config.measurement(1, vec![pos(), sensors()], PoseHead { variance: 0.02 })?),
    ];
    let weights = config.weight_model(vec![image(), pos(), sensors()], EvenSplit)?;
    let measurement = CrossmodalMeasurementModel::new(models, weights)?.with_strategy(config.fusion_strategy());

    println!("Reads: {}\n", measurement.modalities());

    let obs = observe([0.30, 0.20], [0.26, 0.24])?;
    let fused = measurement.predict_weighted(&obs)?;
    println!("Weights image:     {:?}", fused.weights.get(0, 0));
    println!("Weights proprio:   {:?}", fused.weights.get(1, 0));
    println!("Fused measurement: {:?}", fused.state.means()[0]);
    println!("Fused noise:       {:?}\n", fused.state.covariances()[0]);

    let filter = KalmanFilter::from_models(config.dynamics(CommandedPush)?, measurement);

    println!("Tracking with one filter");
    println!("------------------------");
    let mut belief = GaussianBatch::from_prior([0.0, 0.0], matrix::diagonal(&[0.5, 0.5]), 1);
    let readings = [
        ([0.11, 0.09], [0.10, 0.10]),
        ([0.0, 0.0], [0.21, 0.19]),
        ([0.29, 0.31], [0.30, 0.30]),
    ];
    for (t, (camera, gripper)) in readings.iter().enumerate() {
        let obs = observe(*camera, *gripper)?;
        belief = filter.step(&belief, &Tensor::from_rows(&[[0.1, 0.1]])?, &obs)?;
        let blank = obs.get(Modality::Image)?.is_blackout(0);
        println!(
            "t={}  camera {}  mean {:?}  var {:.4}",
            t + 1,
            if blank { "blank" } else { "lit  " },
            belief.means()[0],
            belief.covariances()[0][0][0]
        );
    }

    Ok(())
}

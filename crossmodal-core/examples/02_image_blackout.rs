//! Camera Blackout Example
//!
//! When a camera frame is blank, a learned weight model can still put
//! weight on the image filter. The blackout-aware strategy detects the
//! blank frame per element and forces the image filter's weight down to
//! a floor of 1e-9, handing the rest to the proprioceptive filter.
//!
//! ## What You'll Learn
//!
//! - Switching strategies through configuration
//! - How blank frames are detected (L1 norm below 1e-8)
//! - Elements without a blackout keep their learned weights
//! - Disabling a filter instead of overriding its weight
//!
//! ## Running the Example
//!
//! ```bash
//! cargo run --example 02_image_blackout
//! ```

use crossmodal_core::{
    matrix, matrix::Vector, CrossmodalConfig, CrossmodalKalmanFilter, DynamicsNetwork, FilterResult,
    GaussianBatch, KalmanFilter, LinearEncoder, MeasurementHead, Modality, ModalityEncoder, ObservationBundle,
    PooledImageEncoder, Tensor, ValidatedConfig, WeightNetwork,
};

struct Stationary;

impl DynamicsNetwork<2> for Stationary {
    fn forward(&self, _state: &Vector<2>, _control: &[f64]) -> (Vector<2>, f64) {
        ([0.0, 0.0], 0.0)
    }
}

struct PoseHead;

impl MeasurementHead<2> for PoseHead {
    fn forward(&self, features: &[f64]) -> (Vector<2>, Vector<2>) {
        ([features[0], features[1]], [0.05; 2])
    }
}

/// A model that has learned to favour the camera
struct CameraFavoured;

impl WeightNetwork for CameraFavoured {
    fn forward(&self, _features: &[f64]) -> Vec<f64> {
        vec![3.0, 3.0, 0.0, 0.0]
    }
}

fn encoders(slot: Option<usize>) -> Vec<ModalityEncoder> {
    let image = || {
        let pooled = PooledImageEncoder::new(1, 2, LinearEncoder::identity(2)).expect("1x2 grid");
        ModalityEncoder::Image(Box::new(pooled))
    };
    let pos = || ModalityEncoder::Pos(Box::new(LinearEncoder::identity(2)));
    let sensors = || ModalityEncoder::Sensors(Box::new(LinearEncoder::identity(1)));

    match slot {
        Some(0) => vec![image()],
        Some(_) => vec![pos(), sensors()],
        None => vec![image(), pos(), sensors()],
    }
}

fn build(config: &ValidatedConfig<2>) -> FilterResult<CrossmodalKalmanFilter<2>> {
    let filters = (0..2)
        .map(|slot| {
            Ok(KalmanFilter::from_models(
                config.dynamics(Stationary)?,
                config.measurement(slot, encoders(Some(slot)), PoseHead)?,
            ))
        })
        .collect::<FilterResult<Vec<_>>>()?;
    let weights = config.weight_model(encoders(None), CameraFavoured)?;
    config.bank(filters, weights)
}

/// Three elements; the camera of element 1 has dropped out
fn observations() -> FilterResult<ObservationBundle> {
    let lit = [0.9, 0.9, 0.9, 0.9];
    let dark = [0.0; 4];
    let frames: Vec<f64> = [lit, dark, lit].iter().flatten().copied().collect();

    ObservationBundle::new()
        .with(Modality::Image, Tensor::image(3, 2, 2, frames)?)?
        .with(Modality::Pos, Tensor::from_rows(&[[0.5, 0.5]; 3])?)?
        .with(Modality::Sensors, Tensor::from_rows(&[[1.0]; 3])?)
}

fn report(label: &str, bank: &CrossmodalKalmanFilter<2>) -> FilterResult<()> {
    let obs = observations()?;
    let prior = GaussianBatch::from_prior([0.7, 0.7], matrix::diagonal(&[1.0, 1.0]), 3);
    let step = bank.step(&prior, &Tensor::zeros(3, 2), &obs)?;

    println!("{} ({})", label, bank.strategy_name());
    for i in 0..3 {
        let image = step.fused.weights.get(0, i);
        println!(
            "  element {}: image weight {:.3e}  fused x {:.3}",
            i,
            image[0],
            step.fused.state.means()[i][0]
        );
    }
    println!();
    Ok(())
}

fn main() -> FilterResult<()> {
    println!("Camera Blackout Example");
    println!("=======================\n");

    let mask = observations()?.blackout_mask(Modality::Image)?;
    println!("Blank frames: {:?}\n", mask);

    let learned = CrossmodalConfig::default().validate::<2>()?;
    report("Learned weights only", &build(&learned)?)?;

    let aware = CrossmodalConfig::default()
        .with_blackout_awareness(true)
        .with_blackout_modalities(&["image"])
        .validate::<2>()?;
    report("Blackout override", &build(&aware)?)?;

    // With a filter disabled the override steps aside
    let camera_off = CrossmodalConfig::default()
        .with_blackout_awareness(true)
        .with_enabled(vec![false, true])
        .validate::<2>()?;
    let bank = build(&camera_off)?;
    let step = bank.step(
        &GaussianBatch::from_prior([0.7, 0.7], matrix::diagonal(&[1.0, 1.0]), 3),
        &Tensor::zeros(3, 2),
        &observations()?,
    )?;
    println!("Camera filter disabled");
    println!("  active filters: {:?}", step.active);
    println!("  fused x:        {:?}", step.fused.state.means().iter().map(|m| m[0]).collect::<Vec<_>>());

    Ok(())
}

//! Athlete performance profiles used to time generated traces.

mod runner;

pub use runner::RunnerProfile;

/// Samples a day-to-day variance factor around 1.0 from a normal distribution.
pub fn sample_variance(std_dev: f64, rng: &mut impl rand::Rng) -> f64 {
    use rand_distr::{Distribution, Normal};

    match Normal::new(1.0, std_dev) {
        Ok(normal) if std_dev > 0.0 => {
            let sample: f64 = normal.sample(rng);
            sample.clamp(0.7, 1.4)
        }
        _ => 1.0,
    }
}

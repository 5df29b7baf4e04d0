use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::{
    constants::Pixel,
    observations::{Observation, Observations},
    tlefit_errors::TlefitError,
};

/// Draw a perturbed copy of a track for one bootstrap iteration.
///
/// Each pixel coordinate receives independent Gaussian noise `N(0, sigma_px)`; timestamps
/// are kept. The input track is left untouched.
///
/// Arguments
/// ---------
/// * `observations`: the ingested track
/// * `sigma_px`: standard deviation of the per-coordinate noise, in pixels
/// * `rng`: random stream owned by the current iteration
///
/// Return
/// ------
/// * a new track, or [`TlefitError::NoiseInjectionError`] when `sigma_px` is negative or not
///   finite
pub fn resample(
    observations: &[Observation],
    sigma_px: Pixel,
    rng: &mut impl Rng,
) -> Result<Observations, TlefitError> {
    let noise = Normal::new(0.0, sigma_px)?;

    Ok(observations
        .iter()
        .map(|obs| {
            Observation::new(
                obs.pixel_x + noise.sample(rng),
                obs.pixel_y + noise.sample(rng),
                obs.time,
            )
        })
        .collect())
}

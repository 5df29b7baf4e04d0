//! # Bootstrap uncertainty estimator
//!
//! The element uncertainties are estimated by refitting noisy replicas of the observed track:
//!
//! 1. replica `k` owns a random stream seeded from `(base_seed, k)`;
//! 2. every pixel coordinate of the track receives independent `N(0, bootstrap_sigma_px)`
//!    noise ([`resample`]), producing a new track;
//! 3. the replica is refitted from scratch with [`run_once`], using the bootstrap
//!    finite-difference step;
//! 4. the elements of every replica are appended to a sample set, then reduced to one
//!    standard deviation per element.
//!
//! ## Failures
//!
//! A replica whose fit returns an error is logged, counted in
//! [`BootstrapSummary::n_failed`] and left out of the samples. A replica that succeeds with
//! non-finite elements is kept but its `NaN` and infinite entries are ignored by the statistic
//! ([`nan_std`]). The estimate needs at least one successful replica.
//!
//! ## Features
//!
//! * `parallel` – replicas run on the rayon thread pool (the projector must be `Sync`).
//! * `progress` – an indicatif progress bar tracks the replicas.

use rand::{rngs::StdRng, SeedableRng};
use tracing::{info, warn};

use crate::{
    elements::{OrbitalElements, ELEMENT_NAMES},
    observations::{resample, Observation},
    pipeline::{run_once, FitResult},
    projection::Projector,
    refine_params::{FitSeed, RefineParams},
    tlefit_errors::TlefitError,
};

#[cfg(feature = "progress")]
use crate::progress_bar::BootstrapProgress;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Projector usable by the bootstrap loop.
///
/// With the `parallel` feature the replicas share the projector across threads, which
/// requires `Sync`; without it any [`Projector`] qualifies.
#[cfg(feature = "parallel")]
pub trait SharedProjector: Projector + Sync {}
#[cfg(feature = "parallel")]
impl<T: Projector + Sync + ?Sized> SharedProjector for T {}

/// Projector usable by the bootstrap loop.
#[cfg(not(feature = "parallel"))]
pub trait SharedProjector: Projector {}
#[cfg(not(feature = "parallel"))]
impl<T: Projector + ?Sized> SharedProjector for T {}

/// Odd mixing constant spreading replica indices over the seed space
const REPLICA_SEED_MIX: u64 = 0x9E37_79B9_7F4A_7C15;

/// Element samples and their spread.
#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapSummary {
    /// Elements of every successful replica, array order `(i, Ω, e, ω, M, n)`
    pub samples: Vec<[f64; 6]>,
    /// Population standard deviation of the finite samples of each element
    pub std_dev: [f64; 6],
    /// Replicas attempted
    pub n_iterations: usize,
    /// Replicas whose fit returned an error
    pub n_failed: usize,
    /// Successful replicas with at least one non-finite element
    pub n_degenerate: usize,
}

impl BootstrapSummary {
    /// Reduce the outcome of every replica.
    ///
    /// Return
    /// ------
    /// * the summary, or [`TlefitError::BootstrapExhausted`] if no replica succeeded.
    pub fn from_outcomes<I>(outcomes: I) -> Result<Self, TlefitError>
    where
        I: IntoIterator<Item = Result<OrbitalElements, TlefitError>>,
    {
        let mut samples = Vec::new();
        let mut n_iterations = 0;
        let mut n_failed = 0;
        let mut n_degenerate = 0;

        for (iteration, outcome) in outcomes.into_iter().enumerate() {
            n_iterations += 1;
            match outcome {
                Ok(elements) => {
                    if !elements.is_finite() {
                        n_degenerate += 1;
                        warn!(iteration, "bootstrap replica produced non-finite elements");
                    }
                    samples.push(elements.to_array());
                }
                Err(err) => {
                    n_failed += 1;
                    warn!(iteration, error = %err, "bootstrap replica failed");
                }
            }
        }

        if samples.is_empty() {
            return Err(TlefitError::BootstrapExhausted(n_iterations));
        }

        let std_dev = std::array::from_fn(|k| {
            let column: Vec<f64> = samples.iter().map(|s| s[k]).collect();
            nan_std(&column)
        });

        Ok(BootstrapSummary {
            samples,
            std_dev,
            n_iterations,
            n_failed,
            n_degenerate,
        })
    }

    pub fn n_successful(&self) -> usize {
        self.samples.len()
    }

    /// Samples of one element, by array index
    pub fn element_samples(&self, index: usize) -> Vec<f64> {
        self.samples.iter().map(|s| s[index]).collect()
    }

    /// Standard deviations laid out as elements
    pub fn std_dev_elements(&self) -> OrbitalElements {
        OrbitalElements::from_array(self.std_dev)
    }

    /// `(name, std)` pairs in array order
    pub fn named_std_dev(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        ELEMENT_NAMES.iter().copied().zip(self.std_dev.iter().copied())
    }
}

/// Population standard deviation (`ddof = 0`) of the finite values.
///
/// A single value gives `0`, no value gives `NaN`.
pub fn nan_std(values: &[f64]) -> f64 {
    let kept: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if kept.is_empty() {
        return f64::NAN;
    }
    let n = kept.len() as f64;
    let mean = kept.iter().sum::<f64>() / n;
    (kept.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}

/// Random stream of replica `iteration`
pub fn replica_rng(base_seed: u64, iteration: usize) -> StdRng {
    StdRng::seed_from_u64(base_seed ^ (iteration as u64 + 1).wrapping_mul(REPLICA_SEED_MIX))
}

/// Resample and refit one replica
pub fn run_replica<P: Projector + ?Sized>(
    projector: &P,
    observations: &[Observation],
    seed: &FitSeed,
    params: &RefineParams,
    iteration: usize,
) -> Result<FitResult, TlefitError> {
    let mut rng = replica_rng(params.base_seed, iteration);
    let replica = resample(observations, params.bootstrap_sigma_px, &mut rng)?;
    run_once(projector, &replica, seed, params, true, &mut rng)
}

/// Run `params.n_bootstrap` replicas and summarize them.
///
/// Arguments
/// ---------
/// * `projector`: external projection adapter
/// * `observations`: ingested track, left untouched
/// * `seed`: seed elements, bounds and prior record
/// * `params`: optimizer and bootstrap settings
///
/// Return
/// ------
/// * the [`BootstrapSummary`] over the successful replicas, or
///   [`TlefitError::BootstrapExhausted`] when every replica failed.
///
/// See also
/// ------------
/// * [`run_replica`] – one replica.
/// * [`nan_std`] – the per-element statistic.
pub fn run_bootstrap<P: SharedProjector + ?Sized>(
    projector: &P,
    observations: &[Observation],
    seed: &FitSeed,
    params: &RefineParams,
) -> Result<BootstrapSummary, TlefitError> {
    let n = params.n_bootstrap;

    #[cfg(feature = "progress")]
    let progress = std::sync::Mutex::new(BootstrapProgress::new(n));

    let replica = |iteration: usize| {
        let outcome = run_replica(projector, observations, seed, params, iteration)
            .map(|fit| fit.elements);
        #[cfg(feature = "progress")]
        if let Ok(mut bar) = progress.lock() {
            bar.replica_done(outcome.is_ok());
        }
        outcome
    };

    #[cfg(feature = "parallel")]
    let outcomes: Vec<_> = (0..n).into_par_iter().map(replica).collect();
    #[cfg(not(feature = "parallel"))]
    let outcomes: Vec<_> = (0..n).map(replica).collect();

    #[cfg(feature = "progress")]
    if let Ok(bar) = progress.into_inner() {
        bar.finish();
    }

    let summary = BootstrapSummary::from_outcomes(outcomes)?;
    info!(
        successful = summary.n_successful(),
        failed = summary.n_failed,
        degenerate = summary.n_degenerate,
        "bootstrap finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod bootstrap_test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_nan_std() {
        assert_eq!(nan_std(&[3.0]), 0.0);
        assert!(nan_std(&[]).is_nan());
        assert!(nan_std(&[f64::NAN]).is_nan());
        assert_relative_eq!(nan_std(&[1.0, 3.0]), 1.0);
        assert_relative_eq!(nan_std(&[1.0, f64::NAN, 3.0]), 1.0);
        assert_relative_eq!(nan_std(&[1.0, f64::INFINITY, 3.0]), 1.0);
        assert_relative_eq!(nan_std(&[f64::NEG_INFINITY, 1.0, 3.0, f64::NAN]), 1.0);
        assert!(nan_std(&[f64::INFINITY]).is_nan());
    }

    #[test]
    fn test_single_sample_gives_zero_spread() {
        let el = OrbitalElements::new(97.4, 250.0, 0.0015, 80.0, 10.0, 14.85);
        let summary = BootstrapSummary::from_outcomes([Ok(el)]).unwrap();
        assert_eq!(summary.std_dev, [0.0; 6]);
        assert_eq!(summary.n_successful(), 1);
    }

    #[test]
    fn test_failures_are_excluded() {
        let a = OrbitalElements::new(97.0, 250.0, 0.001, 80.0, 10.0, 14.0);
        let b = OrbitalElements::new(99.0, 252.0, 0.003, 82.0, 12.0, 16.0);
        let summary = BootstrapSummary::from_outcomes([
            Ok(a),
            Err(TlefitError::SingularNormalEquations),
            Ok(b),
            Err(TlefitError::ProjectionFailed("behind the camera".into())),
        ])
        .unwrap();

        assert_eq!(summary.n_iterations, 4);
        assert_eq!(summary.n_failed, 2);
        assert_eq!(summary.n_successful(), 2);
        assert_relative_eq!(summary.std_dev[0], 1.0);
        assert_relative_eq!(summary.std_dev[2], 0.001, epsilon = 1e-15);
        assert_relative_eq!(summary.std_dev_elements().mean_motion, 1.0);
    }

    #[test]
    fn test_degenerate_samples_are_ignored_by_the_statistic() {
        let a = OrbitalElements::new(97.0, 250.0, 0.001, 80.0, 10.0, 14.0);
        let b = OrbitalElements::new(99.0, 250.0, 0.001, 80.0, 10.0, 14.0);
        let mut c = b;
        c.inclination = f64::NAN;
        let summary = BootstrapSummary::from_outcomes([Ok(a), Ok(b), Ok(c)]).unwrap();
        assert_eq!(summary.n_degenerate, 1);
        assert_relative_eq!(summary.std_dev[0], 1.0);
        assert_eq!(summary.std_dev[1], 0.0);
    }

    #[test]
    fn test_all_failed() {
        let outcomes: Vec<Result<OrbitalElements, TlefitError>> = Vec::new();
        assert_eq!(
            BootstrapSummary::from_outcomes(outcomes),
            Err(TlefitError::BootstrapExhausted(0))
        );
        assert_eq!(
            BootstrapSummary::from_outcomes([Err(TlefitError::EmptyObservations)]),
            Err(TlefitError::BootstrapExhausted(1))
        );
    }

    #[test]
    fn test_replica_streams_are_distinct() {
        use rand::Rng;
        let a: u64 = replica_rng(42, 0).random();
        let b: u64 = replica_rng(42, 1).random();
        let a_again: u64 = replica_rng(42, 0).random();
        assert_ne!(a, b);
        assert_eq!(a, a_again);
    }
}

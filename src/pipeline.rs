//! # Run-once pipeline
//!
//! [`run_once`] chains every step of a single refinement:
//!
//! 1. refer line 1 of the prior record to the midpoint of the observation window
//!    ([`update_epoch`]);
//! 2. extrapolate the prior mean anomaly to that midpoint and substitute it in the seed
//!    ([`extrapolate_mean_anomaly`]);
//! 3. Stage A then Stage B ([`two_stage`]);
//! 4. regenerate the record, predict the fitted track and analyze the residuals.
//!
//! The bootstrap estimator calls the same function on resampled tracks, so a production fit
//! and a bootstrap replica only differ by their input track, their random stream and the
//! Stage B finite-difference step.
//!
//! [`Refiner`] bundles a projector with its seed and parameters and exposes the three user
//! entry points: [`Refiner::fit`], [`Refiner::bootstrap`] and [`Refiner::report`].

use hifitime::Epoch;
use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::info;

use crate::{
    bootstrap::{run_bootstrap, BootstrapSummary, SharedProjector},
    constants::Pixel,
    elements::OrbitalElements,
    epoch::{
        extrapolate_mean_anomaly, refitted_epoch_record, update_epoch, wrap_degrees, EpochRecord,
    },
    objective::FitProblem,
    observations::{check_track, Observation, TrackExt},
    optimizer::{least_squares::Termination, two_stage, TwoStageSettings},
    projection::Projector,
    record::ElementRecord,
    refine_params::{FitSeed, RefineParams},
    report::FitReport,
    residuals::{analyze_residuals, ResidualStats},
    tlefit_errors::TlefitError,
};

/// Outcome of one refinement.
///
/// Fields
/// -----------------
/// * `elements` – refined elements, angles as returned by the solver (not wrapped)
/// * `epoch_record` – epoch day of the window midpoint with the refined mean anomaly (wrapped
///   into `[0, 360)`) and mean motion
/// * `record` – updated two-line record
/// * `predicted_x`, `predicted_y` – fitted track, one point per observation
/// * `stats` – residual analysis of the fitted track
/// * `midpoint` – epoch of the updated record
/// * `stage_a_cost` – objective value at the Stage A optimum
/// * `cost` – objective value at the refined elements
/// * `termination` – stopping reason of Stage B
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    pub elements: OrbitalElements,
    pub epoch_record: EpochRecord,
    pub record: ElementRecord,
    pub predicted_x: Vec<Pixel>,
    pub predicted_y: Vec<Pixel>,
    pub stats: ResidualStats,
    pub midpoint: Epoch,
    pub stage_a_cost: f64,
    pub cost: f64,
    pub termination: Termination,
}

impl FitResult {
    /// `true` when the elements and the residual statistics are finite numbers
    pub fn is_finite(&self) -> bool {
        self.elements.is_finite() && self.stats.is_finite()
    }
}

/// Refine the seed against one observed track.
///
/// Arguments
/// ---------
/// * `projector`: external projection adapter
/// * `observations`: ingested track, chronological, at least two points
/// * `seed`: seed elements, bounds and prior record
/// * `params`: optimizer settings
/// * `bootstrap`: selects the bootstrap finite-difference step of Stage B
/// * `rng`: random stream of this run
///
/// Return
/// ------
/// * a [`FitResult`], or the first error of any step. A failure concerns this run only.
pub fn run_once<P: Projector + ?Sized>(
    projector: &P,
    observations: &[Observation],
    seed: &FitSeed,
    params: &RefineParams,
    bootstrap: bool,
    rng: &mut impl Rng,
) -> Result<FitResult, TlefitError> {
    check_track(observations)?;
    if observations.len() < 2 {
        return Err(TlefitError::InsufficientObservations {
            required: 2,
            found: observations.len(),
        });
    }

    let times = observations.times();
    let observed_x = observations.pixels_x();
    let observed_y = observations.pixels_y();

    let prior_epoch = seed.prior.epoch_record()?;
    let template = seed.template()?;
    let (line1, midpoint) = update_epoch(&seed.prior.line1, &times)?;

    let seed_elements = OrbitalElements {
        mean_anomaly: extrapolate_mean_anomaly(&prior_epoch, &midpoint),
        ..seed.elements
    };

    let problem = FitProblem::new(projector, template, &line1, &times, &observed_x, &observed_y)?;
    let settings = TwoStageSettings::from_params(params, bootstrap);
    let solution = two_stage(&problem, &seed_elements, &seed.bounds, &settings, rng)?;

    let elements = solution.elements();
    let record = problem.encode(&elements)?;
    let (predicted_x, predicted_y) = problem.predict(&elements)?;
    let cost = problem.evaluate(&elements)?;
    let stats = analyze_residuals(
        &observed_x,
        &observed_y,
        &predicted_x,
        &predicted_y,
        params.bootstrap_sigma_px,
    )?;

    Ok(FitResult {
        elements,
        epoch_record: refitted_epoch_record(
            &midpoint,
            wrap_degrees(elements.mean_anomaly),
            elements.mean_motion,
        ),
        record,
        predicted_x,
        predicted_y,
        stats,
        midpoint,
        stage_a_cost: solution.stage_a.cost,
        cost,
        termination: solution.stage_b.termination,
    })
}

/// A projector bound to its seed and settings.
///
/// ```rust,no_run
/// # use tlefit::pipeline::Refiner;
/// # use tlefit::refine_params::{FitSeed, RefineParams};
/// # use tlefit::observations::Observations;
/// # fn demo<P: tlefit::projection::Projector + Sync>(projector: P, seed: FitSeed, track: Observations) -> Result<(), tlefit::tlefit_errors::TlefitError> {
/// let refiner = Refiner::new(projector, seed, RefineParams::default());
/// let report = refiner.report(&track)?;
/// println!("{report}");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Refiner<P> {
    projector: P,
    seed: FitSeed,
    params: RefineParams,
}

impl<P: Projector> Refiner<P> {
    pub fn new(projector: P, seed: FitSeed, params: RefineParams) -> Self {
        Refiner {
            projector,
            seed,
            params,
        }
    }

    pub fn projector(&self) -> &P {
        &self.projector
    }

    pub fn seed(&self) -> &FitSeed {
        &self.seed
    }

    pub fn params(&self) -> &RefineParams {
        &self.params
    }

    /// Production fit, random stream seeded with `base_seed`
    pub fn fit(&self, observations: &[Observation]) -> Result<FitResult, TlefitError> {
        let mut rng = StdRng::seed_from_u64(self.params.base_seed);
        let result = run_once(
            &self.projector,
            observations,
            &self.seed,
            &self.params,
            false,
            &mut rng,
        )?;
        info!(
            total_rms = result.stats.total_rms,
            termination = ?result.termination,
            "production fit finished"
        );
        Ok(result)
    }
}

impl<P: SharedProjector> Refiner<P> {
    /// Bootstrap uncertainty of the elements, see [`run_bootstrap`]
    pub fn bootstrap(&self, observations: &[Observation]) -> Result<BootstrapSummary, TlefitError> {
        run_bootstrap(&self.projector, observations, &self.seed, &self.params)
    }

    /// Production fit followed by the bootstrap, gathered in a [`FitReport`]
    pub fn report(&self, observations: &[Observation]) -> Result<FitReport, TlefitError> {
        let fit = self.fit(observations)?;
        let uncertainty = self.bootstrap(observations)?;
        Ok(FitReport::new(fit, uncertainty, observations))
    }
}

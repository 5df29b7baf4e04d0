//! # Two-stage orbit optimizer
//!
//! | Stage | Module | Parameters | Method |
//! |-------|--------|------------|--------|
//! | A | [`basin_hopping`] | `(ω, Ω, M)` | basin hopping + Nelder–Mead, bound acceptance test |
//! | B | [`least_squares`] | all six, as factors | projected Levenberg–Marquardt |
//!
//! Stage A searches the angles that a prior record constrains least. Its optimum, together
//! with the seed inclination, eccentricity and mean motion, becomes the reference vector of
//! Stage B.
//!
//! The mean-anomaly bound is derived from the seed: `M_seed ± MEAN_ANOMALY_WINDOW`, where
//! `M_seed` is the prior mean anomaly extrapolated to the observation window.

pub mod basin_hopping;
pub mod least_squares;

use rand::Rng;

use crate::{
    constants::MEAN_ANOMALY_WINDOW,
    elements::{Bound, ElementBounds, OrbitalElements},
    objective::FitProblem,
    projection::Projector,
    refine_params::RefineParams,
    tlefit_errors::TlefitError,
};

use self::{
    basin_hopping::{basin_hopping, AngleBounds, BasinHoppingResult, BasinHoppingSettings},
    least_squares::{bounded_least_squares, LeastSquaresResult, LeastSquaresSettings},
};

/// Settings of both stages for one run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TwoStageSettings {
    pub basin_hopping: BasinHoppingSettings,
    pub least_squares: LeastSquaresSettings,
}

impl TwoStageSettings {
    /// Settings of a production fit (`bootstrap == false`) or of a bootstrap replica.
    ///
    /// The two only differ by the finite-difference step of Stage B.
    pub fn from_params(params: &RefineParams, bootstrap: bool) -> Self {
        TwoStageSettings {
            basin_hopping: BasinHoppingSettings {
                n_hops: params.n_hops,
                local_max_iters: params.local_max_iters,
                hop_step: params.hop_step,
                temperature: params.temperature,
            },
            least_squares: LeastSquaresSettings {
                diff_step: params.diff_step_for(bootstrap),
                max_evaluations: params.max_evaluations,
                ftol: params.ftol,
                xtol: params.xtol,
                gtol: params.gtol,
            },
        }
    }
}

/// Output of both stages
#[derive(Debug, Clone, PartialEq)]
pub struct TwoStageSolution {
    pub stage_a: BasinHoppingResult,
    pub stage_b: LeastSquaresResult,
    /// Mean-anomaly window used by both stages
    pub mean_anomaly_bound: Bound,
}

impl TwoStageSolution {
    pub fn elements(&self) -> OrbitalElements {
        self.stage_b.elements
    }
}

/// Run Stage A then Stage B from `seed`.
///
/// Arguments
/// ---------
/// * `problem`: run context
/// * `seed`: seed elements whose mean anomaly is already referred to the window midpoint
/// * `bounds`: configured element box
/// * `settings`: per-stage settings
/// * `rng`: random stream of the run (Stage A perturbations)
pub fn two_stage<P: Projector + ?Sized>(
    problem: &FitProblem<'_, P>,
    seed: &OrbitalElements,
    bounds: &ElementBounds,
    settings: &TwoStageSettings,
    rng: &mut impl Rng,
) -> Result<TwoStageSolution, TlefitError> {
    let mean_anomaly_bound = Bound::around(seed.mean_anomaly, MEAN_ANOMALY_WINDOW);

    let angle_bounds = AngleBounds {
        arg_of_perigee: bounds.arg_of_perigee,
        raan: bounds.raan,
        mean_anomaly: mean_anomaly_bound,
    };
    let stage_a = basin_hopping(problem, seed, &angle_bounds, &settings.basin_hopping, rng)?;

    let reference = stage_a.apply_to(seed).to_array();
    let stage_b = bounded_least_squares(
        problem,
        &reference,
        &bounds.to_array(mean_anomaly_bound),
        &settings.least_squares,
    )?;

    Ok(TwoStageSolution {
        stage_a,
        stage_b,
        mean_anomaly_bound,
    })
}

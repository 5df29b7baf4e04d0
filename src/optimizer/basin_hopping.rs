//! # Stage A: basin hopping over the node, perigee and anomaly angles
//!
//! Global stochastic search over `(ω, Ω, M)` with inclination, eccentricity and mean motion
//! frozen at the seed. Each hop perturbs the current point uniformly in `±hop_step` degrees
//! and descends with a Nelder–Mead simplex (`argmin`) on a penalized cost:
//!
//! ```text
//! cost(x) = objective(x) + PENALTY_WEIGHT · Σ violation_k(x)²
//! ```
//!
//! where `violation_k` is the distance of coordinate `k` to its `[min, max]` interval.
//!
//! A local minimum with any coordinate outside its interval is **rejected**. An in-bounds
//! minimum replaces the current point under the Metropolis rule at the configured
//! temperature; the best in-bounds point seen so far is always kept.

use argmin::core::{CostFunction, Error as ArgminError, Executor};
use argmin::solver::neldermead::NelderMead;
use rand::Rng;
use tracing::{debug, info};

use crate::{
    constants::Degree,
    elements::{Bound, OrbitalElements},
    objective::FitProblem,
    projection::Projector,
    tlefit_errors::TlefitError,
};

/// Weight of the quadratic bound-violation penalty (pixel² per degree²)
pub const PENALTY_WEIGHT: f64 = 1.0e6;

/// Edge length of the initial Nelder–Mead simplex, in degrees
pub const SIMPLEX_STEP: Degree = 1.0;

/// Standard-deviation tolerance of the simplex costs
const SIMPLEX_SD_TOLERANCE: f64 = 1.0e-12;

/// Search box of Stage A, in parameter order `(ω, Ω, M)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngleBounds {
    pub arg_of_perigee: Bound,
    pub raan: Bound,
    pub mean_anomaly: Bound,
}

impl AngleBounds {
    fn as_array(&self) -> [Bound; 3] {
        [self.arg_of_perigee, self.raan, self.mean_anomaly]
    }

    pub fn contains(&self, x: &[f64]) -> bool {
        x.len() == 3
            && self
                .as_array()
                .iter()
                .zip(x)
                .all(|(bound, value)| bound.contains(*value))
    }

    /// Sum of squared distances to the box
    pub fn squared_violation(&self, x: &[f64]) -> f64 {
        self.as_array()
            .iter()
            .zip(x)
            .map(|(bound, value)| bound.violation(*value).powi(2))
            .sum()
    }
}

/// Budget and acceptance settings of a basin-hopping run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BasinHoppingSettings {
    pub n_hops: usize,
    pub local_max_iters: u64,
    pub hop_step: Degree,
    pub temperature: f64,
}

/// Best `(ω, Ω, M)` found by Stage A.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BasinHoppingResult {
    pub arg_of_perigee: Degree,
    pub raan: Degree,
    pub mean_anomaly: Degree,
    /// Objective value (not penalized) at the best point
    pub cost: f64,
    /// Hops whose local minimum passed the bound test
    pub accepted_hops: usize,
    /// Hops whose local minimum left the box
    pub rejected_hops: usize,
}

impl BasinHoppingResult {
    /// Seed elements with the three angles replaced by the Stage A optimum
    pub fn apply_to(&self, seed: &OrbitalElements) -> OrbitalElements {
        OrbitalElements {
            arg_of_perigee: self.arg_of_perigee,
            raan: self.raan,
            mean_anomaly: self.mean_anomaly,
            ..*seed
        }
    }
}

/// Penalized objective seen by the Nelder–Mead solver.
struct PenalizedAngles<'p, 'a, P: ?Sized> {
    problem: &'p FitProblem<'a, P>,
    seed: OrbitalElements,
    bounds: AngleBounds,
}

impl<P: Projector + ?Sized> PenalizedAngles<'_, '_, P> {
    fn candidate(&self, x: &[f64]) -> OrbitalElements {
        OrbitalElements {
            arg_of_perigee: x[0],
            raan: x[1],
            mean_anomaly: x[2],
            ..self.seed
        }
    }
}

impl<P: Projector + ?Sized> CostFunction for PenalizedAngles<'_, '_, P> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, param: &Self::Param) -> Result<Self::Output, ArgminError> {
        let objective = self.problem.evaluate(&self.candidate(param))?;
        let penalized = objective + PENALTY_WEIGHT * self.bounds.squared_violation(param);
        // the simplex ordering needs a total order on costs
        if penalized.is_finite() {
            Ok(penalized)
        } else {
            Ok(f64::INFINITY)
        }
    }
}

/// Recover the crate error carried through `argmin`, if any.
fn from_argmin(err: ArgminError) -> TlefitError {
    match err.downcast::<TlefitError>() {
        Ok(inner) => inner,
        Err(other) => TlefitError::LocalSolverFailed(other.to_string()),
    }
}

/// One Nelder–Mead descent from `start`.
///
/// Return
/// ------
/// * the best vertex and its **unpenalized** objective value
fn local_minimize<P: Projector + ?Sized>(
    cost: PenalizedAngles<'_, '_, P>,
    start: [f64; 3],
    max_iters: u64,
) -> Result<([f64; 3], f64), TlefitError> {
    let mut simplex = vec![start.to_vec()];
    for k in 0..3 {
        let mut vertex = start.to_vec();
        vertex[k] += SIMPLEX_STEP;
        simplex.push(vertex);
    }

    let solver: NelderMead<Vec<f64>, f64> = NelderMead::new(simplex)
        .with_sd_tolerance(SIMPLEX_SD_TOLERANCE)
        .map_err(from_argmin)?;

    let problem = cost.problem;
    let seed = cost.seed;
    let res = Executor::new(cost, solver)
        .configure(|state| state.max_iters(max_iters))
        .run()
        .map_err(from_argmin)?;

    let best = match res.state().best_param.as_ref() {
        Some(p) if p.len() == 3 => [p[0], p[1], p[2]],
        _ => start,
    };
    let objective = problem.evaluate(&OrbitalElements {
        arg_of_perigee: best[0],
        raan: best[1],
        mean_anomaly: best[2],
        ..seed
    })?;

    Ok((best, objective))
}

/// Metropolis acceptance of a move from `current` to `trial`
fn metropolis(current: f64, trial: f64, temperature: f64, rng: &mut impl Rng) -> bool {
    if !trial.is_finite() {
        return false;
    }
    if trial <= current || !current.is_finite() {
        return true;
    }
    rng.random::<f64>() < (-(trial - current) / temperature).exp()
}

/// Run Stage A.
///
/// Arguments
/// ---------
/// * `problem`: run context
/// * `seed`: seed elements, with the epoch-extrapolated mean anomaly already substituted
/// * `bounds`: box on `(ω, Ω, M)`
/// * `settings`: hop budget, local iteration cap, step and temperature
/// * `rng`: random stream of the run
///
/// Return
/// ------
/// * the best in-bounds `(ω, Ω, M)` found, never worse than the seed. If nothing in the box
///   improves on the seed, the seed angles are returned unchanged.
/// * objective errors and `argmin` failures are propagated.
pub fn basin_hopping<P: Projector + ?Sized>(
    problem: &FitProblem<'_, P>,
    seed: &OrbitalElements,
    bounds: &AngleBounds,
    settings: &BasinHoppingSettings,
    rng: &mut impl Rng,
) -> Result<BasinHoppingResult, TlefitError> {
    let cost = || PenalizedAngles {
        problem,
        seed: *seed,
        bounds: *bounds,
    };

    let seed_x = [seed.arg_of_perigee, seed.raan, seed.mean_anomaly];
    let seed_cost = problem.evaluate(seed)?;
    let mut best = (seed_x, seed_cost);

    let (x0, f0) = local_minimize(cost(), seed_x, settings.local_max_iters)?;
    let mut current = if bounds.contains(&x0) {
        if f0 < best.1 || !best.1.is_finite() {
            best = (x0, f0);
        }
        (x0, f0)
    } else {
        (seed_x, seed_cost)
    };

    let mut accepted_hops = 0;
    let mut rejected_hops = 0;

    for hop in 0..settings.n_hops {
        let mut trial = current.0;
        for value in trial.iter_mut() {
            *value += settings.hop_step * rng.random_range(-1.0_f64..=1.0);
        }

        let (x, f) = local_minimize(cost(), trial, settings.local_max_iters)?;

        if !bounds.contains(&x) || !f.is_finite() {
            rejected_hops += 1;
            continue;
        }
        accepted_hops += 1;

        if f < best.1 || !best.1.is_finite() {
            debug!(hop, cost = f, "basin hopping: new best");
            best = (x, f);
        }
        if metropolis(current.1, f, settings.temperature, rng) {
            current = (x, f);
        }
    }

    info!(
        cost = best.1,
        accepted_hops, rejected_hops, "basin hopping finished"
    );

    Ok(BasinHoppingResult {
        arg_of_perigee: best.0[0],
        raan: best.0[1],
        mean_anomaly: best.0[2],
        cost: best.1,
        accepted_hops,
        rejected_hops,
    })
}

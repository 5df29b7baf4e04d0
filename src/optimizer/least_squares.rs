//! # Stage B: bounded nonlinear least squares on element factors
//!
//! All six elements are refined together. Each element is written as a multiplicative factor
//! of a reference value,
//!
//! ```text
//! element_k = x_k · reference_k,      x⁰ = (1, 1, 1, 1, 1, 1)
//! ```
//!
//! so that every parameter starts at unity whatever its physical scale. The bounds of the
//! element box become `[min_k / ref_k, max_k / ref_k]` on `x_k` (swapped when `ref_k < 0`).
//!
//! ## Solver
//!
//! Projected Levenberg–Marquardt:
//!
//! 1. forward-difference Jacobian `J` of the residual vector, relative step
//!    `h_k = diff_step · max(1, |x_k|)`, taken backwards when the forward point leaves the box;
//! 2. damped normal equations `(JᵀJ + λ·diag(JᵀJ)) δ = −Jᵀr`, solved by Cholesky;
//! 3. `x ← clip(x + δ)` to the box; the step is kept only if the cost `½‖r‖²` decreases
//!    (then `λ ← λ/10`), otherwise `λ ← 10·λ` and the system is solved again.
//!
//! The iteration stops on a zero cost, on the `ftol` (relative cost decrease), `xtol`
//! (relative step) or `gtol` (projected gradient) tests, or when `max_evaluations` residual
//! evaluations (Jacobian columns included) have been spent.

use nalgebra::{DMatrix, DVector};
use tracing::{debug, info};

use crate::{
    elements::{Bound, OrbitalElements},
    objective::FitProblem,
    projection::Projector,
    tlefit_errors::TlefitError,
};

const INITIAL_DAMPING: f64 = 1.0e-3;
const MIN_DAMPING: f64 = 1.0e-12;
const MAX_DAMPING: f64 = 1.0e16;
/// Floor of the Marquardt scaling for parameters the residuals do not depend on
const MIN_SCALE: f64 = 1.0e-12;

/// Tolerances and budget of Stage B
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeastSquaresSettings {
    pub diff_step: f64,
    pub max_evaluations: usize,
    pub ftol: f64,
    pub xtol: f64,
    pub gtol: f64,
}

/// Why Stage B stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    ZeroCost,
    Ftol,
    Xtol,
    Gtol,
    MaxEvaluations,
    /// The damping saturated without finding a decreasing step
    Stalled,
    /// The residuals at the starting point are not finite
    NonFiniteStart,
}

/// Outcome of Stage B.
#[derive(Debug, Clone, PartialEq)]
pub struct LeastSquaresResult {
    /// Final multiplicative factors, in element order
    pub factors: [f64; 6],
    /// `factors ⊙ reference`
    pub elements: OrbitalElements,
    /// `½‖r‖²` at the solution
    pub cost: f64,
    pub evaluations: usize,
    pub iterations: usize,
    pub termination: Termination,
}

/// Bounds on the factors derived from the element box.
///
/// Return
/// ------
/// * [`TlefitError::InvalidRefineParameter`] if a reference value is zero or not finite.
pub fn factor_bounds(reference: &[f64; 6], bounds: &[Bound; 6]) -> Result<[Bound; 6], TlefitError> {
    let mut out = [Bound::new(0.0, 0.0); 6];
    for (k, (r, b)) in reference.iter().zip(bounds).enumerate() {
        if *r == 0.0 || !r.is_finite() {
            return Err(TlefitError::InvalidRefineParameter(format!(
                "reference value of element {k} is {r}, factors need a non-zero reference"
            )));
        }
        let (lo, hi) = (b.min / r, b.max / r);
        out[k] = if *r < 0.0 {
            Bound::new(hi, lo)
        } else {
            Bound::new(lo, hi)
        };
    }
    Ok(out)
}

fn clip(x: &DVector<f64>, bounds: &[Bound; 6]) -> DVector<f64> {
    DVector::from_fn(6, |k, _| x[k].clamp(bounds[k].min, bounds[k].max))
}

fn to_elements(x: &DVector<f64>, reference: &[f64; 6]) -> OrbitalElements {
    OrbitalElements::from_array(std::array::from_fn(|k| x[k] * reference[k]))
}

/// Finite-difference step of parameter `k`, kept inside the box.
fn fd_step(value: f64, bound: &Bound, diff_step: f64) -> f64 {
    let h = diff_step * value.abs().max(1.0);
    if value + h <= bound.max {
        h
    } else if value - h >= bound.min {
        -h
    } else if bound.max - value >= value - bound.min {
        bound.max - value
    } else {
        bound.min - value
    }
}

/// Residual vector and evaluation counter of one Stage B run
struct Residuals<'p, 'a, P: ?Sized> {
    problem: &'p FitProblem<'a, P>,
    reference: [f64; 6],
    evaluations: usize,
}

impl<P: Projector + ?Sized> Residuals<'_, '_, P> {
    fn at(&mut self, x: &DVector<f64>) -> Result<DVector<f64>, TlefitError> {
        self.evaluations += 1;
        self.problem.residuals(&to_elements(x, &self.reference))
    }

    fn jacobian(
        &mut self,
        x: &DVector<f64>,
        r: &DVector<f64>,
        bounds: &[Bound; 6],
        diff_step: f64,
    ) -> Result<DMatrix<f64>, TlefitError> {
        let mut jac = DMatrix::zeros(r.len(), 6);
        for k in 0..6 {
            let h = fd_step(x[k], &bounds[k], diff_step);
            if h == 0.0 {
                continue;
            }
            let mut shifted = x.clone();
            shifted[k] += h;
            let r_shifted = self.at(&shifted)?;
            jac.set_column(k, &((r_shifted - r) / h));
        }
        Ok(jac)
    }
}

/// Gradient with the components pushing out of an active bound removed
fn projected_gradient_norm(g: &DVector<f64>, x: &DVector<f64>, bounds: &[Bound; 6]) -> f64 {
    (0..6)
        .map(|k| {
            let at_min = x[k] <= bounds[k].min && g[k] > 0.0;
            let at_max = x[k] >= bounds[k].max && g[k] < 0.0;
            if at_min || at_max {
                0.0
            } else {
                g[k].abs()
            }
        })
        .fold(0.0, f64::max)
}

/// Run Stage B.
///
/// Arguments
/// ---------
/// * `problem`: run context
/// * `reference`: reference element values `(i, Ω, e, ω, M, n)`
/// * `bounds`: element box, same order
/// * `settings`: finite-difference step, evaluation budget and tolerances
///
/// Return
/// ------
/// * the refined factors and elements
/// * [`TlefitError::InvalidRefineParameter`] for a zero reference value,
///   [`TlefitError::InfeasibleStart`] when the reference itself lies outside the box,
///   [`TlefitError::SingularNormalEquations`] when the Jacobian is not finite,
///   and any objective error.
pub fn bounded_least_squares<P: Projector + ?Sized>(
    problem: &FitProblem<'_, P>,
    reference: &[f64; 6],
    bounds: &[Bound; 6],
    settings: &LeastSquaresSettings,
) -> Result<LeastSquaresResult, TlefitError> {
    let fbounds = factor_bounds(reference, bounds)?;

    let mut x = DVector::from_element(6, 1.0);
    if let Some(k) = (0..6).find(|&k| !fbounds[k].contains(1.0)) {
        return Err(TlefitError::InfeasibleStart(format!(
            "element {k} reference {} outside [{}, {}]",
            reference[k], bounds[k].min, bounds[k].max
        )));
    }

    let mut residuals = Residuals {
        problem,
        reference: *reference,
        evaluations: 0,
    };

    let mut r = residuals.at(&x)?;
    let mut cost = 0.5 * r.norm_squared();
    let mut lambda = INITIAL_DAMPING;
    let mut iterations = 0;

    let finish = |x: &DVector<f64>,
                  cost: f64,
                  evaluations: usize,
                  iterations: usize,
                  termination: Termination| {
        info!(cost, evaluations, ?termination, "bounded least squares finished");
        LeastSquaresResult {
            factors: std::array::from_fn(|k| x[k]),
            elements: to_elements(x, reference),
            cost,
            evaluations,
            iterations,
            termination,
        }
    };

    if !cost.is_finite() {
        return Ok(finish(&x, cost, residuals.evaluations, 0, Termination::NonFiniteStart));
    }

    loop {
        if cost == 0.0 {
            return Ok(finish(&x, cost, residuals.evaluations, iterations, Termination::ZeroCost));
        }
        if residuals.evaluations + 6 > settings.max_evaluations {
            return Ok(finish(
                &x,
                cost,
                residuals.evaluations,
                iterations,
                Termination::MaxEvaluations,
            ));
        }

        let jac = residuals.jacobian(&x, &r, &fbounds, settings.diff_step)?;
        if jac.iter().any(|v| !v.is_finite()) {
            return Err(TlefitError::SingularNormalEquations);
        }

        let gradient = jac.tr_mul(&r);
        if projected_gradient_norm(&gradient, &x, &fbounds) <= settings.gtol {
            return Ok(finish(&x, cost, residuals.evaluations, iterations, Termination::Gtol));
        }

        let normal = jac.tr_mul(&jac);
        let scale = DVector::from_fn(6, |k, _| normal[(k, k)].max(MIN_SCALE));
        iterations += 1;

        // inner loop: raise the damping until a step lowers the cost
        loop {
            if residuals.evaluations >= settings.max_evaluations {
                return Ok(finish(
                    &x,
                    cost,
                    residuals.evaluations,
                    iterations,
                    Termination::MaxEvaluations,
                ));
            }
            if lambda > MAX_DAMPING {
                return Ok(finish(&x, cost, residuals.evaluations, iterations, Termination::Stalled));
            }

            let mut damped = normal.clone();
            for k in 0..6 {
                damped[(k, k)] += lambda * scale[k];
            }

            let Some(chol) = damped.cholesky() else {
                debug!(lambda, "normal equations not positive definite, raising damping");
                lambda *= 10.0;
                if lambda > MAX_DAMPING {
                    return Err(TlefitError::SingularNormalEquations);
                }
                continue;
            };
            let delta = chol.solve(&(-&gradient));

            let x_new = clip(&(&x + &delta), &fbounds);
            let step = &x_new - &x;
            if step.norm() <= settings.xtol * (settings.xtol + x.norm()) {
                return Ok(finish(&x, cost, residuals.evaluations, iterations, Termination::Xtol));
            }

            let r_new = residuals.at(&x_new)?;
            let cost_new = 0.5 * r_new.norm_squared();

            if cost_new.is_finite() && cost_new < cost {
                let reduction = cost - cost_new;
                debug!(iterations, cost = cost_new, lambda, "least squares step accepted");
                x = x_new;
                r = r_new;
                let previous = cost;
                cost = cost_new;
                lambda = (lambda / 10.0).max(MIN_DAMPING);

                if cost > 0.0 && reduction <= settings.ftol * previous {
                    return Ok(finish(&x, cost, residuals.evaluations, iterations, Termination::Ftol));
                }
                break;
            }
            lambda *= 10.0;
        }
    }
}

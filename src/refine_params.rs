//! # Refinement parameters
//!
//! This module defines the two configuration objects of a fit:
//!
//! * [`FitSeed`]: *what* is refined. Seed elements, per-element search bounds and the prior
//!   two-line record (its epoch, catalog id and revolution number).
//! * [`RefineParams`]: *how* it is refined. Iteration budgets and tolerances of both
//!   optimizer stages, bootstrap settings and the clock correction applied at ingestion.
//!
//! ## Pipeline overview
//!
//! 1. **Ingestion**
//!    Detection timestamps are shifted by `timestamp_offset_s` seconds.
//!
//! 2. **Stage A: basin hopping**
//!    `n_hops` perturbations of amplitude `hop_step` over `(ω, Ω, M)`, each followed by a
//!    Nelder–Mead descent capped at `local_max_iters`; Metropolis acceptance at `temperature`.
//!
//! 3. **Stage B: bounded least squares**
//!    Projected Levenberg–Marquardt over the six element factors, finite differences with
//!    relative step `diff_step`, stopped by `ftol` / `xtol` / `gtol` or after
//!    `max_evaluations` residual evaluations.
//!
//! 4. **Bootstrap**
//!    `n_bootstrap` noisy replicas (`bootstrap_sigma_px`) refitted with
//!    `bootstrap_diff_step`, each on its own random stream derived from `base_seed`.
//!
//! ## Example
//!
//! ```rust,no_run
//! use tlefit::refine_params::RefineParams;
//!
//! let params = RefineParams::builder()
//!     .n_hops(50)
//!     .hop_step(0.25)
//!     .n_bootstrap(20)
//!     .base_seed(7)
//!     .build()
//!     .unwrap();
//! println!("{params:#}");
//! ```
use std::cmp::Ordering::{Equal, Greater};
use std::fmt;

use crate::{
    constants::{Degree, Pixel},
    elements::{ElementBounds, OrbitalElements, ELEMENT_NAMES},
    record::{ElementRecord, RecordTemplate},
    tlefit_errors::TlefitError,
};

/// Starting point of a refinement.
///
/// Fields
/// -----------------
/// * `elements` – seed elements. Inclination, eccentricity and mean motion are the Stage B
///   references; the seed mean anomaly is replaced at run time by the value extrapolated from
///   the prior record to the observation window.
/// * `bounds` – search box. The mean-anomaly window is derived at run time.
/// * `prior` – prior two-line record. Line 1 provides the epoch layout, line 2 the catalog id,
///   the revolution number and the epoch mean anomaly / mean motion.
#[derive(Debug, Clone, PartialEq)]
pub struct FitSeed {
    pub elements: OrbitalElements,
    pub bounds: ElementBounds,
    pub prior: ElementRecord,
}

impl FitSeed {
    /// Validate and assemble a seed.
    ///
    /// Return
    /// ------
    /// * [`TlefitError::InvalidRefineParameter`] when an element is not finite or a bound is
    ///   empty or not finite.
    /// * [`TlefitError::MalformedRecord`] when the prior line 2 cannot be decoded.
    pub fn new(
        elements: OrbitalElements,
        bounds: ElementBounds,
        prior: ElementRecord,
    ) -> Result<Self, TlefitError> {
        if !elements.is_finite() {
            return Err(TlefitError::InvalidRefineParameter(
                "seed elements must be finite".into(),
            ));
        }

        let named_bounds = [
            ("inclination", bounds.inclination),
            ("raan", bounds.raan),
            ("eccentricity", bounds.eccentricity),
            ("arg_of_perigee", bounds.arg_of_perigee),
            ("mean_motion", bounds.mean_motion),
        ];
        if let Some((name, _)) = named_bounds.iter().find(|(_, b)| !b.is_valid()) {
            return Err(TlefitError::InvalidRefineParameter(format!(
                "bound on {name} must be finite with min <= max"
            )));
        }

        prior.template()?;

        Ok(FitSeed {
            elements,
            bounds,
            prior,
        })
    }

    /// Seed taken from the elements of the prior record itself
    pub fn from_prior(prior: ElementRecord, bounds: ElementBounds) -> Result<Self, TlefitError> {
        let elements = prior.elements()?;
        FitSeed::new(elements, bounds, prior)
    }

    pub fn template(&self) -> Result<RecordTemplate, TlefitError> {
        self.prior.template()
    }
}

impl fmt::Display for FitSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let seed = self.elements.to_array();
        writeln!(f, "Seed")?;
        writeln!(f, "  {}", self.prior.line1)?;
        writeln!(f, "  {}", self.prior.line2)?;
        for (k, name) in ELEMENT_NAMES.iter().enumerate() {
            let bound = match k {
                0 => Some(self.bounds.inclination),
                1 => Some(self.bounds.raan),
                2 => Some(self.bounds.eccentricity),
                3 => Some(self.bounds.arg_of_perigee),
                5 => Some(self.bounds.mean_motion),
                _ => None,
            };
            match bound {
                Some(b) => writeln!(f, "  {name:<15} = {:>14.8}  in [{}, {}]", seed[k], b.min, b.max)?,
                None => writeln!(f, "  {name:<15} = {:>14.8}  (derived from prior epoch)", seed[k])?,
            }
        }
        Ok(())
    }
}

/// Tuning of the two optimizer stages and of the bootstrap.
///
/// Fields
/// -----------------
/// **Stage A: basin hopping**
/// * `n_hops` – number of perturb-and-minimize hops after the initial local descent.
/// * `local_max_iters` – iteration cap of each Nelder–Mead descent.
/// * `hop_step` – half-width (degrees) of the uniform perturbation applied to `(ω, Ω, M)`.
/// * `temperature` – Metropolis temperature, in objective units (pixel²).
///
/// **Stage B: bounded least squares**
/// * `diff_step` – relative finite-difference step of the Jacobian on production fits.
/// * `bootstrap_diff_step` – same, on bootstrap replicas.
/// * `max_evaluations` – residual evaluation budget (Jacobian columns included).
/// * `ftol`, `xtol`, `gtol` – relative cost, relative step and gradient tolerances.
///
/// **Bootstrap**
/// * `n_bootstrap` – number of noisy replicas.
/// * `bootstrap_sigma_px` – per-coordinate Gaussian noise injected in each replica (pixels),
///   also the σ used by the reduced chi-square.
/// * `base_seed` – root of the per-replica random streams.
///
/// **Ingestion**
/// * `timestamp_offset_s` – clock correction added to every detection timestamp (seconds).
///
/// Defaults
/// -----------------
/// See [`Default`] for `RefineParams`.
#[derive(Debug, Clone, PartialEq)]
pub struct RefineParams {
    // Stage A
    pub n_hops: usize,
    pub local_max_iters: u64,
    pub hop_step: Degree,
    pub temperature: f64,

    // Stage B
    pub diff_step: f64,
    pub bootstrap_diff_step: f64,
    pub max_evaluations: usize,
    pub ftol: f64,
    pub xtol: f64,
    pub gtol: f64,

    // Bootstrap
    pub n_bootstrap: usize,
    pub bootstrap_sigma_px: Pixel,
    pub base_seed: u64,

    // Ingestion
    pub timestamp_offset_s: f64,
}

impl RefineParams {
    /// Create a new [`RefineParamsBuilder`] initialized with the default values.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use tlefit::refine_params::RefineParams;
    ///
    /// let params = RefineParams::builder()
    ///     .max_evaluations(500)
    ///     .timestamp_offset_s(0.0)
    ///     .build()
    ///     .unwrap();
    /// ```
    pub fn builder() -> RefineParamsBuilder {
        RefineParamsBuilder::new()
    }

    /// Finite-difference step for a production fit or a bootstrap replica
    pub fn diff_step_for(&self, bootstrap: bool) -> f64 {
        if bootstrap {
            self.bootstrap_diff_step
        } else {
            self.diff_step
        }
    }
}

impl Default for RefineParams {
    fn default() -> Self {
        RefineParams {
            // Stage A
            n_hops: 100,
            local_max_iters: 200,
            hop_step: 0.5,
            temperature: 1.0,

            // Stage B
            diff_step: 1.0,
            bootstrap_diff_step: 0.01,
            max_evaluations: 200,
            ftol: 1e-10,
            xtol: 1e-10,
            gtol: 1e-10,

            // Bootstrap
            n_bootstrap: 100,
            bootstrap_sigma_px: 1.0,
            base_seed: 42,

            // Ingestion: detector clock runs one second ahead of UTC
            timestamp_offset_s: -1.0,
        }
    }
}

/// Builder for [`RefineParams`], with validation.
#[derive(Debug, Clone)]
pub struct RefineParamsBuilder {
    params: RefineParams,
}

impl Default for RefineParamsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RefineParamsBuilder {
    pub fn new() -> Self {
        Self {
            params: RefineParams::default(),
        }
    }

    // --- Stage A ---
    pub fn n_hops(mut self, v: usize) -> Self {
        self.params.n_hops = v;
        self
    }
    pub fn local_max_iters(mut self, v: u64) -> Self {
        self.params.local_max_iters = v;
        self
    }
    pub fn hop_step(mut self, v: Degree) -> Self {
        self.params.hop_step = v;
        self
    }
    pub fn temperature(mut self, v: f64) -> Self {
        self.params.temperature = v;
        self
    }

    // --- Stage B ---
    pub fn diff_step(mut self, v: f64) -> Self {
        self.params.diff_step = v;
        self
    }
    pub fn bootstrap_diff_step(mut self, v: f64) -> Self {
        self.params.bootstrap_diff_step = v;
        self
    }
    pub fn max_evaluations(mut self, v: usize) -> Self {
        self.params.max_evaluations = v;
        self
    }
    pub fn ftol(mut self, v: f64) -> Self {
        self.params.ftol = v;
        self
    }
    pub fn xtol(mut self, v: f64) -> Self {
        self.params.xtol = v;
        self
    }
    pub fn gtol(mut self, v: f64) -> Self {
        self.params.gtol = v;
        self
    }

    // --- Bootstrap ---
    pub fn n_bootstrap(mut self, v: usize) -> Self {
        self.params.n_bootstrap = v;
        self
    }
    pub fn bootstrap_sigma_px(mut self, v: Pixel) -> Self {
        self.params.bootstrap_sigma_px = v;
        self
    }
    pub fn base_seed(mut self, v: u64) -> Self {
        self.params.base_seed = v;
        self
    }

    // --- Ingestion ---
    pub fn timestamp_offset_s(mut self, v: f64) -> Self {
        self.params.timestamp_offset_s = v;
        self
    }

    /// Return true iff x > 0.0 and comparable (i.e., not NaN).
    #[inline]
    fn gt0(x: f64) -> bool {
        x.partial_cmp(&0.0) == Some(Greater) && x.is_finite()
    }

    /// Return true iff x >= 0.0 and comparable (i.e., not NaN).
    #[inline]
    fn ge0(x: f64) -> bool {
        matches!(x.partial_cmp(&0.0), Some(Greater) | Some(Equal)) && x.is_finite()
    }

    /// Finalize the builder and produce a [`RefineParams`] instance.
    ///
    /// Validation rules
    /// -----------------
    /// * `local_max_iters ≥ 1`, `max_evaluations ≥ 1`, `n_bootstrap ≥ 1`.
    /// * `hop_step ≥ 0`, `bootstrap_sigma_px ≥ 0`, `ftol`, `xtol`, `gtol ≥ 0`.
    /// * `temperature > 0`, `diff_step > 0`, `bootstrap_diff_step > 0`.
    /// * `timestamp_offset_s` finite.
    ///
    /// Special cases
    /// -----------------
    /// **`n_hops = 0`**
    /// * Allowed. Stage A then reduces to a single Nelder–Mead descent from the seed.
    ///
    /// Returns
    /// -----------------
    /// * `Ok(RefineParams)` if all values are valid.
    /// * `Err(TlefitError::InvalidRefineParameter)` naming the first rule that fails.
    pub fn build(self) -> Result<RefineParams, TlefitError> {
        let p = &self.params;

        // --- Iteration counts (>= 1) ---
        if p.local_max_iters == 0 {
            return Err(TlefitError::InvalidRefineParameter(
                "local_max_iters must be >= 1".into(),
            ));
        }
        if p.max_evaluations == 0 {
            return Err(TlefitError::InvalidRefineParameter(
                "max_evaluations must be >= 1".into(),
            ));
        }
        if p.n_bootstrap == 0 {
            return Err(TlefitError::InvalidRefineParameter(
                "n_bootstrap must be >= 1".into(),
            ));
        }

        // --- Non-negativity (accept zero) ---
        if !Self::ge0(p.hop_step) {
            return Err(TlefitError::InvalidRefineParameter(
                "hop_step must be non-negative".into(),
            ));
        }
        if !Self::ge0(p.bootstrap_sigma_px) {
            return Err(TlefitError::InvalidRefineParameter(
                "bootstrap_sigma_px must be non-negative".into(),
            ));
        }
        if !Self::ge0(p.ftol) || !Self::ge0(p.xtol) || !Self::ge0(p.gtol) {
            return Err(TlefitError::InvalidRefineParameter(
                "solver tolerances must be non-negative".into(),
            ));
        }

        // --- Strictly positive ---
        if !Self::gt0(p.temperature) {
            return Err(TlefitError::InvalidRefineParameter(
                "temperature must be > 0".into(),
            ));
        }
        if !Self::gt0(p.diff_step) || !Self::gt0(p.bootstrap_diff_step) {
            return Err(TlefitError::InvalidRefineParameter(
                "finite-difference steps must be > 0".into(),
            ));
        }

        if !p.timestamp_offset_s.is_finite() {
            return Err(TlefitError::InvalidRefineParameter(
                "timestamp_offset_s must be finite".into(),
            ));
        }

        Ok(self.params)
    }
}

impl fmt::Display for RefineParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            const PARAM_COL: usize = 44; // width reserved for "name = value"
            writeln!(f, "Orbit Refinement Parameters")?;
            writeln!(f, "---------------------------")?;

            macro_rules! line {
                ($fmt:expr, $val:expr, $comment:expr) => {{
                    let s = format!($fmt, $val);
                    let pad = if s.len() < PARAM_COL {
                        " ".repeat(PARAM_COL - s.len())
                    } else {
                        " ".to_string()
                    };
                    writeln!(f, "  {}{}# {}", s, pad, $comment)
                }};
            }

            writeln!(f, "[Stage A: basin hopping]")?;
            line!("n_hops              = {}", self.n_hops, "Perturb-and-minimize hops")?;
            line!(
                "local_max_iters     = {}",
                self.local_max_iters,
                "Nelder-Mead iterations per descent"
            )?;
            line!(
                "hop_step            = {:.3} deg",
                self.hop_step,
                "Uniform perturbation half-width"
            )?;
            line!(
                "temperature         = {:.3}",
                self.temperature,
                "Metropolis temperature (px^2)"
            )?;

            writeln!(f, "\n[Stage B: bounded least squares]")?;
            line!(
                "diff_step           = {:.3e}",
                self.diff_step,
                "Relative Jacobian step (production)"
            )?;
            line!(
                "bootstrap_diff_step = {:.3e}",
                self.bootstrap_diff_step,
                "Relative Jacobian step (bootstrap)"
            )?;
            line!(
                "max_evaluations     = {}",
                self.max_evaluations,
                "Residual evaluation budget"
            )?;
            line!("ftol                = {:.1e}", self.ftol, "Relative cost tolerance")?;
            line!("xtol                = {:.1e}", self.xtol, "Relative step tolerance")?;
            line!("gtol                = {:.1e}", self.gtol, "Gradient tolerance")?;

            writeln!(f, "\n[Bootstrap]")?;
            line!("n_bootstrap         = {}", self.n_bootstrap, "Noisy replicas")?;
            line!(
                "bootstrap_sigma_px  = {:.3} px",
                self.bootstrap_sigma_px,
                "Injected Gaussian noise"
            )?;
            line!("base_seed           = {}", self.base_seed, "Root of replica RNG streams")?;

            writeln!(f, "\n[Ingestion]")?;
            line!(
                "timestamp_offset_s  = {:.3} s",
                self.timestamp_offset_s,
                "Clock correction added to timestamps"
            )?;

            Ok(())
        } else {
            write!(
                f,
                "RefineParams(n_hops={}, local_max_iters={}, hop_step={:.2}°, T={:.2}, diff_step={:.0e}/{:.0e}, max_eval={}, n_bootstrap={}, sigma={:.2}px, seed={}, offset={:.1}s)",
                self.n_hops,
                self.local_max_iters,
                self.hop_step,
                self.temperature,
                self.diff_step,
                self.bootstrap_diff_step,
                self.max_evaluations,
                self.n_bootstrap,
                self.bootstrap_sigma_px,
                self.base_seed,
                self.timestamp_offset_s,
            )
        }
    }
}

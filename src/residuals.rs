//! # Residual analysis
//!
//! Decomposition of the fitted-minus-observed pixel offsets into **along-track** and
//! **cross-track** components.
//!
//! The local direction of motion at observation `i` is the heading of the *observed* track,
//! `θᵢ = atan2(Δy, Δx)`, estimated by a forward difference (a backward difference at the last
//! observation). With the offset `(dx, dy) = fitted − observed`:
//!
//! ```text
//! along = dx·cos θ + dy·sin θ
//! cross = dx·sin θ − dy·cos θ
//! ```
//!
//! The reduced chi-square assumes an isotropic per-coordinate error `σ` and six fitted
//! parameters:
//!
//! ```text
//! χ²_ν = Σ (dx² + dy²) / σ² / (2n − 6)
//! ```
//!
//! and is `NaN` when `2n − 6 ≤ 0`.

use std::fmt;

use itertools::izip;

use crate::{constants::Pixel, tlefit_errors::TlefitError};

/// Number of fitted parameters removed from the degrees of freedom
const FITTED_PARAMETERS: usize = 6;

/// Residual statistics of one fitted track.
#[derive(Debug, Clone, PartialEq)]
pub struct ResidualStats {
    /// Per-observation along-track offset (pixels)
    pub along_track: Vec<Pixel>,
    /// Per-observation cross-track offset (pixels)
    pub cross_track: Vec<Pixel>,
    pub along_track_rms: Pixel,
    pub cross_track_rms: Pixel,
    /// `sqrt(mean(dx² + dy²))`
    pub total_rms: Pixel,
    pub reduced_chi_square: f64,
}

impl ResidualStats {
    pub fn len(&self) -> usize {
        self.along_track.len()
    }

    pub fn is_empty(&self) -> bool {
        self.along_track.is_empty()
    }

    pub fn is_finite(&self) -> bool {
        self.along_track_rms.is_finite()
            && self.cross_track_rms.is_finite()
            && self.total_rms.is_finite()
    }
}

impl fmt::Display for ResidualStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rms along={:.4}px cross={:.4}px total={:.4}px, reduced chi2={:.3} ({} obs)",
            self.along_track_rms,
            self.cross_track_rms,
            self.total_rms,
            self.reduced_chi_square,
            self.len()
        )
    }
}

fn rms(values: &[f64]) -> f64 {
    (values.iter().map(|v| v * v).sum::<f64>() / values.len() as f64).sqrt()
}

/// Heading of the observed track at each index
fn headings(observed_x: &[Pixel], observed_y: &[Pixel]) -> Vec<f64> {
    let n = observed_x.len();
    (0..n)
        .map(|i| {
            let (a, b) = if i + 1 < n { (i, i + 1) } else { (i - 1, i) };
            (observed_y[b] - observed_y[a]).atan2(observed_x[b] - observed_x[a])
        })
        .collect()
}

/// Decompose the residuals of a fitted track.
///
/// Arguments
/// ---------
/// * `observed_x`, `observed_y`: observed track
/// * `fitted_x`, `fitted_y`: predicted track of the fitted elements
/// * `sigma_px`: per-coordinate measurement error used by the reduced chi-square
///
/// Return
/// ------
/// * the statistics, [`TlefitError::InsufficientObservations`] with fewer than two
///   observations, or [`TlefitError::ProjectionLengthMismatch`] when the fitted track does not
///   have one point per observation.
pub fn analyze_residuals(
    observed_x: &[Pixel],
    observed_y: &[Pixel],
    fitted_x: &[Pixel],
    fitted_y: &[Pixel],
    sigma_px: Pixel,
) -> Result<ResidualStats, TlefitError> {
    let n = observed_x.len();
    if n < 2 {
        return Err(TlefitError::InsufficientObservations {
            required: 2,
            found: n,
        });
    }
    if observed_y.len() != n || fitted_x.len() != n || fitted_y.len() != n {
        return Err(TlefitError::ProjectionLengthMismatch {
            expected: n,
            found_x: fitted_x.len(),
            found_y: fitted_y.len(),
        });
    }

    let theta = headings(observed_x, observed_y);

    let mut along_track = Vec::with_capacity(n);
    let mut cross_track = Vec::with_capacity(n);
    let mut squared_sum = 0.0;
    for (ox, oy, fx, fy, t) in izip!(observed_x, observed_y, fitted_x, fitted_y, &theta) {
        let (dx, dy) = (fx - ox, fy - oy);
        let (sin_t, cos_t) = t.sin_cos();
        along_track.push(dx * cos_t + dy * sin_t);
        cross_track.push(dx * sin_t - dy * cos_t);
        squared_sum += dx * dx + dy * dy;
    }

    let dof = 2 * n as i64 - FITTED_PARAMETERS as i64;
    let reduced_chi_square = if dof > 0 && sigma_px > 0.0 {
        squared_sum / (sigma_px * sigma_px) / dof as f64
    } else {
        f64::NAN
    };

    Ok(ResidualStats {
        along_track_rms: rms(&along_track),
        cross_track_rms: rms(&cross_track),
        total_rms: (squared_sum / n as f64).sqrt(),
        reduced_chi_square,
        along_track,
        cross_track,
    })
}

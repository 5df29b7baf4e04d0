//! # Objective function
//!
//! [`FitProblem`] is the explicit run context shared by both optimizer stages: the projector,
//! the fixed record fields, the epoch line and the observed track. It turns a candidate set
//! of elements into
//!
//! * a regenerated element record ([`FitProblem::encode`]),
//! * a predicted pixel track ([`FitProblem::predict`]),
//! * a residual vector `[px − ox, py − oy]` for least squares ([`FitProblem::residuals`]),
//! * the scalar mismatch `mean((px − ox)² + (py − oy)²)` ([`FitProblem::evaluate`]).
//!
//! Evaluation is pure: nothing is cached between calls, and candidates outside the declared
//! bounds are evaluated like any other (constraints are the optimizer's business).

use hifitime::Epoch;
use nalgebra::DVector;

use crate::{
    constants::Pixel,
    elements::OrbitalElements,
    projection::{check_track_length, PixelTrack, Projector},
    record::{encode_line2, ElementRecord, RecordTemplate},
    tlefit_errors::TlefitError,
};

/// Observed track and fixed record fields against which candidates are scored.
#[derive(Debug, Clone)]
pub struct FitProblem<'a, P: ?Sized> {
    projector: &'a P,
    template: RecordTemplate,
    line1: &'a str,
    times: &'a [Epoch],
    observed_x: &'a [Pixel],
    observed_y: &'a [Pixel],
}

impl<'a, P: Projector + ?Sized> FitProblem<'a, P> {
    /// Build the run context.
    ///
    /// Arguments
    /// ---------
    /// * `projector`: external projection adapter
    /// * `template`: catalog id and revolution number written in every candidate line 2
    /// * `line1`: epoch line, already referred to the window midpoint
    /// * `times`, `observed_x`, `observed_y`: the observed track, same length
    ///
    /// Return
    /// ------
    /// * the context, or [`TlefitError::EmptyObservations`] /
    ///   [`TlefitError::ProjectionLengthMismatch`] when the track columns are inconsistent
    pub fn new(
        projector: &'a P,
        template: RecordTemplate,
        line1: &'a str,
        times: &'a [Epoch],
        observed_x: &'a [Pixel],
        observed_y: &'a [Pixel],
    ) -> Result<Self, TlefitError> {
        if times.is_empty() {
            return Err(TlefitError::EmptyObservations);
        }
        check_track_length(observed_x, observed_y, times.len())?;

        Ok(FitProblem {
            projector,
            template,
            line1,
            times,
            observed_x,
            observed_y,
        })
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn times(&self) -> &[Epoch] {
        self.times
    }

    pub fn observed_x(&self) -> &[Pixel] {
        self.observed_x
    }

    pub fn observed_y(&self) -> &[Pixel] {
        self.observed_y
    }

    pub fn template(&self) -> &RecordTemplate {
        &self.template
    }

    /// Regenerate the element record of a candidate.
    ///
    /// The node, perigee and anomaly angles are first reduced modulo 360°, then handed to the
    /// codec which wraps any negative remainder.
    pub fn encode(&self, elements: &OrbitalElements) -> Result<ElementRecord, TlefitError> {
        let line2 = encode_line2(&elements.with_reduced_angles(), &self.template)?;
        Ok(ElementRecord {
            line1: self.line1.to_string(),
            line2,
        })
    }

    /// Predicted pixel track of a candidate
    pub fn predict(&self, elements: &OrbitalElements) -> Result<PixelTrack, TlefitError> {
        let record = self.encode(elements)?;
        let track = self
            .projector
            .project(&record.line1, &record.line2, self.times)?;
        check_track_length(&track.0, &track.1, self.len())?;
        Ok(track)
    }

    /// Residual vector `[px₀ − ox₀, …, pxₙ − oxₙ, py₀ − oy₀, …, pyₙ − oyₙ]`
    pub fn residuals(&self, elements: &OrbitalElements) -> Result<DVector<f64>, TlefitError> {
        let (px, py) = self.predict(elements)?;
        let n = self.len();
        Ok(DVector::from_fn(2 * n, |i, _| {
            if i < n {
                px[i] - self.observed_x[i]
            } else {
                py[i - n] - self.observed_y[i - n]
            }
        }))
    }

    /// Mean squared Euclidean pixel distance between prediction and observation.
    pub fn evaluate(&self, elements: &OrbitalElements) -> Result<f64, TlefitError> {
        let (px, py) = self.predict(elements)?;
        Ok(mean_squared_pixel_error(
            &px,
            &py,
            self.observed_x,
            self.observed_y,
        ))
    }
}

/// `mean((px − ox)² + (py − oy)²)` over the common length of the four slices
pub fn mean_squared_pixel_error(
    predicted_x: &[Pixel],
    predicted_y: &[Pixel],
    observed_x: &[Pixel],
    observed_y: &[Pixel],
) -> f64 {
    let squared: Vec<f64> = predicted_x
        .iter()
        .zip(predicted_y)
        .zip(observed_x.iter().zip(observed_y))
        .map(|((px, py), (ox, oy))| (px - ox).powi(2) + (py - oy).powi(2))
        .collect();

    if squared.is_empty() {
        return f64::NAN;
    }
    squared.iter().sum::<f64>() / squared.len() as f64
}

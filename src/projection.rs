//! # Projection adapter
//!
//! The physical model (propagation of a two-line element record and projection of the
//! satellite position onto the detector) lives outside this crate. The optimizer only sees it
//! through the [`Projector`] trait.
//!
//! Implementations must be **deterministic**: identical record lines and timestamps must give
//! identical pixels, since both optimizer stages evaluate the objective many times with
//! distinct, possibly out-of-order candidates and compare the results.

use hifitime::Epoch;

use crate::{constants::Pixel, tlefit_errors::TlefitError};

/// Predicted pixel track `(x, y)`, one entry per timestamp
pub type PixelTrack = (Vec<Pixel>, Vec<Pixel>);

/// Element record → predicted pixel coordinates.
pub trait Projector {
    /// Predict the detector position of the object at each timestamp.
    ///
    /// Arguments
    /// ---------
    /// * `line1`: epoch line of the candidate record
    /// * `line2`: element line of the candidate record
    /// * `times`: UTC epochs at which the object must be projected
    ///
    /// Return
    /// ------
    /// * `(pixel_x, pixel_y)` with `times.len()` entries each, or
    ///   [`TlefitError::ProjectionFailed`] when the record cannot be propagated
    fn project(&self, line1: &str, line2: &str, times: &[Epoch]) -> Result<PixelTrack, TlefitError>;
}

impl<P: Projector + ?Sized> Projector for &P {
    fn project(&self, line1: &str, line2: &str, times: &[Epoch]) -> Result<PixelTrack, TlefitError> {
        (**self).project(line1, line2, times)
    }
}

impl<P: Projector + ?Sized> Projector for Box<P> {
    fn project(&self, line1: &str, line2: &str, times: &[Epoch]) -> Result<PixelTrack, TlefitError> {
        (**self).project(line1, line2, times)
    }
}

/// Check that a projector returned one pixel pair per timestamp
pub(crate) fn check_track_length(
    x: &[Pixel],
    y: &[Pixel],
    expected: usize,
) -> Result<(), TlefitError> {
    if x.len() != expected || y.len() != expected {
        return Err(TlefitError::ProjectionLengthMismatch {
            expected,
            found_x: x.len(),
            found_y: y.len(),
        });
    }
    Ok(())
}

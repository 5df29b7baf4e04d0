//! # Pixel-track observations
//!
//! Ingestion of detector measurements into an ordered [`Observations`] track.
//!
//! A detection is a pixel position `(x, y)` stamped with a UTC time string. Ingestion parses
//! the timestamps, applies the configured clock correction
//! ([`RefineParams::timestamp_offset_s`](crate::refine_params::RefineParams::timestamp_offset_s)),
//! and checks that the track is chronological. Once ingested, a track is never mutated:
//! bootstrap resampling ([`resample`]) builds a new one.
//!
//! ## Sources
//!
//! - any iterator of [`RawDetection`] ([`ingest`]),
//! - CSV text with a `pixel_x,pixel_y,timestamp` header ([`csv_reader`]).

pub mod csv_reader;
pub mod resample;

use hifitime::Epoch;
use serde::Deserialize;

use crate::{
    constants::Pixel,
    time::{offset_seconds, parse_timestamp},
    tlefit_errors::TlefitError,
};

pub use resample::resample;

/// A detection as delivered by the measurement source, timestamp still unparsed.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawDetection {
    #[serde(alias = "x")]
    pub pixel_x: Pixel,
    #[serde(alias = "y")]
    pub pixel_y: Pixel,
    #[serde(alias = "time", alias = "timestamp_utc")]
    pub timestamp: String,
}

impl RawDetection {
    pub fn new(pixel_x: Pixel, pixel_y: Pixel, timestamp: impl Into<String>) -> Self {
        RawDetection {
            pixel_x,
            pixel_y,
            timestamp: timestamp.into(),
        }
    }
}

/// A single pixel observation
///
/// # Fields
///
/// * `pixel_x` - column coordinate on the detector, in pixels
/// * `pixel_y` - row coordinate on the detector, in pixels
/// * `time` - corrected UTC epoch of the detection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub pixel_x: Pixel,
    pub pixel_y: Pixel,
    pub time: Epoch,
}

impl Observation {
    pub fn new(pixel_x: Pixel, pixel_y: Pixel, time: Epoch) -> Self {
        Observation {
            pixel_x,
            pixel_y,
            time,
        }
    }
}

/// Chronological pixel track of one object
pub type Observations = Vec<Observation>;

/// Column views over a track.
pub trait TrackExt {
    fn times(&self) -> Vec<Epoch>;
    fn pixels_x(&self) -> Vec<Pixel>;
    fn pixels_y(&self) -> Vec<Pixel>;
}

impl TrackExt for [Observation] {
    fn times(&self) -> Vec<Epoch> {
        self.iter().map(|obs| obs.time).collect()
    }

    fn pixels_x(&self) -> Vec<Pixel> {
        self.iter().map(|obs| obs.pixel_x).collect()
    }

    fn pixels_y(&self) -> Vec<Pixel> {
        self.iter().map(|obs| obs.pixel_y).collect()
    }
}

/// Parse raw detections into a track.
///
/// Arguments
/// ---------
/// * `detections`: raw records in chronological order
/// * `timestamp_offset_s`: clock correction added to every timestamp, in seconds
///
/// Return
/// ------
/// * the track, or the first timestamp parsing failure (fatal, no partial recovery).
///   An empty input gives [`TlefitError::EmptyObservations`], a time going backwards gives
///   [`TlefitError::UnorderedObservations`].
pub fn ingest<I>(detections: I, timestamp_offset_s: f64) -> Result<Observations, TlefitError>
where
    I: IntoIterator<Item = RawDetection>,
{
    let observations = detections
        .into_iter()
        .map(|raw| {
            let time = parse_timestamp(&raw.timestamp)?;
            Ok(Observation::new(
                raw.pixel_x,
                raw.pixel_y,
                offset_seconds(&time, timestamp_offset_s),
            ))
        })
        .collect::<Result<Observations, TlefitError>>()?;

    check_track(&observations)?;
    Ok(observations)
}

/// Non-empty and chronological
pub(crate) fn check_track(observations: &[Observation]) -> Result<(), TlefitError> {
    if observations.is_empty() {
        return Err(TlefitError::EmptyObservations);
    }
    match observations
        .windows(2)
        .position(|pair| pair[1].time < pair[0].time)
    {
        Some(idx) => Err(TlefitError::UnorderedObservations(idx + 1)),
        None => Ok(()),
    }
}

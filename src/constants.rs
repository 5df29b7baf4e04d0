//! # Constants and type definitions for tlefit
//!
//! This module centralizes the **unit conversions**, **record layout constants**, and
//! **common type aliases** used throughout the crate.
//!
//! ## Overview
//!
//! - Time constants (seconds per day, reference epoch of the day-of-year count)
//! - Angle constants (full turn in degrees, mean-anomaly search window)
//! - Column layout of the fixed-width element record
//! - Core type aliases shared by the codec, the optimizer and the report

use hifitime::Epoch;

// -------------------------------------------------------------------------------------------------
// Time and angle constants
// -------------------------------------------------------------------------------------------------

/// Number of seconds in a civil (UTC) day
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// One full revolution in degrees
pub const FULL_TURN: Degree = 360.0;

/// Half-width of the mean-anomaly search window around the epoch-derived seed (degrees)
pub const MEAN_ANOMALY_WINDOW: Degree = 4.0;

/// Calendar year of the day-of-year reference epoch (day 1 = January 1st, 00:00:00 UTC)
pub const REFERENCE_YEAR: i32 = 2016;

/// Reference epoch of the continuous day-of-year count, 2016-01-01T00:00:00 UTC.
pub fn reference_epoch() -> Epoch {
    Epoch::from_gregorian_utc_at_midnight(REFERENCE_YEAR, 1, 1)
}

// -------------------------------------------------------------------------------------------------
// Element record layout (0-based, end-exclusive byte ranges)
// -------------------------------------------------------------------------------------------------

/// Length of a record line without its trailing checksum digit
pub const RECORD_BODY_LEN: usize = 68;

/// Length of a complete record line, checksum included
pub const RECORD_LINE_LEN: usize = 69;

/// Epoch day-of-year field of line 1 (`DDD.DDDDDDDD`), day of the year given by
/// [`LINE1_EPOCH_YEAR`]
pub const LINE1_EPOCH_DAY: std::ops::Range<usize> = 20..32;

/// Two-digit epoch year of line 1
pub const LINE1_EPOCH_YEAR: std::ops::Range<usize> = 18..20;

pub const LINE2_CATALOG: std::ops::Range<usize> = 2..7;
pub const LINE2_INCLINATION: std::ops::Range<usize> = 8..16;
pub const LINE2_RAAN: std::ops::Range<usize> = 17..25;
pub const LINE2_ECCENTRICITY: std::ops::Range<usize> = 26..33;
pub const LINE2_ARG_OF_PERIGEE: std::ops::Range<usize> = 34..42;
pub const LINE2_MEAN_ANOMALY: std::ops::Range<usize> = 43..51;
pub const LINE2_MEAN_MOTION: std::ops::Range<usize> = 52..63;
pub const LINE2_REVOLUTION: std::ops::Range<usize> = 63..68;

/// Largest catalog identifier that fits the 5-column catalog field
pub const MAX_CATALOG_ID: u32 = 99_999;

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Angle in degrees
pub type Degree = f64;
/// Image-plane coordinate in pixels
pub type Pixel = f64;
/// Mean motion in revolutions per day
pub type RevPerDay = f64;
/// Continuous day-of-year count (day 1 = reference epoch)
pub type DayOfYear = f64;

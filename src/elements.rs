//! # Classical two-line orbital elements
//!
//! This module defines [`OrbitalElements`], the six mean elements carried by a two-line
//! element record, and [`ElementBounds`], the per-element search box handed to the optimizer.
//!
//! ## Units
//!
//! - Angles (`inclination`, `raan`, `arg_of_perigee`, `mean_anomaly`): **degrees**
//! - `eccentricity`: unitless, expected in `[0, 1)`
//! - `mean_motion`: **revolutions per day**
//!
//! Angles are logically taken modulo 360° but are allowed to leave that range while the
//! optimizer explores; the record codec wraps them before serialization.
//!
//! ## Ordering
//!
//! Whenever the elements are flattened into an array (solver parameter vectors, bootstrap
//! samples, report rows) the order is the one of [`ELEMENT_NAMES`]:
//! `(i, Ω, e, ω, M, n)`.

use std::fmt;

use crate::constants::{Degree, RevPerDay, FULL_TURN};

/// Display names of the elements, in array order
pub const ELEMENT_NAMES: [&str; 6] = [
    "inclination",
    "raan",
    "eccentricity",
    "arg_of_perigee",
    "mean_anomaly",
    "mean_motion",
];

/// Mean orbital elements of a two-line element record.
///
/// Units
/// -----
/// * `inclination`: degrees.
/// * `raan`: degrees (right ascension of the ascending node, Ω).
/// * `eccentricity`: unitless.
/// * `arg_of_perigee`: degrees (ω).
/// * `mean_anomaly`: degrees (M).
/// * `mean_motion`: revolutions per day (n).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitalElements {
    pub inclination: Degree,
    pub raan: Degree,
    pub eccentricity: f64,
    pub arg_of_perigee: Degree,
    pub mean_anomaly: Degree,
    pub mean_motion: RevPerDay,
}

impl OrbitalElements {
    pub fn new(
        inclination: Degree,
        raan: Degree,
        eccentricity: f64,
        arg_of_perigee: Degree,
        mean_anomaly: Degree,
        mean_motion: RevPerDay,
    ) -> Self {
        OrbitalElements {
            inclination,
            raan,
            eccentricity,
            arg_of_perigee,
            mean_anomaly,
            mean_motion,
        }
    }

    /// Flatten into `(i, Ω, e, ω, M, n)`
    pub fn to_array(&self) -> [f64; 6] {
        [
            self.inclination,
            self.raan,
            self.eccentricity,
            self.arg_of_perigee,
            self.mean_anomaly,
            self.mean_motion,
        ]
    }

    /// Inverse of [`OrbitalElements::to_array`]
    pub fn from_array(values: [f64; 6]) -> Self {
        OrbitalElements::new(
            values[0], values[1], values[2], values[3], values[4], values[5],
        )
    }

    /// Copy of the elements with the three node/perigee/anomaly angles reduced by the signed
    /// remainder modulo 360°.
    ///
    /// The result keeps the sign of the input, so a negative angle stays negative and is left
    /// for the record codec to wrap.
    pub fn with_reduced_angles(&self) -> Self {
        OrbitalElements {
            raan: self.raan % FULL_TURN,
            arg_of_perigee: self.arg_of_perigee % FULL_TURN,
            mean_anomaly: self.mean_anomaly % FULL_TURN,
            ..*self
        }
    }

    /// `true` when every element is a finite number
    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }
}

impl fmt::Display for OrbitalElements {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Two-line mean elements")?;
        writeln!(f, "-------------------------------------------")?;
        writeln!(f, "  i   (inclination)           = {:.6}°", self.inclination)?;
        writeln!(f, "  Ω   (right ascension node)  = {:.6}°", self.raan)?;
        writeln!(f, "  e   (eccentricity)          = {:.7}", self.eccentricity)?;
        writeln!(f, "  ω   (argument of perigee)   = {:.6}°", self.arg_of_perigee)?;
        writeln!(f, "  M   (mean anomaly)          = {:.6}°", self.mean_anomaly)?;
        write!(f, "  n   (mean motion)           = {:.8} rev/day", self.mean_motion)
    }
}

/// Closed interval `[min, max]` allowed for one element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bound {
    pub min: f64,
    pub max: f64,
}

impl Bound {
    pub fn new(min: f64, max: f64) -> Self {
        Bound { min, max }
    }

    /// Symmetric window `center ± half_width`
    pub fn around(center: f64, half_width: f64) -> Self {
        Bound::new(center - half_width, center + half_width)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Distance from `value` to the interval (zero inside)
    pub fn violation(&self, value: f64) -> f64 {
        if value < self.min {
            self.min - value
        } else if value > self.max {
            value - self.max
        } else {
            0.0
        }
    }

    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min <= self.max
    }
}

/// Per-element search box.
///
/// The mean-anomaly bound is not part of the configuration: it is derived at run time from
/// the epoch-extrapolated seed (see [`MEAN_ANOMALY_WINDOW`](crate::constants::MEAN_ANOMALY_WINDOW)).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElementBounds {
    pub inclination: Bound,
    pub raan: Bound,
    pub eccentricity: Bound,
    pub arg_of_perigee: Bound,
    pub mean_motion: Bound,
}

impl ElementBounds {
    /// Bounds in array order, with the supplied mean-anomaly bound in slot 4
    pub fn to_array(&self, mean_anomaly: Bound) -> [Bound; 6] {
        [
            self.inclination,
            self.raan,
            self.eccentricity,
            self.arg_of_perigee,
            mean_anomaly,
            self.mean_motion,
        ]
    }

    /// Loose bounds: full angular range, any eccentricity in `[0, 1)`, 0–20 rev/day.
    pub fn unbounded() -> Self {
        ElementBounds {
            inclination: Bound::new(0.0, 180.0),
            raan: Bound::new(0.0, FULL_TURN),
            eccentricity: Bound::new(0.0, 0.999_999_9),
            arg_of_perigee: Bound::new(0.0, FULL_TURN),
            mean_motion: Bound::new(0.0, 20.0),
        }
    }
}

#[cfg(test)]
mod elements_test {
    use super::*;

    #[test]
    fn test_array_round_trip_order() {
        let elements = OrbitalElements::new(97.4, 250.0, 0.0015, 80.0, 10.0, 14.85);
        assert_eq!(elements.to_array(), [97.4, 250.0, 0.0015, 80.0, 10.0, 14.85]);
        assert_eq!(OrbitalElements::from_array(elements.to_array()), elements);
    }

    #[test]
    fn test_reduced_angles_keep_sign() {
        let elements = OrbitalElements::new(97.4, 725.0, 0.0015, -370.0, 360.0, 14.85);
        let reduced = elements.with_reduced_angles();
        assert_eq!(reduced.raan, 5.0);
        assert_eq!(reduced.arg_of_perigee, -10.0);
        assert_eq!(reduced.mean_anomaly, 0.0);
        assert_eq!(reduced.inclination, 97.4);
    }

    #[test]
    fn test_bound_violation() {
        let b = Bound::around(10.0, 4.0);
        assert!(b.contains(6.0) && b.contains(14.0));
        assert_eq!(b.violation(15.5), 1.5);
        assert_eq!(b.violation(5.0), 1.0);
        assert_eq!(b.violation(9.0), 0.0);
        assert!(!Bound::new(2.0, 1.0).is_valid());
    }
}

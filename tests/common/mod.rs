#![allow(dead_code)]

use approx::assert_relative_eq;
use hifitime::Epoch;
use nalgebra::Vector3;

use tlefit::{
    elements::{Bound, ElementBounds},
    record::{append_checksum, decode_line2, encode_line2, RecordTemplate},
    time::{day_of_year, offset_seconds, parse_timestamp},
    ElementRecord, Observation, Observations, OrbitalElements, PixelTrack, Projector, TlefitError,
};

/// Earth gravitational parameter (km³/s²)
const GM_EARTH: f64 = 398_600.4418;

pub const CATALOG_ID: u32 = 41765;
pub const REVOLUTION: u32 = 12345;

/// Line 1 body with its epoch at day 100.5 of 2016 (2016-04-09 12:00:00 UTC)
const LINE1_BODY: &str = "1 41765U 16059A   16100.50000000  .00000067  00000-0  18179-4 0  999";

pub fn truth() -> OrbitalElements {
    OrbitalElements::new(97.4, 250.0, 0.0015, 80.0, 10.0, 14.85)
}

/// Search box a few degrees wide around `el`
pub fn bounds_around(el: &OrbitalElements) -> ElementBounds {
    ElementBounds {
        inclination: Bound::around(el.inclination, 1.0),
        raan: Bound::around(el.raan, 2.0),
        eccentricity: Bound::new(0.0, 0.01),
        arg_of_perigee: Bound::around(el.arg_of_perigee, 2.0),
        mean_motion: Bound::around(el.mean_motion, 0.1),
    }
}

pub fn line1() -> String {
    append_checksum(LINE1_BODY.to_string())
}

/// Prior record carrying `elements`, epoch at the middle of [`track_times`]
pub fn prior_record(elements: &OrbitalElements) -> ElementRecord {
    let line2 = encode_line2(elements, &RecordTemplate::new(CATALOG_ID, REVOLUTION)).unwrap();
    ElementRecord::parse(&line1(), &line2).unwrap()
}

/// `n` epochs 10 s apart, centered on 2016-04-09 12:00:00 UTC
pub fn track_times(n: usize) -> Vec<Epoch> {
    let center = parse_timestamp("2016-04-09 12:00:00").unwrap();
    let half_span = 10.0 * (n as f64 - 1.0) / 2.0;
    (0..n)
        .map(|k| offset_seconds(&center, 10.0 * k as f64 - half_span))
        .collect()
}

/// Position (km) of a Keplerian orbit given by record lines, relative to the Earth center.
fn position(line1: &str, line2: &str, time: &Epoch) -> Result<Vector3<f64>, TlefitError> {
    let epoch_day = ElementRecord::parse(line1, line2)?.epoch_record()?.epoch_day;
    let (el, _) = decode_line2(line2)?;

    let n = el.mean_motion * std::f64::consts::TAU / 86_400.0;
    let a = (GM_EARTH / (n * n)).cbrt();
    let e = el.eccentricity;
    let dt = (day_of_year(time) - epoch_day) * 86_400.0;
    let m = el.mean_anomaly.to_radians() + n * dt;

    let mut ecc_anomaly = m;
    for _ in 0..30 {
        let delta = (ecc_anomaly - e * ecc_anomaly.sin() - m) / (1.0 - e * ecc_anomaly.cos());
        ecc_anomaly -= delta;
        if delta.abs() < 1e-15 {
            break;
        }
    }

    let perifocal = Vector3::new(
        a * (ecc_anomaly.cos() - e),
        a * (1.0 - e * e).sqrt() * ecc_anomaly.sin(),
        0.0,
    );

    let (so, co) = el.raan.to_radians().sin_cos();
    let (si, ci) = el.inclination.to_radians().sin_cos();
    let (sw, cw) = el.arg_of_perigee.to_radians().sin_cos();
    let rotation = nalgebra::Matrix3::new(
        co * cw - so * sw * ci,
        -co * sw - so * cw * ci,
        so * si,
        so * cw + co * sw * ci,
        -so * sw + co * cw * ci,
        -co * si,
        sw * si,
        cw * si,
        ci,
    );
    Ok(rotation * perifocal)
}

/// Gnomonic camera at the Earth center, fixed boresight.
#[derive(Debug, Clone)]
pub struct PinholeCamera {
    boresight: Vector3<f64>,
    right: Vector3<f64>,
    up: Vector3<f64>,
    focal_px: f64,
    center_px: (f64, f64),
}

impl PinholeCamera {
    /// Camera pointed at the object described by `record` at `time`
    pub fn looking_at(record: &ElementRecord, time: &Epoch) -> Self {
        let boresight = position(&record.line1, &record.line2, time)
            .unwrap()
            .normalize();
        let right = boresight.cross(&Vector3::z()).normalize();
        let up = right.cross(&boresight);
        PinholeCamera {
            boresight,
            right,
            up,
            focal_px: 3000.0,
            center_px: (1024.0, 1024.0),
        }
    }

    /// Noise-free track of `record`
    pub fn track(&self, record: &ElementRecord, times: &[Epoch]) -> Observations {
        let (x, y) = self.project(&record.line1, &record.line2, times).unwrap();
        x.into_iter()
            .zip(y)
            .zip(times)
            .map(|((px, py), t)| Observation::new(px, py, *t))
            .collect()
    }
}

impl Projector for PinholeCamera {
    fn project(&self, line1: &str, line2: &str, times: &[Epoch]) -> Result<PixelTrack, TlefitError> {
        let mut xs = Vec::with_capacity(times.len());
        let mut ys = Vec::with_capacity(times.len());
        for t in times {
            let dir = position(line1, line2, t)?.normalize();
            let depth = dir.dot(&self.boresight);
            if depth <= 0.0 {
                return Err(TlefitError::ProjectionFailed("object behind the camera".into()));
            }
            xs.push(self.center_px.0 + self.focal_px * dir.dot(&self.right) / depth);
            ys.push(self.center_px.1 + self.focal_px * dir.dot(&self.up) / depth);
        }
        Ok((xs, ys))
    }
}

/// A projector that always fails
#[derive(Debug, Clone, Copy)]
pub struct BrokenProjector;

impl Projector for BrokenProjector {
    fn project(&self, _: &str, _: &str, _: &[Epoch]) -> Result<PixelTrack, TlefitError> {
        Err(TlefitError::ProjectionFailed("propagator unavailable".into()))
    }
}

pub fn assert_elements_close(actual: &OrbitalElements, expected: &OrbitalElements, epsilon: f64) {
    assert_relative_eq!(actual.inclination, expected.inclination, epsilon = epsilon);
    assert_relative_eq!(actual.raan, expected.raan, epsilon = epsilon);
    assert_relative_eq!(actual.eccentricity, expected.eccentricity, epsilon = epsilon);
    assert_relative_eq!(
        actual.arg_of_perigee,
        expected.arg_of_perigee,
        epsilon = epsilon
    );
    assert_relative_eq!(actual.mean_anomaly, expected.mean_anomaly, epsilon = epsilon);
    assert_relative_eq!(actual.mean_motion, expected.mean_motion, epsilon = epsilon);
}

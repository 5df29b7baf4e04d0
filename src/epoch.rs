//! # Epoch update and mean-anomaly extrapolation
//!
//! The refined record is referred to the **midpoint** of the observation window. This module
//! rewrites the epoch field of the prior record's line 1 accordingly, and propagates the prior
//! mean anomaly to that new epoch with the first-order rate law
//!
//! ```text
//! M(t) = (doy(t) − doy₀) · n₀ · 360 + M₀
//! ```
//!
//! which seeds the Stage A search window.

use hifitime::Epoch;

use crate::{
    constants::{
        Degree, DayOfYear, RevPerDay, FULL_TURN, LINE1_EPOCH_DAY, LINE1_EPOCH_YEAR,
        RECORD_BODY_LEN,
    },
    record::append_checksum,
    time::{day_of_year, record_epoch},
    tlefit_errors::TlefitError,
};

/// Read-only reference data of the prior record.
///
/// * `epoch_day`: day-of-year of the prior epoch (same count as [`day_of_year`])
/// * `mean_anomaly`: degrees at `epoch_day`
/// * `mean_motion`: revolutions per day
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochRecord {
    pub epoch_day: DayOfYear,
    pub mean_anomaly: Degree,
    pub mean_motion: RevPerDay,
}

/// Bring an angle into `[0, 360)` by repeated addition or subtraction of a full turn.
///
/// Terminates after at most `ceil(|angle| / 360) + 1` steps. Non-finite input is returned
/// unchanged.
pub fn wrap_degrees(angle: Degree) -> Degree {
    wrap_degrees_counted(angle).0
}

fn wrap_degrees_counted(angle: Degree) -> (Degree, usize) {
    if !angle.is_finite() {
        return (angle, 0);
    }
    let mut wrapped = angle;
    let mut steps = 0;
    while wrapped >= FULL_TURN {
        wrapped -= FULL_TURN;
        steps += 1;
    }
    while wrapped < 0.0 {
        wrapped += FULL_TURN;
        steps += 1;
    }
    (wrapped, steps)
}

/// Midpoint of an observation window: `first + (last − first) / 2`
pub fn window_midpoint(timestamps: &[Epoch]) -> Result<Epoch, TlefitError> {
    let (first, last) = match (timestamps.first(), timestamps.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return Err(TlefitError::EmptyObservations),
    };
    Ok(first + (last - first) * 0.5)
}

/// Rewrite the epoch of a record's line 1 to the midpoint of the observation window.
///
/// Arguments
/// ---------
/// * `prior_line1`: line 1 of the prior record (at least 68 ASCII columns)
/// * `timestamps`: observation epochs, chronological
///
/// Return
/// ------
/// * the new line 1, identical to the prior one except for columns 19–20 (two-digit year),
///   21–32 (day of that year, `{:012.8}`) and the checksum, together with the midpoint epoch.
///   Within 2016 the day field is the continuous [`day_of_year`] count itself.
pub fn update_epoch(
    prior_line1: &str,
    timestamps: &[Epoch],
) -> Result<(String, Epoch), TlefitError> {
    let midpoint = window_midpoint(timestamps)?;

    if !prior_line1.is_ascii() {
        return Err(TlefitError::MalformedRecord(format!(
            "line 1 contains non-ASCII characters: '{prior_line1}'"
        )));
    }
    let body = prior_line1.get(..RECORD_BODY_LEN).ok_or_else(|| {
        TlefitError::MalformedRecord(format!(
            "line 1 has {} columns, {RECORD_BODY_LEN} required",
            prior_line1.len()
        ))
    })?;

    let (year, day) = record_epoch(&midpoint);
    let epoch_field = format!("{year:02}{day:012.8}");
    if epoch_field.len() != LINE1_EPOCH_DAY.end - LINE1_EPOCH_YEAR.start {
        return Err(TlefitError::MalformedRecord(format!(
            "epoch {epoch_field} does not fit the line 1 epoch field"
        )));
    }

    let mut spliced = String::with_capacity(RECORD_BODY_LEN + 1);
    spliced.push_str(&body[..LINE1_EPOCH_YEAR.start]);
    spliced.push_str(&epoch_field);
    spliced.push_str(&body[LINE1_EPOCH_DAY.end..]);

    Ok((append_checksum(spliced), midpoint))
}

/// Propagate the prior mean anomaly to `target`, result in `[0, 360)`.
pub fn extrapolate_mean_anomaly(prior: &EpochRecord, target: &Epoch) -> Degree {
    let elapsed_days = day_of_year(target) - prior.epoch_day;
    let raw = elapsed_days * prior.mean_motion * FULL_TURN + prior.mean_anomaly;
    wrap_degrees(raw)
}

/// Epoch record of a fitted solution, referred to the window midpoint.
pub fn refitted_epoch_record(
    midpoint: &Epoch,
    mean_anomaly: Degree,
    mean_motion: RevPerDay,
) -> EpochRecord {
    EpochRecord {
        epoch_day: day_of_year(midpoint),
        mean_anomaly,
        mean_motion,
    }
}

#[cfg(test)]
pub(crate) mod epoch_test {
    use super::*;
    use crate::record::{verify_checksum, ElementRecord};
    use crate::time::{offset_seconds, parse_timestamp};
    use approx::assert_relative_eq;

    pub(crate) const PRIOR_LINE1: &str =
        "1 41765U 16059A   16100.50000000  .00000067  00000-0  18179-4 0  9990";
    pub(crate) const PRIOR_LINE2: &str =
        "2 41765  97.4000 250.0000 0015000  80.0000  10.0000 14.85000000 12345";

    #[test]
    fn test_wrap_degrees_step_bound() {
        for angle in [-1_000_000.0, -725.3, -360.0, -0.0, 0.0, 359.999, 360.0, 7_200.5, 123_456.7] {
            let (wrapped, steps) = wrap_degrees_counted(angle);
            assert!((0.0..FULL_TURN).contains(&wrapped), "{angle} → {wrapped}");
            let bound = (angle.abs() / FULL_TURN).ceil() as usize + 1;
            assert!(steps <= bound, "{angle}: {steps} > {bound}");
        }
        assert!(wrap_degrees(f64::NAN).is_nan());
    }

    #[test]
    fn test_extrapolation_idempotent_at_zero_elapsed() {
        let record = ElementRecord::parse(PRIOR_LINE1, PRIOR_LINE2).unwrap();
        let prior = record.epoch_record().unwrap();
        // day 100.5 of 2016 = 2016-04-09 12:00:00
        let epoch = parse_timestamp("2016-04-09 12:00:00").unwrap();
        assert_relative_eq!(day_of_year(&epoch), prior.epoch_day, epsilon = 1e-9);
        assert_relative_eq!(
            extrapolate_mean_anomaly(&prior, &epoch),
            prior.mean_anomaly,
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_extrapolation_rate_law() {
        let prior = EpochRecord {
            epoch_day: 100.0,
            mean_anomaly: 10.0,
            mean_motion: 14.85,
        };
        // one hour later: 14.85 / 24 rev = 222.75°
        let target = parse_timestamp("2016-04-09 01:00:00").unwrap();
        assert_relative_eq!(day_of_year(&target), 100.0 + 1.0 / 24.0, epsilon = 1e-9);
        assert_relative_eq!(
            extrapolate_mean_anomaly(&prior, &target),
            232.75,
            epsilon = 1e-5
        );

        // far in the past: many full wraps, still in range
        let old = parse_timestamp("2016-01-01 00:00:00").unwrap();
        let m = extrapolate_mean_anomaly(&prior, &old);
        assert!((0.0..FULL_TURN).contains(&m));
    }

    #[test]
    fn test_update_epoch_splices_midpoint() {
        let start = parse_timestamp("2016-04-09 12:00:00").unwrap();
        let times: Vec<Epoch> = (0..5).map(|k| offset_seconds(&start, 10.0 * k as f64)).collect();

        let (line1, midpoint) = update_epoch(PRIOR_LINE1, &times).unwrap();
        assert_eq!(midpoint, offset_seconds(&start, 20.0));
        assert_eq!(line1.len(), 69);
        assert_eq!(&line1[..20], &PRIOR_LINE1[..20]);
        assert_eq!(&line1[32..68], &PRIOR_LINE1[32..68]);
        assert_eq!(&line1[20..32], format!("{:012.8}", 100.5 + 20.0 / 86_400.0));
        assert!(verify_checksum(&line1));
    }

    #[test]
    fn test_update_epoch_after_2018_rewrites_year() {
        let t = parse_timestamp("2024-06-01 12:00:00").unwrap();
        let (line1, midpoint) = update_epoch(PRIOR_LINE1, &[t, t]).unwrap();

        assert_eq!(midpoint, t);
        assert_eq!(line1.len(), 69);
        assert_eq!(&line1[..18], &PRIOR_LINE1[..18]);
        assert_eq!(&line1[18..32], "24153.50000000");
        assert_eq!(&line1[32..68], &PRIOR_LINE1[32..68]);
        assert!(verify_checksum(&line1));

        // the refitted record reads back on the continuous day count
        let record = ElementRecord::parse(&line1, PRIOR_LINE2).unwrap();
        let epoch = record.epoch_record().unwrap();
        assert_relative_eq!(epoch.epoch_day, day_of_year(&t), epsilon = 1e-8);
        assert_relative_eq!(epoch.epoch_day, 3075.5, epsilon = 1e-8);
        assert_relative_eq!(
            extrapolate_mean_anomaly(&epoch, &t),
            epoch.mean_anomaly,
            epsilon = 1e-5
        );
    }

    #[test]
    fn test_update_epoch_rejects_non_ascii_line() {
        let mangled = PRIOR_LINE1.replacen("16059A", "1605é", 1);
        let t = parse_timestamp("2016-04-09 12:00:00").unwrap();
        assert!(matches!(
            update_epoch(&mangled, &[t]),
            Err(TlefitError::MalformedRecord(_))
        ));
    }

    #[test]
    fn test_update_epoch_requires_observations() {
        assert_eq!(
            update_epoch(PRIOR_LINE1, &[]),
            Err(TlefitError::EmptyObservations)
        );
    }
}

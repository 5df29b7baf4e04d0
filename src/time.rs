use chrono::{Datelike, NaiveDateTime, Timelike};
use hifitime::{Epoch, Unit};

use crate::constants::{reference_epoch, DayOfYear, SECONDS_PER_DAY};
use crate::tlefit_errors::TlefitError;

/// Detector timestamp layout, `YYYY-MM-DD HH:MM:SS` with optional `.ffffff`
pub const PRIMARY_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// ISO-8601 variant with a `T` separator, tried when the primary layout fails
pub const FALLBACK_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Parse a UTC timestamp string into an [`Epoch`]
///
/// Argument
/// --------
/// * `timestamp`: a date in the format `YYYY-MM-DD HH:MM:SS[.ffffff]`
///
/// Return
/// ------
/// * the UTC epoch, or [`TlefitError::InvalidTimestamp`] when neither the primary nor
///   the fallback layout matches
pub fn parse_timestamp(timestamp: &str) -> Result<Epoch, TlefitError> {
    let trimmed = timestamp.trim();
    let datetime = NaiveDateTime::parse_from_str(trimmed, PRIMARY_TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, FALLBACK_TIMESTAMP_FORMAT))
        .map_err(|_| TlefitError::InvalidTimestamp(timestamp.to_string()))?;

    Ok(Epoch::from_gregorian_utc(
        datetime.year(),
        datetime.month() as u8,
        datetime.day() as u8,
        datetime.hour() as u8,
        datetime.minute() as u8,
        datetime.second() as u8,
        datetime.nanosecond(),
    ))
}

/// Continuous day-of-year of an epoch
///
/// Day 1.0 is the reference epoch (2016-01-01T00:00:00 UTC); the fractional part carries the
/// time of day. The count is done on the UTC scale, so leap seconds do not shift it.
pub fn day_of_year(epoch: &Epoch) -> DayOfYear {
    let elapsed = epoch.to_utc_duration() - reference_epoch().to_utc_duration();
    elapsed.to_seconds() / SECONDS_PER_DAY + 1.0
}

/// Calendar year of a two-digit record year: `57..=99` → 19xx, `00..=56` → 20xx
pub fn record_year(two_digit_year: u32) -> i32 {
    let yy = (two_digit_year % 100) as i32;
    if yy >= 57 {
        1900 + yy
    } else {
        2000 + yy
    }
}

/// Split an epoch into the two-digit year and the day of that year (day 1.0 = January 1st,
/// 00:00:00 UTC), the layout of the line 1 epoch field.
pub fn record_epoch(epoch: &Epoch) -> (u32, DayOfYear) {
    let (year, ..) = epoch.to_gregorian_utc();
    let new_year = Epoch::from_gregorian_utc_at_midnight(year, 1, 1);
    let day = day_of_year(epoch) - day_of_year(&new_year) + 1.0;
    (year.rem_euclid(100) as u32, day)
}

/// Continuous day-of-year (see [`day_of_year`]) of a line 1 epoch field.
pub fn record_epoch_day(two_digit_year: u32, day: DayOfYear) -> DayOfYear {
    let new_year = Epoch::from_gregorian_utc_at_midnight(record_year(two_digit_year), 1, 1);
    day_of_year(&new_year) + day - 1.0
}

/// Shift an epoch by a signed number of seconds
pub fn offset_seconds(epoch: &Epoch, seconds: f64) -> Epoch {
    *epoch + seconds * Unit::Second
}

/// Elapsed seconds from `start` to `end` (negative when `end` precedes `start`)
pub fn seconds_between(start: &Epoch, end: &Epoch) -> f64 {
    (*end - *start).to_seconds()
}

#[cfg(test)]
mod time_test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_parse_timestamp_both_layouts() {
        let whole = parse_timestamp("2016-03-01 12:00:00").unwrap();
        let fractional = parse_timestamp("2016-03-01 12:00:00.250000").unwrap();
        assert_relative_eq!(seconds_between(&whole, &fractional), 0.25, epsilon = 1e-9);

        let iso = parse_timestamp("2016-03-01T12:00:00").unwrap();
        assert_eq!(iso, whole);
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert_eq!(
            parse_timestamp("01/03/2016 12:00"),
            Err(TlefitError::InvalidTimestamp("01/03/2016 12:00".into()))
        );
        assert!(parse_timestamp("2016-13-01 00:00:00").is_err());
    }

    #[test]
    fn test_day_of_year_reference() {
        assert_eq!(day_of_year(&reference_epoch()), 1.0);

        let noon = parse_timestamp("2016-01-01 12:00:00").unwrap();
        assert_relative_eq!(day_of_year(&noon), 1.5, epsilon = 1e-12);

        let march = parse_timestamp("2016-03-01 06:00:00").unwrap();
        // 31 (Jan) + 29 (Feb, leap year) + 1 + 0.25
        assert_relative_eq!(day_of_year(&march), 61.25, epsilon = 1e-12);
    }

    #[test]
    fn test_record_epoch_across_years() {
        assert_eq!(record_year(16), 2016);
        assert_eq!(record_year(56), 2056);
        assert_eq!(record_year(57), 1957);
        assert_eq!(record_year(98), 1998);

        let june = parse_timestamp("2024-06-01 12:00:00").unwrap();
        let (yy, day) = record_epoch(&june);
        assert_eq!(yy, 24);
        // 31 + 29 + 31 + 30 + 31 + 1 + 0.5
        assert_relative_eq!(day, 153.5, epsilon = 1e-9);
        assert_relative_eq!(day_of_year(&june), 3075.5, epsilon = 1e-9);
        assert_relative_eq!(record_epoch_day(yy, day), 3075.5, epsilon = 1e-9);

        let (yy, day) = record_epoch(&reference_epoch());
        assert_eq!((yy, day), (16, 1.0));
        assert_eq!(record_epoch_day(16, 100.5), 100.5);
    }

    #[test]
    fn test_day_of_year_strictly_increasing() {
        let start = parse_timestamp("2016-06-30 23:59:58").unwrap();
        let mut previous = day_of_year(&start);
        for k in 1..20 {
            let next = day_of_year(&offset_seconds(&start, 0.5 * k as f64));
            assert!(next > previous);
            previous = next;
        }
    }
}

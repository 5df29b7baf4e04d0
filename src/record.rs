//! # Two-line element record codec
//!
//! Encoding and decoding of the fixed-width element record consumed by the projection
//! adapter. Only line 2 carries fitted elements; line 1 carries the epoch and is rewritten
//! by [`update_epoch`](crate::epoch::update_epoch).
//!
//! ## Line 2 layout (1-based columns)
//!
//! | cols  | field              | format                         |
//! |-------|--------------------|--------------------------------|
//! | 1     | line number `2`    |                                |
//! | 3–7   | catalog id         | `{:05}`                        |
//! | 9–16  | inclination        | `{:8.4}`                       |
//! | 18–25 | raan               | `{:8.4}`                       |
//! | 27–33 | eccentricity       | 7 digits, leading `0.` dropped |
//! | 35–42 | argument of perigee| `{:8.4}`                       |
//! | 44–51 | mean anomaly       | `{:8.4}`                       |
//! | 53–63 | mean motion        | `{:11.8}`                      |
//! | 64–68 | revolution number  | `{:05}`                        |
//! | 69    | checksum           |                                |
//!
//! ## Checksum
//!
//! Each line ends with `(Σ digits + number of '-') mod 10`, every other character being
//! ignored.

use std::ops::Range;

use tracing::{debug, warn};

use crate::{
    constants::{
        Degree, FULL_TURN, LINE1_EPOCH_DAY, LINE1_EPOCH_YEAR, LINE2_ARG_OF_PERIGEE, LINE2_CATALOG,
        LINE2_ECCENTRICITY, LINE2_INCLINATION, LINE2_MEAN_ANOMALY, LINE2_MEAN_MOTION,
        LINE2_RAAN, LINE2_REVOLUTION, MAX_CATALOG_ID, RECORD_BODY_LEN, RECORD_LINE_LEN,
    },
    elements::OrbitalElements,
    epoch::EpochRecord,
    time::record_epoch_day,
    tlefit_errors::TlefitError,
};

/// Fields of line 2 that are not fitted and stay constant over a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordTemplate {
    pub catalog_id: u32,
    pub revolution_number: u32,
}

impl RecordTemplate {
    pub fn new(catalog_id: u32, revolution_number: u32) -> Self {
        RecordTemplate {
            catalog_id,
            revolution_number,
        }
    }
}

/// A complete two-line element record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRecord {
    pub line1: String,
    pub line2: String,
}

impl ElementRecord {
    /// Validate and wrap a pair of record lines.
    ///
    /// Arguments
    /// ---------
    /// * `line1`: epoch line, starting with `1 `
    /// * `line2`: element line, starting with `2 `
    ///
    /// Return
    /// ------
    /// * the record, or [`TlefitError::MalformedRecord`] if a line is not ASCII, has the wrong
    ///   number or is shorter than 69 columns. A checksum mismatch is only reported as a warning: prior
    ///   records are read as-is.
    pub fn parse(line1: &str, line2: &str) -> Result<Self, TlefitError> {
        let line1 = line1.trim_end();
        let line2 = line2.trim_end();

        for (expected, line) in [('1', line1), ('2', line2)] {
            if !line.is_ascii() {
                return Err(TlefitError::MalformedRecord(format!(
                    "line {expected} contains non-ASCII characters"
                )));
            }
            if !line.starts_with(expected) {
                return Err(TlefitError::MalformedRecord(format!(
                    "expected line {expected}, got '{line}'"
                )));
            }
            if line.len() < RECORD_LINE_LEN {
                return Err(TlefitError::MalformedRecord(format!(
                    "line {expected} has {} columns, {RECORD_LINE_LEN} required",
                    line.len()
                )));
            }
            if !verify_checksum(line) {
                warn!(line = %expected, "element record checksum mismatch");
            }
        }

        Ok(ElementRecord {
            line1: line1.to_string(),
            line2: line2.to_string(),
        })
    }

    /// Fixed line-2 fields (catalog id, revolution number)
    pub fn template(&self) -> Result<RecordTemplate, TlefitError> {
        decode_line2(&self.line2).map(|(_, template)| template)
    }

    /// Elements stored in line 2
    pub fn elements(&self) -> Result<OrbitalElements, TlefitError> {
        decode_line2(&self.line2).map(|(elements, _)| elements)
    }

    /// Epoch (continuous day-of-year), mean anomaly and mean motion of the record
    pub fn epoch_record(&self) -> Result<EpochRecord, TlefitError> {
        let year: u32 = parse_field(&self.line1, LINE1_EPOCH_YEAR, "epoch year")?;
        let day: f64 = parse_field(&self.line1, LINE1_EPOCH_DAY, "epoch day")?;
        let elements = self.elements()?;
        Ok(EpochRecord {
            epoch_day: record_epoch_day(year, day),
            mean_anomaly: elements.mean_anomaly,
            mean_motion: elements.mean_motion,
        })
    }
}

/// Checksum digit of a record line body
///
/// Every ASCII digit counts as its value, every `-` as 1, anything else is ignored.
pub fn checksum(text: &str) -> u8 {
    let sum: u32 = text
        .chars()
        .map(|c| match c {
            '0'..='9' => c as u32 - '0' as u32,
            '-' => 1,
            _ => 0,
        })
        .sum();
    (sum % 10) as u8
}

/// Append the checksum digit to a 68-column line body
pub fn append_checksum(mut body: String) -> String {
    let digit = checksum(&body);
    body.push(char::from(b'0' + digit));
    body
}

/// `true` when column 69 holds the checksum of columns 1–68
pub fn verify_checksum(line: &str) -> bool {
    match (line.get(..RECORD_BODY_LEN), line.as_bytes().get(RECORD_BODY_LEN)) {
        (Some(body), Some(found)) => found.wrapping_sub(b'0') == checksum(body),
        _ => false,
    }
}

/// Add 360° until the angle is non-negative, logging when a wrap happens.
///
/// Non-finite values are returned unchanged.
fn wrap_negative(field: &'static str, angle: Degree) -> Degree {
    if !angle.is_finite() || angle >= 0.0 {
        return angle;
    }
    let mut wrapped = angle;
    while wrapped < 0.0 {
        wrapped += FULL_TURN;
    }
    debug!(field, original = angle, wrapped, "negative angle wrapped before encoding");
    wrapped
}

/// Eccentricity as the 7-digit record field (implicit leading `0.`)
fn format_eccentricity(eccentricity: f64) -> Result<String, TlefitError> {
    let digits = (eccentricity * 1e7).round();
    if !(0.0..1e7).contains(&digits) {
        return Err(TlefitError::InvalidEccentricity(eccentricity));
    }
    Ok(format!("{:07}", digits as u32))
}

/// Encode a set of elements as record line 2.
///
/// Arguments
/// ---------
/// * `elements`: the candidate elements; negative raan, argument of perigee or mean anomaly
///   are wrapped into positive values first
/// * `template`: catalog id and revolution number
///
/// Return
/// ------
/// * the 69-column line, checksum included, or [`TlefitError::InvalidEccentricity`] when the
///   eccentricity does not fit the 7-digit field, [`TlefitError::MalformedRecord`] when the
///   catalog id does not fit its 5 columns
pub fn encode_line2(
    elements: &OrbitalElements,
    template: &RecordTemplate,
) -> Result<String, TlefitError> {
    let raan = wrap_negative("raan", elements.raan);
    let arg_of_perigee = wrap_negative("arg_of_perigee", elements.arg_of_perigee);
    let mean_anomaly = wrap_negative("mean_anomaly", elements.mean_anomaly);
    let eccentricity = format_eccentricity(elements.eccentricity)?;
    if template.catalog_id > MAX_CATALOG_ID {
        return Err(TlefitError::MalformedRecord(format!(
            "catalog id {} does not fit the 5-column field",
            template.catalog_id
        )));
    }

    let body = format!(
        "2 {:05} {:8.4} {:8.4} {} {:8.4} {:8.4} {:11.8}{:05}",
        template.catalog_id,
        elements.inclination,
        raan,
        eccentricity,
        arg_of_perigee,
        mean_anomaly,
        elements.mean_motion,
        template.revolution_number % 100_000,
    );
    Ok(append_checksum(body))
}

fn parse_field<T: std::str::FromStr>(
    line: &str,
    range: Range<usize>,
    name: &str,
) -> Result<T, TlefitError> {
    let raw = line
        .get(range.clone())
        .ok_or_else(|| TlefitError::MalformedRecord(format!("{name}: line too short")))?;
    raw.trim()
        .parse::<T>()
        .map_err(|_| TlefitError::MalformedRecord(format!("{name}: cannot parse '{raw}'")))
}

/// Decode record line 2 into elements and fixed fields.
///
/// The revolution number is optional in practice (blank columns are read as 0).
pub fn decode_line2(line: &str) -> Result<(OrbitalElements, RecordTemplate), TlefitError> {
    if !line.starts_with('2') {
        return Err(TlefitError::MalformedRecord(format!(
            "expected line 2, got '{line}'"
        )));
    }

    let catalog_id: u32 = parse_field(line, LINE2_CATALOG, "catalog id")?;
    let inclination: f64 = parse_field(line, LINE2_INCLINATION, "inclination")?;
    let raan: f64 = parse_field(line, LINE2_RAAN, "raan")?;
    let ecc_digits: u32 = parse_field(line, LINE2_ECCENTRICITY, "eccentricity")?;
    let arg_of_perigee: f64 = parse_field(line, LINE2_ARG_OF_PERIGEE, "argument of perigee")?;
    let mean_anomaly: f64 = parse_field(line, LINE2_MEAN_ANOMALY, "mean anomaly")?;
    let mean_motion: f64 = parse_field(line, LINE2_MEAN_MOTION, "mean motion")?;
    let revolution_number = match line.get(LINE2_REVOLUTION).map(str::trim) {
        Some("") | None => 0,
        Some(_) => parse_field(line, LINE2_REVOLUTION, "revolution number")?,
    };

    Ok((
        OrbitalElements::new(
            inclination,
            raan,
            ecc_digits as f64 * 1e-7,
            arg_of_perigee,
            mean_anomaly,
            mean_motion,
        ),
        RecordTemplate::new(catalog_id, revolution_number),
    ))
}

#[cfg(test)]
pub(crate) mod record_test {
    use super::*;
    use approx::assert_relative_eq;

    pub(crate) const ISS_LINE1: &str =
        "1 25544U 98067A   08264.51782528 -.00002182  00000-0 -11606-4 0  2927";
    pub(crate) const ISS_LINE2: &str =
        "2 25544  51.6416 247.4627 0006703 130.5360 325.0288 15.72125391563537";

    #[test]
    fn test_checksum_reference_line() {
        assert_eq!(
            checksum("2 25544 051.6416 247.4627 0006703 130.5360 325.0288"),
            9
        );
        assert!(verify_checksum(ISS_LINE1));
        assert!(verify_checksum(ISS_LINE2));
    }

    #[test]
    fn test_checksum_properties() {
        assert_eq!(checksum("0 000 00.0000 abc"), 0);
        // '-' counts as one
        assert_eq!(checksum("-5"), 6);
        assert_eq!(checksum("x-5y"), checksum("-5"));
        // non-digit characters can be shuffled freely
        assert_eq!(checksum("1 2.3-4"), checksum("-1.2 34"));
        assert_eq!(append_checksum("-5".into()), "-56");
    }

    #[test]
    fn test_encode_layout() {
        let template = RecordTemplate::new(25544, 56353);
        let elements = OrbitalElements::new(51.6416, 247.4627, 0.0006703, 130.536, 325.0288, 15.72125391);
        let line = encode_line2(&elements, &template).unwrap();
        assert_eq!(line, ISS_LINE2);
        assert_eq!(line.len(), RECORD_LINE_LEN);
    }

    #[test]
    fn test_encode_wraps_negative_angles() {
        let template = RecordTemplate::new(1, 0);
        let elements = OrbitalElements::new(97.4, -110.0, 0.0015, -800.0, -0.5, 14.85);
        let line = encode_line2(&elements, &template).unwrap();
        let (decoded, _) = decode_line2(&line).unwrap();
        assert_relative_eq!(decoded.raan, 250.0);
        assert_relative_eq!(decoded.arg_of_perigee, 280.0);
        assert_relative_eq!(decoded.mean_anomaly, 359.5);
        assert!(verify_checksum(&line));
    }

    #[test]
    fn test_encode_rejects_unrepresentable_eccentricity() {
        let template = RecordTemplate::new(1, 0);
        let mut elements = OrbitalElements::new(97.4, 10.0, 1.2, 10.0, 10.0, 14.85);
        assert_eq!(
            encode_line2(&elements, &template),
            Err(TlefitError::InvalidEccentricity(1.2))
        );
        elements.eccentricity = -0.01;
        assert!(encode_line2(&elements, &template).is_err());
    }

    #[test]
    fn test_decode_reference_record() {
        let record = ElementRecord::parse(ISS_LINE1, ISS_LINE2).unwrap();
        let elements = record.elements().unwrap();
        assert_relative_eq!(elements.inclination, 51.6416);
        assert_relative_eq!(elements.eccentricity, 0.0006703, epsilon = 1e-12);
        assert_relative_eq!(elements.mean_motion, 15.72125391);
        assert_eq!(record.template().unwrap(), RecordTemplate::new(25544, 56353));

        // day 264.51782528 of 2008; 2008-01-01 is 2922 days before 2016-01-01
        let epoch = record.epoch_record().unwrap();
        assert_relative_eq!(epoch.epoch_day, 264.51782528 - 2922.0, epsilon = 1e-8);
        assert_relative_eq!(epoch.mean_anomaly, 325.0288);
    }

    #[test]
    fn test_parse_rejects_short_or_swapped_lines() {
        assert!(ElementRecord::parse(ISS_LINE2, ISS_LINE1).is_err());
        assert!(ElementRecord::parse(&ISS_LINE1[..40], ISS_LINE2).is_err());
    }

    #[test]
    fn test_parse_rejects_non_ascii_lines() {
        let mangled = ISS_LINE1.replacen("98067A", "9806Å", 1);
        assert_eq!(
            ElementRecord::parse(&mangled, ISS_LINE2),
            Err(TlefitError::MalformedRecord(
                "line 1 contains non-ASCII characters".into()
            ))
        );
    }

    #[test]
    fn test_encode_rejects_oversized_catalog_id() {
        let elements = OrbitalElements::new(97.4, 10.0, 0.001, 10.0, 10.0, 14.85);
        assert!(encode_line2(&elements, &RecordTemplate::new(99_999, 0)).is_ok());
        assert!(matches!(
            encode_line2(&elements, &RecordTemplate::new(100_000, 0)),
            Err(TlefitError::MalformedRecord(_))
        ));
    }
}

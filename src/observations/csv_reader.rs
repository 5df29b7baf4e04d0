use std::io::Read;

use camino::Utf8Path;

use crate::{
    observations::{ingest, Observations, RawDetection},
    tlefit_errors::TlefitError,
};

/// Read raw detections from CSV text.
///
/// The first row must be a header naming the columns `pixel_x`, `pixel_y` and `timestamp`
/// (aliases `x`, `y`, `time`); column order is free and extra columns are ignored.
pub fn read_detections<R: Read>(reader: R) -> Result<Vec<RawDetection>, TlefitError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    csv_reader
        .deserialize::<RawDetection>()
        .map(|row| row.map_err(TlefitError::from))
        .collect()
}

/// Read and ingest a CSV detection file
///
/// Arguments
/// ---------
/// * `path`: CSV file with a `pixel_x,pixel_y,timestamp` header
/// * `timestamp_offset_s`: clock correction added to every timestamp, in seconds
///
/// Return
/// ------
/// * the chronological track, see [`ingest`]
pub fn ingest_csv_file(
    path: &Utf8Path,
    timestamp_offset_s: f64,
) -> Result<Observations, TlefitError> {
    let file = std::fs::File::open(path)?;
    ingest(read_detections(file)?, timestamp_offset_s)
}

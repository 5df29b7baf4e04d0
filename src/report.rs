//! # Fit report
//!
//! [`FitReport`] gathers what a refinement produces for its user: the updated two-line
//! record, the refined elements with their bootstrap uncertainty, the fitted track and the
//! residual statistics.
//!
//! Rendering
//! -----------------
//! * `{}` – summary: record lines, element table (value and 1σ), residual statistics and
//!   bootstrap counts.
//! * `{:#}` – summary followed by the per-observation track table.
//! * [`FitReport::write_track_csv`] – numeric arrays (observed, fitted, along / cross-track),
//!   one CSV row per observation.
//!
//! Tables are rendered with [`comfy-table`](https://docs.rs/comfy-table/latest/comfy_table/).

use std::fmt;
use std::io::Write;

use camino::Utf8Path;
use comfy_table::{presets::UTF8_FULL, Cell, CellAlignment, ContentArrangement, Row, Table};
use hifitime::Epoch;
use itertools::izip;
use serde::Serialize;

use crate::{
    bootstrap::BootstrapSummary,
    constants::Pixel,
    elements::ELEMENT_NAMES,
    observations::{Observation, TrackExt},
    pipeline::FitResult,
    tlefit_errors::TlefitError,
};

const ELEMENT_UNITS: [&str; 6] = ["deg", "deg", "", "deg", "deg", "rev/day"];

/// Decimal places of each element, matching the record precision
const ELEMENT_PRECISION: [usize; 6] = [4, 4, 7, 4, 4, 8];

/// Production fit, bootstrap uncertainty and observed track.
#[derive(Debug, Clone, PartialEq)]
pub struct FitReport {
    pub fit: FitResult,
    pub uncertainty: BootstrapSummary,
    pub times: Vec<Epoch>,
    pub observed_x: Vec<Pixel>,
    pub observed_y: Vec<Pixel>,
}

/// One CSV row of [`FitReport::write_track_csv`]
#[derive(Debug, Serialize)]
struct TrackRow {
    index: usize,
    time_utc: String,
    observed_x: Pixel,
    observed_y: Pixel,
    fitted_x: Pixel,
    fitted_y: Pixel,
    along_track: Pixel,
    cross_track: Pixel,
}

impl FitReport {
    pub fn new(fit: FitResult, uncertainty: BootstrapSummary, observations: &[Observation]) -> Self {
        FitReport {
            fit,
            uncertainty,
            times: observations.times(),
            observed_x: observations.pixels_x(),
            observed_y: observations.pixels_y(),
        }
    }

    /// Element table: name, value, 1σ, unit
    pub fn elements_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);

        table.set_header(vec![
            Cell::new("Element"),
            Cell::new("Value"),
            Cell::new("±1σ (bootstrap)"),
            Cell::new("Unit"),
        ]);

        let values = self.fit.elements.to_array();
        for k in 0..6 {
            let dp = ELEMENT_PRECISION[k];
            table.add_row(Row::from(vec![
                Cell::new(ELEMENT_NAMES[k]),
                Cell::new(format!("{:.*}", dp, values[k])).set_alignment(CellAlignment::Right),
                Cell::new(format!("{:.*}", dp + 1, self.uncertainty.std_dev[k]))
                    .set_alignment(CellAlignment::Right),
                Cell::new(ELEMENT_UNITS[k]),
            ]));
        }
        table
    }

    /// Per-observation table: observed, fitted, along / cross-track offsets
    pub fn track_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);

        table.set_header(vec![
            Cell::new("#"),
            Cell::new("Time (UTC)"),
            Cell::new("x obs"),
            Cell::new("y obs"),
            Cell::new("x fit"),
            Cell::new("y fit"),
            Cell::new("along [px]"),
            Cell::new("cross [px]"),
        ]);

        for (i, (t, ox, oy, fx, fy, a, c)) in izip!(
            &self.times,
            &self.observed_x,
            &self.observed_y,
            &self.fit.predicted_x,
            &self.fit.predicted_y,
            &self.fit.stats.along_track,
            &self.fit.stats.cross_track
        )
        .enumerate()
        {
            table.add_row(Row::from(vec![
                Cell::new(i).set_alignment(CellAlignment::Right),
                Cell::new(t.to_string()),
                Cell::new(format!("{ox:.3}")).set_alignment(CellAlignment::Right),
                Cell::new(format!("{oy:.3}")).set_alignment(CellAlignment::Right),
                Cell::new(format!("{fx:.3}")).set_alignment(CellAlignment::Right),
                Cell::new(format!("{fy:.3}")).set_alignment(CellAlignment::Right),
                Cell::new(format!("{a:+.4}")).set_alignment(CellAlignment::Right),
                Cell::new(format!("{c:+.4}")).set_alignment(CellAlignment::Right),
            ]));
        }
        table
    }

    /// Write the observed and fitted tracks as CSV.
    ///
    /// Columns: `index, time_utc, observed_x, observed_y, fitted_x, fitted_y, along_track,
    /// cross_track`.
    pub fn write_track_csv<W: Write>(&self, writer: W) -> Result<(), TlefitError> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        for (index, (t, ox, oy, fx, fy, a, c)) in izip!(
            &self.times,
            &self.observed_x,
            &self.observed_y,
            &self.fit.predicted_x,
            &self.fit.predicted_y,
            &self.fit.stats.along_track,
            &self.fit.stats.cross_track
        )
        .enumerate()
        {
            csv_writer.serialize(TrackRow {
                index,
                time_utc: t.to_string(),
                observed_x: *ox,
                observed_y: *oy,
                fitted_x: *fx,
                fitted_y: *fy,
                along_track: *a,
                cross_track: *c,
            })?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    pub fn write_track_csv_file(&self, path: &Utf8Path) -> Result<(), TlefitError> {
        let file = std::fs::File::create(path)?;
        self.write_track_csv(file)
    }
}

impl fmt::Display for FitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = &self.fit.stats;
        let boot = &self.uncertainty;

        writeln!(f, "Refined two-line elements")?;
        writeln!(f, "{}", self.fit.record.line1)?;
        writeln!(f, "{}", self.fit.record.line2)?;
        writeln!(f)?;
        writeln!(f, "{}", self.elements_table())?;
        writeln!(
            f,
            "Residuals: along-track rms {:.4} px, cross-track rms {:.4} px, total rms {:.4} px",
            stats.along_track_rms, stats.cross_track_rms, stats.total_rms
        )?;
        writeln!(
            f,
            "Reduced chi-square: {:.4} ({} observations)",
            stats.reduced_chi_square,
            stats.len()
        )?;
        write!(
            f,
            "Bootstrap: {} / {} replicas succeeded ({} failed, {} degenerate)",
            boot.n_successful(),
            boot.n_iterations,
            boot.n_failed,
            boot.n_degenerate
        )?;

        if f.alternate() {
            writeln!(f)?;
            writeln!(f)?;
            write!(f, "{}", self.track_table())?;
        }
        Ok(())
    }
}
